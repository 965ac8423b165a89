//! # File Storage
//!
//! Physical files live in a directory tree under a configured root. The layout
//! has changed over the product's history, so nothing here trusts a stored
//! path: every lookup goes through the [`locator`] with an ordered list of
//! candidate directories.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── Originals/<DocType>/     # uploaded files and approved PDFs
//! ├── PDFs/<DocType>/          # generated draft PDFs
//! ├── Videos/<DocType>/        # video copies
//! ├── Steps/                   # step images of structured SOPs
//! ├── Uploads/                 # legacy flat layout (read only)
//! └── Archive/Deleted/
//!     ├── Originals/
//!     ├── PDFs/
//!     ├── Videos/
//!     └── Steps/
//! ```
//!
//! Directories are created on demand. Missing files are a normal outcome, not
//! an error: records may reference files that were never migrated.

use crate::reference::ReferenceData;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod archiver;
pub mod locator;

pub const DEFAULT_FOLDER: &str = "General";
const LEGACY_DIR: &str = "Uploads";
const ARCHIVE_DIR: [&str; 2] = ["Archive", "Deleted"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Originals,
    Pdfs,
    Videos,
    Steps,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Originals,
        Category::Pdfs,
        Category::Videos,
        Category::Steps,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Originals => "Originals",
            Self::Pdfs => "PDFs",
            Self::Videos => "Videos",
            Self::Steps => "Steps",
        }
    }

    /// Step images are not split by document type.
    pub fn uses_type_folder(&self) -> bool {
        !matches!(self, Self::Steps)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_root(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Where live files of `category` are written.
    pub fn live_dir(&self, category: Category, folder: &str) -> PathBuf {
        if category.uses_type_folder() {
            self.category_root(category).join(folder)
        } else {
            self.category_root(category)
        }
    }

    pub fn legacy_dir(&self) -> PathBuf {
        self.root.join(LEGACY_DIR)
    }

    pub fn archive_root(&self) -> PathBuf {
        ARCHIVE_DIR.iter().fold(self.root.clone(), |p, d| p.join(d))
    }

    pub fn archive_dir(&self, category: Category) -> PathBuf {
        self.archive_root().join(category.dir_name())
    }

    /// Ordered places a live file of `category` may be found: the type folder,
    /// the generic category folder, then the legacy upload tree.
    pub fn candidates(&self, category: Category, folder: Option<&str>) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(4);
        if let Some(folder) = folder.filter(|f| category.uses_type_folder() && !f.is_empty()) {
            roots.push(self.category_root(category).join(folder));
        }
        roots.push(self.category_root(category));
        if category != Category::Originals {
            roots.push(self.legacy_dir().join(category.dir_name()));
        }
        roots.push(self.legacy_dir());
        roots
    }
}

/// Folder name for a document type: the reference-data folder when known,
/// otherwise the sanitized type name, otherwise [`DEFAULT_FOLDER`].
pub fn type_folder(reference: &dyn ReferenceData, doc_type: &str) -> String {
    reference
        .doc_type_folder(doc_type)
        .map(|f| sanitize_folder(&f))
        .unwrap_or_else(|| sanitize_folder(doc_type))
}

/// Replaces characters that are unsafe in a directory name.
pub fn sanitize_folder(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '&' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '_' || c == ' ').to_string();
    if cleaned.is_empty() {
        DEFAULT_FOLDER.to_string()
    } else {
        cleaned
    }
}

/// First free path for `name` in `dir`. Taken names get
/// `<stem><suffix><n><ext>` with n counting from 1.
pub fn unique_destination(dir: &Path, name: &str, suffix: &str) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}{}{}{}", stem, suffix, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Moves a file, creating the destination directory. Falls back to copy and
/// delete when a rename is not possible (e.g. across devices).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lower-cased extension without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name.trim())
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_are_ordered_type_generic_legacy() {
        let layout = StorageLayout::new("/srv/docs");
        let roots = layout.candidates(Category::Pdfs, Some("Work Instructions"));
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/srv/docs/PDFs/Work Instructions"),
                PathBuf::from("/srv/docs/PDFs"),
                PathBuf::from("/srv/docs/Uploads/PDFs"),
                PathBuf::from("/srv/docs/Uploads"),
            ]
        );
    }

    #[test]
    fn steps_ignore_type_folder() {
        let layout = StorageLayout::new("/srv/docs");
        assert_eq!(
            layout.live_dir(Category::Steps, "SOP"),
            PathBuf::from("/srv/docs/Steps")
        );
        assert_eq!(
            layout.candidates(Category::Steps, Some("SOP"))[0],
            PathBuf::from("/srv/docs/Steps")
        );
    }

    #[test]
    fn archive_dirs_live_under_archive_deleted() {
        let layout = StorageLayout::new("/srv/docs");
        assert_eq!(
            layout.archive_dir(Category::Videos),
            PathBuf::from("/srv/docs/Archive/Deleted/Videos")
        );
    }

    #[test]
    fn sanitize_folder_cleans_and_defaults() {
        assert_eq!(sanitize_folder("Work/Instruction"), "Work_Instruction");
        assert_eq!(sanitize_folder("  "), "General");
        assert_eq!(sanitize_folder("../.."), "General");
        assert_eq!(sanitize_folder("Forms & Templates"), "Forms & Templates");
    }

    #[test]
    fn unique_destination_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        fs::write(dir.path().join("a_restored_1.pdf"), b"x").unwrap();
        let dest = unique_destination(dir.path(), "a.pdf", "_restored_");
        assert_eq!(dest, dir.path().join("a_restored_2.pdf"));
    }

    #[test]
    fn move_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.txt");
        fs::write(&src, b"hello").unwrap();
        let dest = dir.path().join("nested/deeper/out.txt");
        move_file(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dest).unwrap(), "hello");
    }
}
