//! Ordered, two-pass file search.
//!
//! Pass one looks for the exact file name (case-insensitive) under every
//! candidate root in order, recursing into subdirectories. Only when no root
//! has an exact match does pass two run, comparing base names without
//! extension. The first hit wins.
//!
//! Entries are visited in sorted order, files of a directory before its
//! subdirectories, so the same inputs on the same tree always return the same
//! path. Symlinked directories are not followed.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Finds `file_name` under `roots`. Only the last path component of
/// `file_name` is used, so stored relative paths like `Steps/a.png` work.
pub fn locate<P: AsRef<Path>>(roots: &[P], file_name: &str) -> Option<PathBuf> {
    let wanted = last_component(file_name)?;
    let roots = distinct(roots);

    if let Some(hit) = exact_pass(&roots, &wanted) {
        return Some(hit);
    }

    let base = base_name(&wanted);
    for root in &roots {
        if let Some(hit) = search(root, &|name| base_name(name) == base) {
            debug!(file = %wanted, path = %hit.display(), "located by base name");
            return Some(hit);
        }
    }

    debug!(file = %wanted, roots = roots.len(), "file not found");
    None
}

/// Pass one only: the exact file name, case-insensitive. Used where a wrong
/// hit would be irreversible.
pub fn locate_exact<P: AsRef<Path>>(roots: &[P], file_name: &str) -> Option<PathBuf> {
    let wanted = last_component(file_name)?;
    let hit = exact_pass(&distinct(roots), &wanted);
    if hit.is_none() {
        debug!(file = %wanted, "no exact match");
    }
    hit
}

fn exact_pass(roots: &[PathBuf], wanted: &str) -> Option<PathBuf> {
    for root in roots {
        if let Some(hit) = search(root, &|name| name.eq_ignore_ascii_case(wanted)) {
            debug!(file = %wanted, path = %hit.display(), "located exact match");
            return Some(hit);
        }
    }
    None
}

fn last_component(file_name: &str) -> Option<String> {
    file_name
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Lower-cased name without its final extension.
fn base_name(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| name.to_lowercase())
}

fn distinct<P: AsRef<Path>>(roots: &[P]) -> Vec<PathBuf> {
    let mut seen: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        let root = root.as_ref().to_path_buf();
        if !seen.contains(&root) {
            seen.push(root);
        }
    }
    seen
}

fn search(dir: &Path, matches: &dyn Fn(&str) -> bool) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let Ok(kind) = entry.file_type() else {
            continue;
        };
        if kind.is_file() {
            files.push(entry.path());
        } else if kind.is_dir() {
            dirs.push(entry.path());
        }
    }
    files.sort();
    dirs.sort();

    if let Some(hit) = files.into_iter().find(|path| {
        path.file_name()
            .map(|n| matches(&n.to_string_lossy()))
            .unwrap_or(false)
    }) {
        return Some(hit);
    }
    dirs.iter().find_map(|sub| search(sub, matches))
}
