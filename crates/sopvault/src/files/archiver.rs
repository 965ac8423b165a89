//! Moves live files into `Archive/Deleted/<Category>`.
//!
//! Archived names carry the archival timestamp as a prefix,
//! `<timestamp>_<name><ext>`, so several generations of the same document can
//! sit side by side. The timestamp format is [`TIMESTAMP_FORMAT`].

use super::locator::{locate, locate_exact};
use super::{file_name_of, move_file, unique_destination, Category, StorageLayout};
use crate::error::Result;
use crate::model::NO_ARTIFACT;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub fn archive_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Strips a leading `<14 digits>_` archive prefix, if present.
pub fn strip_archive_prefix(name: &str) -> &str {
    match name.split_once('_') {
        Some((prefix, rest))
            if prefix.len() == 14 && prefix.bytes().all(|b| b.is_ascii_digit()) && !rest.is_empty() =>
        {
            rest
        }
        _ => name,
    }
}

pub struct FileArchiver<'a> {
    layout: &'a StorageLayout,
}

impl<'a> FileArchiver<'a> {
    pub fn new(layout: &'a StorageLayout) -> Self {
        Self { layout }
    }

    /// Archives `source_file` from wherever it lives. Returns the archived
    /// file name, or `None` when the file could not be found.
    pub fn archive(
        &self,
        source_file: &str,
        folder: Option<&str>,
        timestamp: &str,
        category: Category,
    ) -> Result<Option<String>> {
        if is_blank(source_file) {
            return Ok(None);
        }
        let candidates = self.layout.candidates(category, folder);
        let Some(found) = locate(&candidates, source_file) else {
            warn!(file = source_file, %category, "nothing to archive, file not found");
            return Ok(None);
        };
        self.archive_found(&found, timestamp, category).map(Some)
    }

    /// Archives a file whose live path is already known.
    pub fn archive_found(&self, found: &Path, timestamp: &str, category: Category) -> Result<String> {
        let archive_dir = self.layout.archive_dir(category);
        fs::create_dir_all(&archive_dir)?;
        let archived = format!("{}_{}", timestamp, file_name_of(found));
        let dest = unique_destination(&archive_dir, &archived, "_");
        move_file(found, &dest)?;

        let name = file_name_of(&dest);
        info!(from = %found.display(), to = %name, %category, "file archived");
        Ok(name)
    }

    /// Live copy of `source_file` by exact name only. Deletion goes through
    /// this lookup; a base-name match may belong to another document.
    pub fn find_exact(&self, source_file: &str, folder: Option<&str>, category: Category) -> Option<PathBuf> {
        if is_blank(source_file) {
            return None;
        }
        locate_exact(&self.layout.candidates(category, folder), source_file)
    }

    /// Deletes the live copy of `source_file`. Returns whether one was found.
    pub fn remove(&self, source_file: &str, folder: Option<&str>, category: Category) -> Result<bool> {
        match self.find_exact(source_file, folder, category) {
            Some(found) => {
                fs::remove_file(&found)?;
                info!(path = %found.display(), %category, "file removed");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn is_blank(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name == NO_ARTIFACT
}
