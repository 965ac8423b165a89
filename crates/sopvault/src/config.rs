//! # Configuration
//!
//! Configuration is loaded with [`confique`] in layers:
//!
//! 1. **Environment variables**: `SOPVAULT_STORAGE_ROOT`, `SOPVAULT_DATA_DIR`,
//!    `SOPVAULT_DEFAULT_DOC_TYPE`.
//! 2. **Project file**: `sopvault.toml` in the data directory.
//! 3. **Compiled defaults**.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `storage_root` | `<data_dir>/storage` | Base of the document file tree |
//! | `data_dir` | platform data dir | Where `register.json` lives |
//! | `video_extensions` | `mp4, avi, mov, wmv, mkv, webm` | Extensions also filed under `Videos` |
//! | `default_doc_type` | `General` | Type used when an upload names none |
//! | `doc_types` | empty | Per-type `acronym` and `folder` |
//! | `supervisors` | empty | Per-department `name` and `email` |
//!
//! ## Example
//!
//! ```toml
//! storage_root = "/srv/sop-files"
//! video_extensions = ["mp4", "mov"]
//!
//! [doc_types."Work Instruction"]
//! acronym = "WI"
//! folder = "Work Instructions"
//!
//! [supervisors.Quality]
//! name = "Dana Reyes"
//! email = "dana@example.com"
//! ```

use crate::error::{Result, VaultError};
use confique::Config;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "sopvault.toml";

fn default_video_extensions() -> Vec<String> {
    ["mp4", "avi", "mov", "wmv", "mkv", "webm"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DocTypeConfig {
    pub acronym: Option<String>,
    pub folder: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub name: String,
    pub email: Option<String>,
}

/// Configuration for sopvault, stored in `sopvault.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Base directory of the document file tree.
    #[config(env = "SOPVAULT_STORAGE_ROOT")]
    pub storage_root: Option<PathBuf>,

    /// Directory holding the register.
    #[config(env = "SOPVAULT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Extensions (without dot) treated as video.
    pub video_extensions: Option<Vec<String>>,

    #[config(default = "General", env = "SOPVAULT_DEFAULT_DOC_TYPE")]
    pub default_doc_type: String,

    pub doc_types: Option<HashMap<String, DocTypeConfig>>,

    pub supervisors: Option<HashMap<String, SupervisorConfig>>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            data_dir: None,
            video_extensions: None,
            default_doc_type: "General".to_string(),
            doc_types: None,
            supervisors: None,
        }
    }
}

impl VaultConfig {
    /// Loads environment, then `<dir>/sopvault.toml`, then defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        VaultConfig::builder()
            .env()
            .file(dir.join(CONFIG_FILE))
            .load()
            .map_err(|e| VaultError::Config(e.to_string()))
    }

    /// Video extensions, lower-cased and without dots.
    pub fn video_extensions(&self) -> Vec<String> {
        self.video_extensions
            .clone()
            .unwrap_or_else(default_video_extensions)
            .into_iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    pub fn is_video(&self, file_name: &str) -> bool {
        crate::files::extension_of(file_name)
            .is_some_and(|ext| self.video_extensions().contains(&ext))
    }

    pub fn storage_root_or(&self, data_dir: &Path) -> PathBuf {
        self.storage_root
            .clone()
            .unwrap_or_else(|| data_dir.join("storage"))
    }

    pub fn doc_types(&self) -> HashMap<String, DocTypeConfig> {
        self.doc_types.clone().unwrap_or_default()
    }

    pub fn supervisors(&self) -> HashMap<String, SupervisorConfig> {
        self.supervisors.clone().unwrap_or_default()
    }
}
