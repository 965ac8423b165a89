//! # Locating the Vault
//!
//! A vault has two directories:
//!
//! - **Data directory**: holds `register.json` and `sopvault.toml`.
//! - **Storage root**: the document file tree (`Originals/`, `PDFs/`,
//!   `Videos/`, `Steps/`, `Archive/Deleted/`).
//!
//! ## Resolution Order
//!
//! Data directory:
//! 1. An explicit override (the CLI's `--root`).
//! 2. The `SOPVAULT_HOME` environment variable.
//! 3. The platform data directory from [`directories::ProjectDirs`].
//!
//! Storage root:
//! 1. The same override, when given: `--root` keeps everything in one tree.
//! 2. `storage_root` from configuration (`SOPVAULT_STORAGE_ROOT` or the file).
//! 3. `<data_dir>/storage`.

use crate::api::SopVault;
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::files::StorageLayout;
use crate::store::fs::FileStore;
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::debug;

pub const HOME_ENV: &str = "SOPVAULT_HOME";

pub struct VaultContext {
    pub api: SopVault<FileStore>,
    pub data_dir: PathBuf,
    pub storage_root: PathBuf,
}

/// Default data directory when neither an override nor `SOPVAULT_HOME` is
/// set.
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "sopvault", "sopvault")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| VaultError::Config("Could not determine a data directory".to_string()))
}

pub fn resolve_data_dir(root_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = root_override {
        return Ok(root);
    }
    match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => default_data_dir(),
    }
}

/// Loads configuration and opens the file store and file tree.
pub fn initialize(root_override: Option<PathBuf>) -> Result<VaultContext> {
    let data_dir = resolve_data_dir(root_override.clone())?;
    let config = VaultConfig::load(&data_dir)?;
    let data_dir = match (&root_override, &config.data_dir) {
        (None, Some(configured)) => configured.clone(),
        _ => data_dir,
    };
    let storage_root = match root_override {
        Some(root) => root.join("storage"),
        None => config.storage_root_or(&data_dir),
    };
    debug!(data_dir = %data_dir.display(), storage_root = %storage_root.display(), "vault located");

    let store = FileStore::new(data_dir.clone());
    let layout = StorageLayout::new(storage_root.clone());
    let api = SopVault::new(store, layout, config);
    Ok(VaultContext {
        api,
        data_dir,
        storage_root,
    })
}
