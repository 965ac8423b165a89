use super::backend::StorageBackend;
use super::tables::Tables;
use crate::error::{Result, VaultError};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const REGISTER_FILE: &str = "register.json";

/// JSON file backend. The whole register lives in one `register.json` under
/// the data directory and is rewritten atomically on every commit.
pub struct FsBackend {
    data_dir: PathBuf,
}

impl FsBackend {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn register_path(&self) -> PathBuf {
        self.data_dir.join(REGISTER_FILE)
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(VaultError::Io)?;
        }
        Ok(())
    }
}

impl StorageBackend for FsBackend {
    fn load_tables(&self) -> Result<Tables> {
        let path = self.register_path();
        if !path.exists() {
            return Ok(Tables::default());
        }
        let content = fs::read_to_string(path).map_err(VaultError::Io)?;
        if content.trim().is_empty() {
            return Ok(Tables::default());
        }
        let tables: Tables = serde_json::from_str(&content).map_err(VaultError::Serialization)?;
        Ok(tables)
    }

    fn save_tables(&self, tables: &Tables) -> Result<()> {
        self.ensure_dir(&self.data_dir)?;

        let content = serde_json::to_string_pretty(tables).map_err(VaultError::Serialization)?;

        // Atomic write
        let tmp_file = self
            .data_dir
            .join(format!(".register-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(VaultError::Io)?;
        fs::rename(&tmp_file, self.register_path()).map_err(VaultError::Io)?;

        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.register_path()
    }
}
