use super::backend::StorageBackend;
use super::tables::Tables;
use crate::error::{Result, VaultError};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;

/// In-memory storage backend for testing.
///
/// Uses `RefCell` for interior mutability since every operation runs to
/// completion on one thread. This keeps `StorageBackend` on `&self`.
#[derive(Default)]
pub struct MemBackend {
    tables: RefCell<Tables>,
    simulate_write_error: Cell<bool>,
    commits: Cell<usize>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing rollback paths.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// Replaces the stored state without any checks.
    pub fn seed(&self, tables: Tables) {
        *self.tables.borrow_mut() = tables;
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.get()
    }
}

impl StorageBackend for MemBackend {
    fn load_tables(&self) -> Result<Tables> {
        Ok(self.tables.borrow().clone())
    }

    fn save_tables(&self, tables: &Tables) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(VaultError::Store("Simulated write error".to_string()));
        }
        *self.tables.borrow_mut() = tables.clone();
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory://register")
    }
}
