use super::backend::StorageBackend;
use super::tables::Tables;
use super::DataStore;
use crate::error::Result;
use std::path::PathBuf;
use tracing::debug;

pub struct RecordStore<B: StorageBackend> {
    /// The underlying storage backend.
    /// Exposed as pub(crate) for testing and internal access only.
    pub(crate) backend: B,
}

impl<B: StorageBackend> RecordStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: StorageBackend> DataStore for RecordStore<B> {
    fn load(&self) -> Result<Tables> {
        self.backend.load_tables()
    }

    fn commit(&mut self, tables: Tables) -> Result<()> {
        // Validate before writing so a rejected state never reaches disk
        tables.check_invariants()?;
        self.backend.save_tables(&tables)?;
        debug!(
            documents = tables.documents.len(),
            sops = tables.sops.len(),
            deletion_logs = tables.deletion_logs.len(),
            "register committed"
        );
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.backend.location()
    }
}
