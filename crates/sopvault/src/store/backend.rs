use super::tables::Tables;
use crate::error::Result;
use std::path::PathBuf;

/// Abstract interface for raw record persistence.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while `RecordStore` handles the "what" (transactions, invariants).
pub trait StorageBackend {
    /// Load every collection. A backend that has never been written to
    /// returns empty tables.
    fn load_tables(&self) -> Result<Tables>;

    /// Replace every collection.
    /// MUST be atomic (e.g. write to tmp then rename) so a failed commit
    /// leaves the previous state intact.
    fn save_tables(&self, tables: &Tables) -> Result<()>;

    /// Where the records live. For `FsBackend` this is the real file, for
    /// `MemBackend` a virtual path.
    fn location(&self) -> PathBuf;
}
