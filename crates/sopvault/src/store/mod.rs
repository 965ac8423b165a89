//! # Storage Layer
//!
//! This module defines the record-store abstraction. The [`DataStore`] trait
//! lets the commands work with different backends and gives them the one
//! database guarantee they rely on: begin / commit / rollback.
//!
//! ## Transactions
//!
//! A transaction loads a snapshot of every collection into an owned
//! [`Tables`], lets the caller mutate it, and commits the whole snapshot in a
//! single atomic write:
//!
//! ```ignore
//! store.transaction(|tx| {
//!     let doc = tx.document_mut(&id).ok_or(...)?;
//!     doc.status = DocumentStatus::Approved;
//!     Ok(())
//! })?;
//! ```
//!
//! - **Commit**: the closure returned `Ok` and the backend accepted the write.
//! - **Rollback**: the closure returned `Err`, or the commit failed. The
//!   mutated snapshot is dropped and the stored state is untouched.
//!
//! Filesystem side effects made inside the closure are *not* covered; callers
//! that move files compensate on their own.
//!
//! ## Invariants Checked at Commit
//!
//! [`Tables::check_invariants`] runs before every write:
//! - At most one non-archived register row per SOP number.
//! - At most one live structured SOP per SOP number, each linked to a live
//!   structured register row.
//!
//! ## Implementations
//!
//! - [`fs::FileStore`]: JSON file (`register.json`) in the data directory.
//! - [`memory::InMemoryStore`]: For testing logic without filesystem I/O.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//! ├── register.json      # Documents, structured SOPs, deletion logs, audit trail
//! └── sopvault.toml      # Configuration
//! ```

use crate::error::Result;
use std::path::PathBuf;

pub mod backend;
pub mod fs;
pub mod fs_backend;
pub mod mem_backend;
pub mod memory;
pub mod record_store;
pub mod tables;

pub use tables::Tables;

/// Abstract interface for the record store.
pub trait DataStore {
    /// Read a consistent snapshot of every collection.
    fn load(&self) -> Result<Tables>;

    /// Persist a new state in one write. Refuses states that break the
    /// register invariants.
    fn commit(&mut self, tables: Tables) -> Result<()>;

    /// Where the records are kept.
    fn location(&self) -> PathBuf;

    /// Run `f` against a snapshot and commit it if `f` succeeds.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Tables) -> Result<T>,
    {
        let mut tables = self.load()?;
        let value = f(&mut tables)?;
        self.commit(tables)?;
        Ok(value)
    }
}
