//! # Command Layer
//!
//! This module contains the **core business logic** of sopvault. Each lifecycle
//! operation lives in its own submodule as a plain function over a
//! [`DataStore`](crate::store::DataStore) and the [`Services`] bundle.
//!
//! ## Role and Responsibilities
//!
//! Commands:
//! - Check authorization and preconditions before touching any state
//! - Run every register mutation inside one store transaction
//! - Move, write and archive physical files through [`crate::files`]
//! - Return a structured [`CmdResult`] with affected records and messages
//!
//! ## What Commands Do NOT Do
//!
//! - **Presentation**: no stdout, colors or formatting
//! - **Argument parsing**: the CLI turns strings into typed requests
//! - **Retries**: a failed operation is reported, never retried
//!
//! ## Side Effects and the Transaction Boundary
//!
//! The register commit is the authoritative boundary. Files written before a
//! commit (generated PDFs, uploaded copies) are removed again if the commit
//! fails. File moves of the archive and restore pipelines are compensated
//! best-effort only. Notifications are sent after the commit and their
//! failures become warnings in [`CmdResult::notification_failures`].
//!
//! ## Command Modules
//!
//! - [`upload`]: Register an uploaded file
//! - [`structured`]: Create and edit structured SOPs
//! - [`sync`]: Reconcile a structured SOP with its register row
//! - [`approve`]: Manager and admin approval
//! - [`reject`]: Return for review, or remove a plain upload
//! - [`deletion`]: Request and reject deletion
//! - [`archive`]: Approve deletion and archive the document
//! - [`restore`]: Bring an archived document back
//! - [`purge`]: Permanently erase an archived document
//! - [`get`]: Read-only queries
//! - [`number`]: SOP number allocation
//! - [`helpers`]: Shared utilities (reference resolution, validation)

use crate::audit::AuditEntry;
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::files::{type_folder, StorageLayout};
use crate::model::{DeletionLog, DocumentRecord, StructuredSop};
use crate::notify::{NotificationKind, Notifier};
use crate::reference::ReferenceData;
use crate::render::PdfRenderer;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

pub mod approve;
pub mod archive;
pub mod deletion;
pub mod get;
pub mod helpers;
pub mod number;
pub mod purge;
pub mod reject;
pub mod restore;
pub mod structured;
pub mod sync;
pub mod upload;

/// Collaborators every command may need, borrowed for one call.
pub struct Services<'a> {
    pub layout: &'a StorageLayout,
    pub config: &'a VaultConfig,
    pub renderer: &'a dyn PdfRenderer,
    pub notifier: &'a dyn Notifier,
    pub reference: &'a dyn ReferenceData,
}

impl Services<'_> {
    /// Storage folder for a document type.
    pub fn folder(&self, doc_type: &str) -> String {
        type_folder(self.reference, doc_type)
    }
}

/// How a caller names a register row: by id, or by SOP number with an
/// optional title to disambiguate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    Id(Uuid),
    Sop {
        number: String,
        title: Option<String>,
    },
}

impl DocumentRef {
    pub fn number(number: impl Into<String>) -> Self {
        Self::Sop {
            number: number.into(),
            title: None,
        }
    }
}

impl From<Uuid> for DocumentRef {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

/// A UUID parses as an id; anything else is an SOP number.
impl FromStr for DocumentRef {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VaultError::Validation(
                "A document id or SOP number is required".to_string(),
            ));
        }
        Ok(match Uuid::parse_str(s) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::number(s),
        })
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Sop {
                number,
                title: Some(title),
            } => write!(f, "{} ({})", number, title),
            Self::Sop { number, .. } => f.write_str(number),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub documents: Vec<DocumentRecord>,
    pub sops: Vec<StructuredSop>,
    pub deletion_logs: Vec<DeletionLog>,
    pub audit_entries: Vec<AuditEntry>,
    pub paths: Vec<PathBuf>,
    pub messages: Vec<CmdMessage>,
    /// Notifications that could not be delivered. The state change they
    /// describe has already been committed.
    pub notification_failures: Vec<NotificationKind>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_documents(mut self, documents: Vec<DocumentRecord>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_sops(mut self, sops: Vec<StructuredSop>) -> Self {
        self.sops = sops;
        self
    }

    pub fn with_deletion_logs(mut self, logs: Vec<DeletionLog>) -> Self {
        self.deletion_logs = logs;
        self
    }

    pub fn with_audit_entries(mut self, entries: Vec<AuditEntry>) -> Self {
        self.audit_entries = entries;
        self
    }

    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    pub fn has_warnings(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.level == MessageLevel::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ref_parses_ids_and_numbers() {
        let id = Uuid::new_v4();
        assert_eq!(
            id.to_string().parse::<DocumentRef>().unwrap(),
            DocumentRef::Id(id)
        );
        assert_eq!(
            " QA-001 ".parse::<DocumentRef>().unwrap(),
            DocumentRef::number("QA-001")
        );
        assert!("".parse::<DocumentRef>().is_err());
    }
}
