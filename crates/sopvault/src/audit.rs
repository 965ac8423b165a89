//! Append-only lifecycle trail.
//!
//! Entries are keyed by SOP number (and the register id when one exists) and
//! keep the document title as it was when the action happened. Nothing ever
//! edits or removes an entry; the store only appends.

use crate::model::{Actor, DocumentRecord, StructuredSop};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    Uploaded,
    Created,
    Edited,
    #[serde(rename = "Manager Approved")]
    ManagerApproved,
    Approved,
    #[serde(rename = "Returned for Review")]
    ReturnedForReview,
    #[serde(rename = "Deletion Requested")]
    DeletionRequested,
    #[serde(rename = "Deletion Rejected")]
    DeletionRejected,
    Archived,
    Revised,
    Restored,
    Purged,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uploaded => "Uploaded",
            Self::Created => "Created",
            Self::Edited => "Edited",
            Self::ManagerApproved => "Manager Approved",
            Self::Approved => "Approved",
            Self::ReturnedForReview => "Returned for Review",
            Self::DeletionRequested => "Deletion Requested",
            Self::DeletionRejected => "Deletion Rejected",
            Self::Archived => "Archived",
            Self::Revised => "Revised",
            Self::Restored => "Restored",
            Self::Purged => "Purged",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    pub sop_number: String,
    pub action: AuditAction,
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub details: String,
    pub title: String,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        sop_number: impl Into<String>,
        title: impl Into<String>,
        actor: &Actor,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: None,
            sop_number: sop_number.into(),
            action,
            actor: actor.name.clone(),
            at: Utc::now(),
            details: String::new(),
            title: title.into(),
        }
    }

    pub fn for_document(action: AuditAction, doc: &DocumentRecord, actor: &Actor) -> Self {
        Self::new(action, &doc.sop_number, &doc.title, actor).with_document(doc.id)
    }

    pub fn for_sop(action: AuditAction, sop: &StructuredSop, actor: &Actor) -> Self {
        let entry = Self::new(action, &sop.sop_number, &sop.title, actor);
        match sop.document_id {
            Some(id) => entry.with_document(id),
            None => entry,
        }
    }

    pub fn with_document(mut self, id: Uuid) -> Self {
        self.document_id = Some(id);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}
