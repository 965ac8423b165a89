//! Outbound notifications.
//!
//! Lifecycle commands tell interested people what happened through a
//! [`Notifier`]. Delivery is best-effort: a failed notification never undoes
//! the state change it reports, it only adds a warning to the command result.

use crate::error::Result;
use crate::model::{DocumentRecord, DocumentStatus};
use chrono::NaiveDate;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Manager approved; admins should look at it.
    PendingAdminApproval,
    /// A structured SOP was created or revised and awaits review.
    PendingSop,
    /// Admin approved; the author is told.
    FinalApproval,
    Rejected,
    /// Admin rejected a plain upload, which removes it.
    RejectedAndDeleted,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PendingAdminApproval => "pending admin approval",
            Self::PendingSop => "pending SOP",
            Self::FinalApproval => "final approval",
            Self::Rejected => "rejection",
            Self::RejectedAndDeleted => "rejection with deletion",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub sop_number: String,
    pub title: String,
    pub department: String,
    pub file_name: String,
    pub author: String,
    pub author_email: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub approver: String,
    pub status: DocumentStatus,
    pub reason: Option<String>,
}

impl Notification {
    pub fn for_document(kind: NotificationKind, doc: &DocumentRecord, approver: &str) -> Self {
        Self {
            kind,
            sop_number: doc.sop_number.clone(),
            title: doc.title.clone(),
            department: doc.meta.department.clone(),
            file_name: doc.original_file.clone(),
            author: doc.meta.author.clone(),
            author_email: doc.meta.author_email.clone(),
            effective_date: doc.meta.effective_date,
            approver: approver.to_string(),
            status: doc.status,
            reason: doc.rejection_reason.clone(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: &Notification) -> Result<()> {
        info!(
            kind = %n.kind,
            sop_number = %n.sop_number,
            department = %n.department,
            file = %n.file_name,
            author = %n.author,
            approver = %n.approver,
            status = %n.status,
            "notification"
        );
        Ok(())
    }
}
