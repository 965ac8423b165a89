//! Reconciles a structured SOP with its register row.
//!
//! The structured SOP is the source of truth for content and metadata; the
//! register row is the source of truth for approval and files. Sync copies
//! the former onto the latter:
//!
//! 1. Find the live structured row for the SOP number.
//! 2. If its revision differs from the SOP's, archive it and carry on as if
//!    there were none. Old revisions are never edited in place.
//! 3. Create or update the row: `<SopNumber>_<Title>.pdf` as file names,
//!    shared metadata, status `Pending Approval`, reviewer `Pending`, size of
//!    the generated PDF when it is on disk.
//! 4. Link the SOP to the row and stamp the sync time.
//!
//! [`apply`] works inside a caller's transaction so creation and editing can
//! sync atomically; [`run`] is the standalone entry point.

use super::helpers::{file_size, notify};
use super::{CmdMessage, CmdResult, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::files::Category;
use crate::model::{
    Actor, DocumentMeta, DocumentRecord, DocumentStatus, PENDING_REVIEWER,
};
use crate::notify::{Notification, NotificationKind};
use crate::store::{DataStore, Tables};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub document_id: Uuid,
    /// Row of an older revision archived on the way.
    pub archived_previous: Option<Uuid>,
    pub created: bool,
}

pub fn apply(
    tables: &mut Tables,
    services: &Services,
    sop_id: Uuid,
    actor: &Actor,
    pdf_name: &str,
) -> Result<SyncOutcome> {
    let sop = tables
        .sop(&sop_id)
        .cloned()
        .ok_or_else(|| VaultError::NotFound(format!("No structured SOP with id {}", sop_id)))?;
    if !sop.is_live() {
        return Err(VaultError::Conflict(format!(
            "Structured SOP {} is archived and cannot be synced",
            sop.sop_number
        )));
    }
    let now = Utc::now();

    let mut archived_previous = None;
    let mut existing = tables
        .live_structured_document(&sop.sop_number)
        .map(|d| (d.id, d.meta.revision));
    if let Some((id, revision)) = existing {
        if revision != sop.revision {
            if let Some(old) = tables.document_mut(&id) {
                old.archive(now);
            }
            tables.append_audit(
                AuditEntry::new(AuditAction::Revised, &sop.sop_number, &sop.title, actor)
                    .with_document(id)
                    .with_details(format!("{} superseded by {}", revision, sop.revision)),
            );
            info!(sop_number = %sop.sop_number, from = %revision, to = %sop.revision, "previous revision archived");
            archived_previous = Some(id);
            existing = None;
        }
    }

    let folder = services.folder(&sop.doc_type);
    let size = file_size(
        &services
            .layout
            .live_dir(Category::Pdfs, &folder)
            .join(pdf_name),
    );

    let apply_sop = |doc: &mut DocumentRecord| {
        doc.title = sop.title.clone();
        doc.original_file = pdf_name.to_string();
        doc.file_name = pdf_name.to_string();
        doc.meta.department = sop.department.clone();
        doc.meta.doc_type = sop.doc_type.clone();
        doc.meta.area = sop.area.clone();
        doc.meta.revision = sop.revision;
        doc.meta.content_type = "application/pdf".to_string();
        doc.meta.size = size;
        doc.meta.author = sop.author.clone();
        doc.meta.author_email = sop.author_email.clone();
        doc.meta.supervisor = sop.supervisor.clone();
        doc.meta.supervisor_email = sop.supervisor_email.clone();
        doc.meta.effective_date = sop.effective_date;
        doc.structured = true;
        doc.sop_id = Some(sop.id);
        doc.reset_approvals();
    };

    let (document_id, created) = match existing {
        Some((id, _)) => {
            let doc = tables
                .document_mut(&id)
                .ok_or_else(|| VaultError::Store(format!("Register entry {} vanished", id)))?;
            apply_sop(doc);
            (id, false)
        }
        None => {
            let meta = DocumentMeta {
                department: sop.department.clone(),
                doc_type: sop.doc_type.clone(),
                area: sop.area.clone(),
                revision: sop.revision,
                content_type: "application/pdf".to_string(),
                size,
                author: sop.author.clone(),
                author_email: sop.author_email.clone(),
                supervisor: sop.supervisor.clone(),
                supervisor_email: sop.supervisor_email.clone(),
                uploaded_at: now,
                last_review_at: None,
                effective_date: sop.effective_date,
            };
            let mut doc = DocumentRecord::new(&sop.sop_number, &sop.title, pdf_name, meta);
            apply_sop(&mut doc);
            let id = doc.id;
            tables.insert_document(doc)?;
            (id, true)
        }
    };

    if let Some(linked) = tables.sop_mut(&sop_id) {
        linked.document_id = Some(document_id);
        linked.synced_at = Some(now);
        linked.status = DocumentStatus::PendingApproval;
        linked.stage = None;
        linked.reviewed_by = PENDING_REVIEWER.to_string();
        linked.rejection_reason = None;
        linked.returned_at = None;
        linked.approved_by = None;
        linked.approved_at = None;
    }

    Ok(SyncOutcome {
        document_id,
        archived_previous,
        created,
    })
}

/// Syncs one structured SOP in its own transaction and announces it.
pub fn run<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    sop_id: Uuid,
) -> Result<CmdResult> {
    let pdf_name = store
        .load()?
        .sop(&sop_id)
        .map(|s| s.pdf_name())
        .ok_or_else(|| VaultError::NotFound(format!("No structured SOP with id {}", sop_id)))?;

    let (outcome, doc) = store.transaction(|tx| {
        let outcome = apply(tx, services, sop_id, actor, &pdf_name)?;
        let doc = tx
            .document(&outcome.document_id)
            .cloned()
            .ok_or_else(|| VaultError::Store("Synced register entry missing".to_string()))?;
        Ok((outcome, doc))
    })?;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "SOP {} synced to the register ({}, {})",
        doc.sop_number, doc.meta.revision, doc.status
    )));
    if outcome.archived_previous.is_some() {
        result.add_message(CmdMessage::info(format!(
            "The previous revision of SOP {} was archived",
            doc.sop_number
        )));
    }
    notify(
        services,
        &mut result,
        Notification::for_document(NotificationKind::PendingSop, &doc, &actor.name),
    );
    Ok(result.with_documents(vec![doc]))
}
