//! Approving a deletion request: the archive pipeline.
//!
//! 1. Resolve the register row and its structured SOP, if any.
//! 2. Record `Archived` in the audit trail before any file moves.
//! 3. Move the original into `Archive/Deleted/Originals`, a video copy into
//!    `Archive/Deleted/Videos`, and the generated artifact into
//!    `Archive/Deleted/PDFs`. Missing files are skipped.
//! 4. In one transaction: flag the SOP and the row archived and write the
//!    deletion log, preferring archived file names over the live ones.
//!
//! Files already moved stay in the archive if a later step fails; the error is
//! reported and the register is left as it was.

use super::helpers::{linked_sop_id, require_reviewer, resolve_document};
use super::{CmdMessage, CmdResult, DocumentRef, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::files::archiver::{archive_timestamp, FileArchiver};
use crate::files::Category;
use crate::model::{Actor, DeletionLog, DocumentStatus};
use crate::store::DataStore;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub fn run<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    reference: &DocumentRef,
) -> Result<CmdResult> {
    require_reviewer(actor, "approve deletion requests")?;
    let tables = store.load()?;
    let doc = resolve_document(&tables, reference)?.clone();
    if doc.is_archived {
        return Err(VaultError::Conflict(format!(
            "SOP {} is already archived",
            doc.sop_number
        )));
    }
    if doc.status != DocumentStatus::PendingDeletion {
        return Err(VaultError::Conflict(format!(
            "SOP {} is {}; only documents pending deletion can be archived",
            doc.sop_number, doc.status
        )));
    }
    let sop_id = linked_sop_id(&tables, &doc);

    store.transaction(|tx| {
        tx.append_audit(
            AuditEntry::for_document(AuditAction::Archived, &doc, actor).with_details(
                doc.deletion_reason
                    .clone()
                    .unwrap_or_else(|| "Deletion approved".to_string()),
            ),
        );
        Ok(())
    })?;

    let now = Utc::now();
    let timestamp = archive_timestamp(now);
    let folder = services.folder(&doc.meta.doc_type);
    let archiver = FileArchiver::new(services.layout);
    let mut result = CmdResult::default();

    let archived_original =
        archiver.archive(&doc.original_file, Some(&folder), &timestamp, Category::Originals)?;
    if archived_original.is_none() {
        result.add_message(CmdMessage::warning(format!(
            "Original file {} was not found; nothing archived",
            doc.original_file
        )));
    }

    let video = doc.video_file.clone().or_else(|| {
        services
            .config
            .is_video(&doc.original_file)
            .then(|| doc.original_file.clone())
    });
    let archived_video = match &video {
        Some(name) => archiver.archive(name, Some(&folder), &timestamp, Category::Videos)?,
        None => None,
    };

    let archived_artifact = if doc.has_artifact() {
        let archived = archiver.archive(&doc.file_name, Some(&folder), &timestamp, Category::Pdfs)?;
        if archived.is_none() {
            result.add_message(CmdMessage::warning(format!(
                "Generated file {} was not found; nothing archived",
                doc.file_name
            )));
        }
        archived
    } else {
        None
    };

    let log = DeletionLog {
        id: Uuid::new_v4(),
        document_id: (!doc.structured).then_some(doc.id),
        sop_id,
        sop_number: doc.sop_number.clone(),
        title: doc.title.clone(),
        file_name: archived_artifact.unwrap_or_else(|| doc.file_name.clone()),
        original_file_name: archived_original.unwrap_or_else(|| doc.original_file.clone()),
        video_file_name: archived_video.or(video),
        requested_by: doc.deletion_requested_by.clone(),
        reason: doc.deletion_reason.clone(),
        deleted_by: actor.name.clone(),
        deleted_at: now,
        was_approved: doc.admin_approved,
        structured: doc.structured,
        meta: doc.meta.clone(),
    };

    let committed = store.transaction(|tx| {
        if let Some(id) = sop_id {
            if let Some(sop) = tx.sop_mut(&id) {
                sop.archive(now);
            }
        }
        let row = tx
            .document_mut(&doc.id)
            .ok_or_else(|| VaultError::NotFound(format!("SOP {} disappeared", doc.sop_number)))?;
        row.archive(now);
        let archived = row.clone();
        tx.insert_deletion_log(log.clone());
        Ok(archived)
    });
    let archived = match committed {
        Ok(archived) => archived,
        Err(e) => {
            warn!(
                sop_number = %doc.sop_number,
                error = %e,
                "archive commit failed after files were moved"
            );
            return Err(e);
        }
    };

    info!(
        sop_number = %archived.sop_number,
        reviewer = %actor.name,
        original = %log.original_file_name,
        "document archived"
    );
    result.add_message(CmdMessage::success(format!(
        "SOP {} archived; it can be restored from the trash",
        archived.sop_number
    )));
    let mut result = result.with_documents(vec![archived]).with_deletion_logs(vec![log]);
    if let Some(id) = sop_id {
        if let Some(sop) = store.load()?.sop(&id).cloned() {
            result = result.with_sops(vec![sop]);
        }
    }
    Ok(result)
}
