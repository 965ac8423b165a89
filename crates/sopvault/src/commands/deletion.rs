//! Deletion requests.
//!
//! Any user may ask for an approved document to be deleted; the document then
//! waits in `Pending Deletion` until a reviewer approves the request (see
//! [`archive`](super::archive)) or rejects it, which puts it back to
//! `Approved`.

use super::helpers::{mirror_to_sop, require_reviewer, resolve_document, validate_reason};
use super::{CmdMessage, CmdResult, DocumentRef};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::model::{Actor, DocumentStatus};
use crate::store::DataStore;
use chrono::Utc;
use tracing::info;

pub fn request<S: DataStore>(
    store: &mut S,
    actor: &Actor,
    reference: &DocumentRef,
    reason: &str,
) -> Result<CmdResult> {
    let reason = validate_reason(reason, "deletion reason")?;
    let tables = store.load()?;
    let doc = resolve_document(&tables, reference)?.clone();

    match doc.status {
        _ if doc.is_archived => {
            return Err(VaultError::Conflict(format!(
                "SOP {} is already archived",
                doc.sop_number
            )))
        }
        DocumentStatus::PendingDeletion => {
            return Err(VaultError::Conflict(format!(
                "SOP {} already has a pending deletion request",
                doc.sop_number
            )))
        }
        DocumentStatus::Approved => {}
        other => {
            return Err(VaultError::Conflict(format!(
                "SOP {} is {}; only approved documents can be put up for deletion",
                doc.sop_number, other
            )))
        }
    }

    let now = Utc::now();
    let updated = store.transaction(|tx| {
        let row = tx
            .document_mut(&doc.id)
            .ok_or_else(|| VaultError::NotFound(format!("SOP {} disappeared", doc.sop_number)))?;
        row.status = DocumentStatus::PendingDeletion;
        row.deletion_requested_by = Some(actor.name.clone());
        row.deletion_reason = Some(reason.clone());
        row.deletion_requested_at = Some(now);
        let updated = row.clone();
        mirror_to_sop(tx, &doc.id);
        tx.append_audit(
            AuditEntry::for_document(AuditAction::DeletionRequested, &updated, actor)
                .with_details(reason.clone()),
        );
        Ok(updated)
    })?;

    info!(sop_number = %updated.sop_number, requester = %actor.name, "deletion requested");
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Deletion of SOP {} requested: {}",
        updated.sop_number, reason
    )));
    Ok(result.with_documents(vec![updated]))
}

pub fn reject<S: DataStore>(store: &mut S, actor: &Actor, reference: &DocumentRef) -> Result<CmdResult> {
    require_reviewer(actor, "reject deletion requests")?;
    let tables = store.load()?;
    let doc = resolve_document(&tables, reference)?.clone();
    if doc.is_archived || doc.status != DocumentStatus::PendingDeletion {
        return Err(VaultError::Conflict(format!(
            "SOP {} has no pending deletion request",
            doc.sop_number
        )));
    }

    let updated = store.transaction(|tx| {
        let row = tx
            .document_mut(&doc.id)
            .ok_or_else(|| VaultError::NotFound(format!("SOP {} disappeared", doc.sop_number)))?;
        let details = row.deletion_reason.clone().unwrap_or_default();
        row.status = DocumentStatus::Approved;
        row.clear_deletion_request();
        let updated = row.clone();
        mirror_to_sop(tx, &doc.id);
        tx.append_audit(
            AuditEntry::for_document(AuditAction::DeletionRejected, &updated, actor)
                .with_details(details),
        );
        Ok(updated)
    })?;

    info!(sop_number = %updated.sop_number, reviewer = %actor.name, "deletion request rejected");
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Deletion request for SOP {} rejected; document stays approved",
        updated.sop_number
    )));
    Ok(result.with_documents(vec![updated]))
}
