//! Two-stage approval.
//!
//! A manager moves a pending document to `Pending Admin Approval`; an admin
//! moves it to `Approved`, from any pending state. Managers may only approve
//! documents assigned to them, or documents with no supervisor (or the "N/A"
//! wildcard).
//!
//! Admin approval of a structured SOP renders the final PDF into
//! `Originals/<DocType>/<SopNumber>_<Title>.pdf`. The render, the file write
//! and the register commit succeed or fail together.

use super::helpers::{linked_sop_id, mirror_to_sop, notify, resolve_document, WrittenFile};
use super::{CmdMessage, CmdResult, DocumentRef, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::files::Category;
use crate::model::{Actor, ApprovalStage, DocumentRecord, DocumentStatus, Role};
use crate::notify::{Notification, NotificationKind};
use crate::render::{sop_footer, sop_html, PageSettings};
use crate::store::DataStore;
use chrono::Utc;
use tracing::info;

pub fn run<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    reference: &DocumentRef,
) -> Result<CmdResult> {
    let tables = store.load()?;
    let doc = resolve_document(&tables, reference)?.clone();

    match actor.role {
        Role::User => Err(VaultError::Unauthorized(format!(
            "{} cannot approve SOP {}: requires the Manager or Admin role",
            actor.name, doc.sop_number
        ))),
        Role::Manager => {
            check_approvable(&doc)?;
            manager_approve(store, services, actor, doc)
        }
        Role::Admin => {
            check_approvable(&doc)?;
            admin_approve(store, services, actor, doc)
        }
    }
}

fn check_approvable(doc: &DocumentRecord) -> Result<()> {
    if doc.is_archived || !doc.status.awaits_approval() {
        return Err(VaultError::Conflict(format!(
            "SOP {} is {} and cannot be approved",
            doc.sop_number, doc.status
        )));
    }
    Ok(())
}

fn manager_approve<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    doc: DocumentRecord,
) -> Result<CmdResult> {
    if let Some(supervisor) = doc.required_supervisor() {
        let by_email = doc
            .meta
            .supervisor_email
            .as_deref()
            .is_some_and(|email| actor.is(email));
        if !actor.is(supervisor) && !by_email {
            return Err(VaultError::Unauthorized(format!(
                "SOP {} must be approved by its supervisor {}",
                doc.sop_number, supervisor
            )));
        }
    }
    if doc.status == DocumentStatus::PendingAdminApproval {
        return Err(VaultError::Conflict(format!(
            "SOP {} is already manager-approved and awaits an admin",
            doc.sop_number
        )));
    }

    let now = Utc::now();
    let updated = store.transaction(|tx| {
        let row = tx
            .document_mut(&doc.id)
            .ok_or_else(|| VaultError::NotFound(format!("SOP {} disappeared", doc.sop_number)))?;
        row.status = DocumentStatus::PendingAdminApproval;
        row.stage = Some(ApprovalStage::Manager);
        row.manager_approved = true;
        row.manager_approved_at = Some(now);
        row.manager_approved_by = Some(actor.name.clone());
        row.reviewed_by = actor.name.clone();
        let updated = row.clone();
        mirror_to_sop(tx, &doc.id);
        tx.append_audit(AuditEntry::for_document(
            AuditAction::ManagerApproved,
            &updated,
            actor,
        ));
        Ok(updated)
    })?;

    info!(sop_number = %updated.sop_number, manager = %actor.name, "manager approved");
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "SOP {} approved by manager {}; awaiting admin approval",
        updated.sop_number, actor.name
    )));
    notify(
        services,
        &mut result,
        Notification::for_document(NotificationKind::PendingAdminApproval, &updated, &actor.name),
    );
    Ok(result.with_documents(vec![updated]))
}

fn admin_approve<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    doc: DocumentRecord,
) -> Result<CmdResult> {
    let tables = store.load()?;
    let sop = linked_sop_id(&tables, &doc).and_then(|id| tables.sop(&id).cloned());
    let today = Utc::now().date_naive();

    // Structured SOPs get their final PDF written next to the originals
    let final_pdf = match &sop {
        Some(sop) => {
            let mut finalized = sop.clone();
            finalized.effective_date = doc.meta.effective_date.or(sop.effective_date).or(Some(today));
            let bytes = services.renderer.render(
                &sop_html(&finalized),
                &sop_footer(&finalized),
                &PageSettings::default(),
            )?;
            let path = services
                .layout
                .live_dir(Category::Originals, &services.folder(&doc.meta.doc_type))
                .join(finalized.pdf_name());
            Some((WrittenFile::write(path, &bytes)?, finalized, bytes.len() as u64))
        }
        None => None,
    };

    let now = Utc::now();
    let committed = store.transaction(|tx| {
        let row = tx
            .document_mut(&doc.id)
            .ok_or_else(|| VaultError::NotFound(format!("SOP {} disappeared", doc.sop_number)))?;
        row.status = DocumentStatus::Approved;
        row.stage = Some(ApprovalStage::Admin);
        row.admin_approved = true;
        row.admin_approved_at = Some(now);
        row.admin_approved_by = Some(actor.name.clone());
        row.reviewed_by = actor.name.clone();
        row.meta.last_review_at = Some(now);
        row.rejection_reason = None;
        if let Some((written, finalized, size)) = &final_pdf {
            row.meta.effective_date = finalized.effective_date;
            row.meta.revision = finalized.revision;
            row.file_name = crate::files::file_name_of(&written.path);
            row.meta.size = *size;
        }
        let updated = row.clone();

        if let Some((_, finalized, _)) = &final_pdf {
            if let Some(linked) = tx.sop_mut(&finalized.id) {
                linked.status = DocumentStatus::Approved;
                linked.stage = Some(ApprovalStage::Admin);
                linked.reviewed_by = actor.name.clone();
                linked.approved_by = Some(actor.name.clone());
                linked.approved_at = Some(now);
                linked.effective_date = finalized.effective_date;
                linked.rejection_reason = None;
            }
        }
        tx.append_audit(
            AuditEntry::for_document(AuditAction::Approved, &updated, actor)
                .with_details(updated.meta.revision.to_string()),
        );
        Ok(updated)
    });

    let updated = match committed {
        Ok(updated) => updated,
        Err(e) => {
            if let Some((written, _, _)) = final_pdf {
                written.undo();
            }
            return Err(e);
        }
    };

    info!(sop_number = %updated.sop_number, admin = %actor.name, "document approved");
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "SOP {} approved ({})",
        updated.sop_number, updated.meta.revision
    )));
    if let Some((written, _, _)) = final_pdf {
        result.paths.push(written.path);
    }
    notify(
        services,
        &mut result,
        Notification::for_document(NotificationKind::FinalApproval, &updated, &actor.name),
    );
    Ok(result.with_documents(vec![updated]))
}
