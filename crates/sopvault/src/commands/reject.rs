//! Rejection of a pending document.
//!
//! - Structured SOP: both the SOP and its register row go to `Returned for
//!   Review` so the author can edit and resubmit.
//! - Plain upload rejected by a manager: returned for review.
//! - Plain upload rejected by an admin: the row and its files are deleted
//!   outright. This path writes no deletion log, so the document cannot be
//!   restored; only the audit trail records it. Files are matched by exact
//!   name, moved aside before the commit and deleted after it, so a failed
//!   commit leaves both the row and its files in place. A file another live
//!   entry also names is kept.

use super::helpers::{
    linked_sop_id, notify, require_reviewer, resolve_document, validate_reason, StagedRemoval,
};
use super::{CmdMessage, CmdResult, DocumentRef, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::files::archiver::FileArchiver;
use crate::files::Category;
use crate::model::{return_for_review, Actor, DocumentRecord, Role, NO_ARTIFACT};
use crate::notify::{Notification, NotificationKind};
use crate::store::DataStore;
use chrono::Utc;
use tracing::{info, warn};

pub fn run<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    reference: &DocumentRef,
    reason: &str,
) -> Result<CmdResult> {
    require_reviewer(actor, "reject documents")?;
    let reason = validate_reason(reason, "rejection reason")?;

    let tables = store.load()?;
    let doc = resolve_document(&tables, reference)?.clone();
    if doc.is_archived || !doc.status.awaits_approval() {
        return Err(VaultError::Conflict(format!(
            "SOP {} is {} and cannot be rejected",
            doc.sop_number, doc.status
        )));
    }
    let sop_id = linked_sop_id(&tables, &doc);

    if sop_id.is_none() && actor.role == Role::Admin {
        return delete_upload(store, services, actor, doc, &reason);
    }

    let now = Utc::now();
    let updated = store.transaction(|tx| {
        let row = tx
            .document_mut(&doc.id)
            .ok_or_else(|| VaultError::NotFound(format!("SOP {} disappeared", doc.sop_number)))?;
        return_for_review(row, actor, &reason, now);
        let updated = row.clone();
        if let Some(id) = sop_id {
            if let Some(sop) = tx.sop_mut(&id) {
                return_for_review(sop, actor, &reason, now);
            }
        }
        tx.append_audit(
            AuditEntry::for_document(AuditAction::ReturnedForReview, &updated, actor)
                .with_details(reason.clone()),
        );
        Ok(updated)
    })?;

    info!(sop_number = %updated.sop_number, reviewer = %actor.name, "returned for review");
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "SOP {} returned for review: {}",
        updated.sop_number, reason
    )));
    notify(
        services,
        &mut result,
        Notification::for_document(NotificationKind::Rejected, &updated, &actor.name),
    );
    Ok(result.with_documents(vec![updated]))
}

fn delete_upload<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    doc: DocumentRecord,
    reason: &str,
) -> Result<CmdResult> {
    let folder = services.folder(&doc.meta.doc_type);
    let archiver = FileArchiver::new(services.layout);
    let mut files = vec![(doc.original_file.as_str(), Category::Originals)];
    if let Some(video) = doc.video_file.as_deref() {
        files.push((video, Category::Videos));
    }
    if doc.file_name != NO_ARTIFACT && doc.file_name != doc.original_file {
        files.push((doc.file_name.as_str(), Category::Pdfs));
    }

    let mut staged: Vec<StagedRemoval> = Vec::new();
    let committed = store.transaction(|tx| {
        for (name, category) in &files {
            if tx.file_in_use(&doc.id, name) {
                info!(file = *name, %category, "file shared with another entry, kept");
                continue;
            }
            if let Some(path) = archiver.find_exact(name, Some(&folder), *category) {
                staged.push(StagedRemoval::stage(path)?);
            }
        }
        tx.remove_document(&doc.id);
        tx.append_audit(
            AuditEntry::for_document(AuditAction::Archived, &doc, actor)
                .with_details(format!("Rejected and deleted: {}", reason)),
        );
        Ok(())
    });
    if let Err(e) = committed {
        for file in staged {
            file.undo();
        }
        return Err(e);
    }

    let mut result = CmdResult::default();
    for file in staged {
        let path = file.path.clone();
        if let Err(e) = file.finish() {
            warn!(path = %path.display(), error = %e, "could not delete rejected file");
            result.add_message(CmdMessage::warning(format!(
                "File {} could not be deleted: {}",
                path.display(),
                e
            )));
        }
    }

    info!(sop_number = %doc.sop_number, admin = %actor.name, "rejected upload deleted");
    result.add_message(CmdMessage::success(format!(
        "SOP {} rejected and deleted: {}",
        doc.sop_number, reason
    )));
    let mut notification =
        Notification::for_document(NotificationKind::RejectedAndDeleted, &doc, &actor.name);
    notification = notification.with_reason(format!("{}: {}", actor.name, reason));
    notify(services, &mut result, notification);
    Ok(result.with_documents(vec![doc]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentStatus;
    use crate::test_utils::{admin, author, manager, sample_draft, TestEnv};

    #[test]
    fn structured_rejection_returns_both_aggregates() {
        let mut env = TestEnv::new();
        let created = env.create_sop(sample_draft("QA-400", 0));
        let doc_id = created.documents[0].id;

        let (store, services) = env.parts();
        run(store, &services, &admin(), &DocumentRef::Id(doc_id), "Step 2 is unclear").unwrap();

        let tables = env.tables();
        let doc = tables.document(&doc_id).unwrap();
        let sop = tables.sop(&created.sops[0].id).unwrap();
        assert_eq!(doc.status, DocumentStatus::ReturnedForReview);
        assert_eq!(sop.status, DocumentStatus::ReturnedForReview);
        assert_eq!(
            sop.rejection_reason.as_deref(),
            Some("Ada Admin: Step 2 is unclear")
        );
        assert!(sop.returned_at.is_some());
        assert!(env.notifier.kinds().contains(&NotificationKind::Rejected));
    }

    #[test]
    fn admin_rejection_of_upload_deletes_row_and_files_without_log() {
        let mut env = TestEnv::new();
        let doc = env.upload("QA-401", "a.docx");
        assert!(env.storage("Originals/SOP/a.docx").is_file());

        let (store, services) = env.parts();
        run(store, &services, &admin(), &DocumentRef::Id(doc.id), "Wrong template").unwrap();

        let tables = env.tables();
        assert!(tables.document(&doc.id).is_none());
        assert!(tables.deletion_logs.is_empty());
        assert!(!env.storage("Originals/SOP/a.docx").exists());
        assert_eq!(
            tables.audit_for("QA-401").last().unwrap().action,
            AuditAction::Archived
        );
        assert_eq!(
            env.notifier.kinds().last(),
            Some(&NotificationKind::RejectedAndDeleted)
        );
    }

    #[test]
    fn deleting_an_upload_never_touches_a_file_sharing_its_base_name() {
        let mut env = TestEnv::new();
        let kept = env.upload("QA-920", "report.pdf");
        let rejected = env.upload("QA-921", "report.docx");
        std::fs::remove_file(env.storage("Originals/SOP/report.docx")).unwrap();

        let (store, services) = env.parts();
        run(store, &services, &admin(), &DocumentRef::Id(rejected.id), "Wrong file").unwrap();

        let tables = env.tables();
        assert!(tables.document(&rejected.id).is_none());
        assert!(tables.document(&kept.id).unwrap().is_live());
        assert!(env.storage("Originals/SOP/report.pdf").is_file());
    }

    #[test]
    fn file_that_cannot_be_moved_aside_keeps_the_row() {
        let mut env = TestEnv::new();
        let doc = env.upload("QA-922", "a.docx");
        std::fs::create_dir_all(env.storage("Originals/SOP/.a.docx.removing/blocker")).unwrap();

        let (store, services) = env.parts();
        assert!(run(store, &services, &admin(), &DocumentRef::Id(doc.id), "Wrong template").is_err());

        assert_eq!(env.document(&doc.id).status, DocumentStatus::PendingApproval);
        assert!(env.storage("Originals/SOP/a.docx").is_file());
        assert!(env.tables().audit_for("QA-922").iter().all(|e| e.action != AuditAction::Archived));
    }

    #[test]
    fn commit_failure_puts_rejected_files_back() {
        let mut env = TestEnv::new();
        let doc = env.upload("QA-923", "a.docx");
        env.store.backend().set_simulate_write_error(true);

        let (store, services) = env.parts();
        assert!(run(store, &services, &admin(), &DocumentRef::Id(doc.id), "Wrong template").is_err());
        env.store.backend().set_simulate_write_error(false);

        assert_eq!(env.document(&doc.id).status, DocumentStatus::PendingApproval);
        assert!(env.storage("Originals/SOP/a.docx").is_file());
        assert!(!env.storage("Originals/SOP/.a.docx.removing").exists());
        assert!(env.notifier.kinds().iter().all(|k| *k != NotificationKind::RejectedAndDeleted));
    }

    #[test]
    fn manager_rejection_of_upload_returns_it() {
        let mut env = TestEnv::new();
        let doc = env.upload("QA-402", "a.docx");
        let (store, services) = env.parts();
        run(store, &services, &manager(), &DocumentRef::Id(doc.id), "Typo").unwrap();

        let row = env.document(&doc.id);
        assert_eq!(row.status, DocumentStatus::ReturnedForReview);
        assert_eq!(row.reviewed_by, "Max Manager");
        assert!(env.storage("Originals/SOP/a.docx").is_file());
    }

    #[test]
    fn reason_and_role_are_checked_first() {
        let mut env = TestEnv::new();
        let doc = env.upload("QA-403", "a.docx");
        let (store, services) = env.parts();
        assert!(matches!(
            run(store, &services, &admin(), &DocumentRef::Id(doc.id), "   "),
            Err(VaultError::Validation(_))
        ));
        assert!(matches!(
            run(store, &services, &author(), &DocumentRef::Id(doc.id), "no"),
            Err(VaultError::Unauthorized(_))
        ));
        assert_eq!(env.document(&doc.id).status, DocumentStatus::PendingApproval);
    }

    #[test]
    fn returned_upload_can_be_resubmitted() {
        let mut env = TestEnv::new();
        let doc = env.upload("QA-404", "a.docx");
        let (store, services) = env.parts();
        run(store, &services, &manager(), &DocumentRef::Id(doc.id), "Typo").unwrap();

        let fixed = env.upload("QA-404", "a-fixed.docx");
        let tables = env.tables();
        assert!(tables.document(&doc.id).is_none());
        assert_eq!(tables.live_document("QA-404").unwrap().id, fixed.id);
        assert!(!env.storage("Originals/SOP/a.docx").exists());
        assert!(env.storage("Originals/SOP/a-fixed.docx").is_file());
    }
}
