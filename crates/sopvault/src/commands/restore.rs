//! Brings an archived document back from the trash.
//!
//! The deletion log names the archived files. Each one found under
//! `Archive/Deleted/<Category>` moves back to its live folder with the
//! timestamp prefix stripped; a taken name gets `_restored_<n>`. If none of
//! them is found the restore is refused and nothing changes.
//!
//! The register row is reactivated (or rebuilt from the log snapshot) as
//! `Approved`. A structured SOP archived with it is unarchived as `Restored`
//! and linked to the row again; its steps were never removed.
//!
//! When the register commit fails the files are moved back into the archive,
//! best-effort.

use super::helpers::{require_reviewer, resolve_deletion_log};
use super::{CmdMessage, CmdResult, DocumentRef, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::files::archiver::strip_archive_prefix;
use crate::files::{file_name_of, move_file, unique_destination, Category, StorageLayout};
use crate::model::{Actor, ApprovalStage, DeletionLog, DocumentRecord, DocumentStatus, NO_ARTIFACT};
use crate::store::{DataStore, Tables};
use std::path::PathBuf;
use tracing::{info, warn};

/// Archived file names of a log with the category each was archived into.
pub(crate) fn archived_files(log: &DeletionLog) -> Vec<(String, Category)> {
    let mut files = Vec::with_capacity(3);
    let mut push = |name: &str, category: Category| {
        let name = name.trim();
        if !name.is_empty() && name != NO_ARTIFACT {
            files.push((name.to_string(), category));
        }
    };
    push(&log.original_file_name, Category::Originals);
    push(&log.file_name, Category::Pdfs);
    if let Some(video) = &log.video_file_name {
        push(video, Category::Videos);
    }
    files
}

/// A file moved out of the archive, remembered so it can be put back.
struct Restored {
    category: Category,
    archived: PathBuf,
    live: PathBuf,
}

pub fn run<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    reference: &DocumentRef,
) -> Result<CmdResult> {
    require_reviewer(actor, "restore documents")?;
    let tables = store.load()?;
    let log = resolve_deletion_log(&tables, reference)?.clone();
    if let Some(live) = tables.live_document(&log.sop_number) {
        return Err(VaultError::Conflict(format!(
            "SOP {} already has a live register entry ({}, {}); restore refused",
            log.sop_number, live.meta.revision, live.status
        )));
    }

    let layout = services.layout;
    let found: Vec<(String, Category, PathBuf)> = archived_files(&log)
        .into_iter()
        .filter_map(|(name, category)| {
            let path = layout.archive_dir(category).join(&name);
            path.is_file().then_some((name, category, path))
        })
        .collect();
    if found.is_empty() {
        return Err(VaultError::NotFound(format!(
            "None of the archived files of SOP {} exist any more; restore refused",
            log.sop_number
        )));
    }

    let folder = services.folder(&log.meta.doc_type);
    let mut result = CmdResult::default();
    for (name, category) in archived_files(&log) {
        if !found.iter().any(|(n, c, _)| *n == name && *c == category) {
            warn!(file = %name, %category, "archived file missing, skipped");
            result.add_message(CmdMessage::warning(format!(
                "Archived file {} was not found and was not restored",
                name
            )));
        }
    }

    let mut moved: Vec<Restored> = Vec::with_capacity(found.len());
    for (name, category, archived) in &found {
        let dest = unique_destination(
            &layout.live_dir(*category, &folder),
            strip_archive_prefix(name),
            "_restored_",
        );
        if let Err(e) = move_file(archived, &dest) {
            put_back(&moved);
            return Err(e.into());
        }
        moved.push(Restored {
            category: *category,
            archived: archived.clone(),
            live: dest,
        });
    }

    let live_name = |category: Category, logged: &str| -> String {
        moved
            .iter()
            .find(|m| m.category == category)
            .map(|m| file_name_of(&m.live))
            .unwrap_or_else(|| strip_archive_prefix(logged).to_string())
    };
    let original_file = live_name(Category::Originals, &log.original_file_name);
    let file_name = if log.file_name.trim() == NO_ARTIFACT {
        NO_ARTIFACT.to_string()
    } else {
        live_name(Category::Pdfs, &log.file_name)
    };
    let video_file = log
        .video_file_name
        .as_deref()
        .map(|v| live_name(Category::Videos, v));

    let committed = store.transaction(|tx| {
        let doc = reinstate(tx, &log, actor, original_file, file_name, video_file)?;
        tx.remove_deletion_log(&log.id);
        tx.append_audit(
            AuditEntry::for_document(AuditAction::Restored, &doc, actor)
                .with_details(format!("Restored from the trash ({} file(s))", moved.len())),
        );
        Ok(doc)
    });
    let doc = match committed {
        Ok(doc) => doc,
        Err(e) => {
            put_back(&moved);
            return Err(e);
        }
    };

    info!(sop_number = %doc.sop_number, reviewer = %actor.name, files = moved.len(), "document restored");
    result.add_message(CmdMessage::success(format!(
        "SOP {} restored ({})",
        doc.sop_number, doc.meta.revision
    )));
    let paths = moved.into_iter().map(|m| m.live).collect();
    let tables = store.load()?;
    let sops = doc
        .sop_id
        .and_then(|id| tables.sop(&id).cloned())
        .into_iter()
        .collect();
    Ok(result
        .with_documents(vec![doc])
        .with_sops(sops)
        .with_paths(paths))
}

/// Reactivates the archived row the log came from, or builds a new one from
/// the snapshot, and relinks an archived structured SOP.
fn reinstate(
    tx: &mut Tables,
    log: &DeletionLog,
    actor: &Actor,
    original_file: String,
    file_name: String,
    video_file: Option<String>,
) -> Result<DocumentRecord> {
    let sop_id = log
        .sop_id
        .filter(|id| tx.sop(id).is_some_and(|s| !s.is_live()))
        .or_else(|| {
            log.structured
                .then(|| tx.archived_sop(&log.sop_number).map(|s| s.id))
                .flatten()
        });

    let existing = log
        .document_id
        .filter(|id| tx.document(id).is_some_and(|d| d.is_archived));
    let doc_id = match existing {
        Some(id) => {
            let row = tx
                .document_mut(&id)
                .ok_or_else(|| VaultError::Store(format!("Register entry {} vanished", id)))?;
            row.is_archived = false;
            row.archived_at = None;
            row.status = DocumentStatus::Approved;
            row.clear_deletion_request();
            row.original_file = original_file;
            row.file_name = file_name;
            row.video_file = video_file;
            row.sop_id = sop_id;
            id
        }
        None => {
            let mut row = DocumentRecord::new(&log.sop_number, &log.title, original_file, log.meta.clone());
            row.file_name = file_name;
            row.video_file = video_file;
            row.status = DocumentStatus::Approved;
            row.stage = Some(ApprovalStage::Admin);
            row.reviewed_by = actor.name.clone();
            row.admin_approved = log.was_approved;
            row.structured = log.structured;
            row.sop_id = sop_id;
            let id = row.id;
            tx.insert_document(row)?;
            id
        }
    };

    if let Some(id) = sop_id {
        if let Some(sop) = tx.sop_mut(&id) {
            sop.archived_on = None;
            sop.status = DocumentStatus::Restored;
            sop.document_id = Some(doc_id);
        }
        if let Some(row) = tx.document_mut(&doc_id) {
            row.structured = true;
        }
    }
    tx.document(&doc_id)
        .cloned()
        .ok_or_else(|| VaultError::Store(format!("Register entry {} vanished", doc_id)))
}

fn put_back(moved: &[Restored]) {
    for file in moved.iter().rev() {
        match move_file(&file.live, &file.archived) {
            Ok(()) => info!(path = %file.archived.display(), "restored file moved back to the archive"),
            Err(e) => warn!(
                from = %file.live.display(),
                to = %file.archived.display(),
                error = %e,
                "could not move restored file back to the archive"
            ),
        }
    }
}

/// Where a restore would look for the archived files of `log`.
pub fn archived_paths(layout: &StorageLayout, log: &DeletionLog) -> Vec<PathBuf> {
    archived_files(log)
        .into_iter()
        .map(|(name, category)| layout.archive_dir(category).join(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{approve, archive, deletion};
    use crate::test_utils::{admin, author, manager, sample_draft, TestEnv};
    use uuid::Uuid;

    fn archived_upload(env: &mut TestEnv, number: &str, file: &str) -> (Uuid, DeletionLog) {
        let doc = env.upload(number, file);
        let (store, services) = env.parts();
        approve::run(store, &services, &admin(), &DocumentRef::Id(doc.id)).unwrap();
        deletion::request(&mut env.store, &author(), &DocumentRef::Id(doc.id), "Obsolete").unwrap();
        let (store, services) = env.parts();
        let result = archive::run(store, &services, &admin(), &DocumentRef::Id(doc.id)).unwrap();
        (doc.id, result.deletion_logs[0].clone())
    }

    #[test]
    fn round_trip_preserves_identity() {
        let mut env = TestEnv::new();
        let (id, log) = archived_upload(&mut env, "QA-700", "a.docx");
        let before = env.document(&id);

        let (store, services) = env.parts();
        let result = run(store, &services, &manager(), &DocumentRef::Id(log.id)).unwrap();

        let doc = &result.documents[0];
        assert_eq!(doc.id, id);
        assert_eq!(doc.sop_number, before.sop_number);
        assert_eq!(doc.meta.revision, before.meta.revision);
        assert_eq!(doc.meta.department, before.meta.department);
        assert_eq!(doc.status, DocumentStatus::Approved);
        assert!(!doc.is_archived);
        assert_eq!(doc.original_file, "a.docx");
        assert!(env.storage("Originals/SOP/a.docx").is_file());

        let tables = env.tables();
        assert!(tables.deletion_logs.is_empty());
        assert_eq!(tables.live_document("QA-700").unwrap().id, id);
        assert_eq!(
            tables.audit_for("QA-700").last().unwrap().action,
            AuditAction::Restored
        );
    }

    #[test]
    fn refuses_when_no_archived_file_exists() {
        let mut env = TestEnv::new();
        let (id, log) = archived_upload(&mut env, "QA-701", "a.docx");
        std::fs::remove_file(
            env.storage("Archive/Deleted/Originals")
                .join(&log.original_file_name),
        )
        .unwrap();

        let (store, services) = env.parts();
        let err = run(store, &services, &admin(), &DocumentRef::number("QA-701")).unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));

        let tables = env.tables();
        assert_eq!(tables.deletion_logs.len(), 1);
        assert!(tables.live_document("QA-701").is_none());
        assert!(tables.document(&id).unwrap().is_archived);
    }

    #[test]
    fn collisions_get_a_restored_suffix() {
        let mut env = TestEnv::new();
        let (_, log) = archived_upload(&mut env, "QA-702", "a.docx");
        env.put("Originals/SOP/a.docx", b"someone else's file");

        let (store, services) = env.parts();
        let result = run(store, &services, &admin(), &DocumentRef::Id(log.id)).unwrap();
        assert_eq!(result.documents[0].original_file, "a_restored_1.docx");
        assert!(env.storage("Originals/SOP/a_restored_1.docx").is_file());
    }

    #[test]
    fn live_number_blocks_restore() {
        let mut env = TestEnv::new();
        let (_, log) = archived_upload(&mut env, "QA-703", "a.docx");
        env.upload("QA-703", "b.docx");

        let (store, services) = env.parts();
        let err = run(store, &services, &admin(), &DocumentRef::Id(log.id)).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
        assert!(env
            .storage("Archive/Deleted/Originals")
            .join(&log.original_file_name)
            .is_file());
    }

    #[test]
    fn structured_sop_comes_back_restored() {
        let mut env = TestEnv::new();
        let created = env.create_sop(sample_draft("QA-704", 2));
        let doc_id = created.documents[0].id;
        let sop_id = created.sops[0].id;
        let (store, services) = env.parts();
        approve::run(store, &services, &admin(), &DocumentRef::Id(doc_id)).unwrap();
        deletion::request(&mut env.store, &author(), &DocumentRef::Id(doc_id), "Replaced").unwrap();
        let (store, services) = env.parts();
        let log = archive::run(store, &services, &admin(), &DocumentRef::Id(doc_id))
            .unwrap()
            .deletion_logs[0]
            .clone();

        let (store, services) = env.parts();
        let result = run(store, &services, &admin(), &DocumentRef::Id(log.id)).unwrap();

        let doc = &result.documents[0];
        assert_ne!(doc.id, doc_id);
        assert!(doc.structured);
        assert_eq!(doc.sop_id, Some(sop_id));
        assert_eq!(doc.meta.revision, crate::model::Revision::new(2));

        let tables = env.tables();
        let sop = tables.sop(&sop_id).unwrap();
        assert!(sop.is_live());
        assert_eq!(sop.status, DocumentStatus::Restored);
        assert_eq!(sop.document_id, Some(doc.id));
        assert!(tables.check_invariants().is_ok());
    }

    #[test]
    fn commit_failure_moves_files_back_to_the_archive() {
        let mut env = TestEnv::new();
        let (id, log) = archived_upload(&mut env, "QA-706", "a.docx");
        env.store.backend().set_simulate_write_error(true);

        let (store, services) = env.parts();
        assert!(run(store, &services, &admin(), &DocumentRef::Id(log.id)).is_err());
        env.store.backend().set_simulate_write_error(false);

        assert!(env
            .storage("Archive/Deleted/Originals")
            .join(&log.original_file_name)
            .is_file());
        assert!(!env.storage("Originals/SOP/a.docx").exists());
        let tables = env.tables();
        assert!(tables.deletion_log(&log.id).is_some());
        assert!(tables.document(&id).unwrap().is_archived);
    }

    #[test]
    fn users_cannot_restore() {
        let mut env = TestEnv::new();
        let (_, log) = archived_upload(&mut env, "QA-705", "a.docx");
        let (store, services) = env.parts();
        assert!(matches!(
            run(store, &services, &author(), &DocumentRef::Id(log.id)),
            Err(VaultError::Unauthorized(_))
        ));
    }
}
