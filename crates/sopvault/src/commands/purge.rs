//! Permanent erase of an archived document.
//!
//! Each archived file is deleted on its own; a missing or locked file is
//! reported and does not stop the others. The deletion log goes last. There
//! is no way back.
//!
//! The archived register row, and the archived structured SOP if there is
//! one, stay in the register. They keep the audit trail resolvable and keep
//! the SOP number counted by number allocation, so it is never handed out
//! again.

use super::helpers::{require_admin, resolve_deletion_log};
use super::restore::archived_paths;
use super::{CmdMessage, CmdResult, DocumentRef, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::Result;
use crate::model::Actor;
use crate::store::DataStore;
use std::fs;
use tracing::{info, warn};

pub fn run<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    reference: &DocumentRef,
) -> Result<CmdResult> {
    require_admin(actor, "purge archived documents")?;
    let tables = store.load()?;
    let log = resolve_deletion_log(&tables, reference)?.clone();

    let mut result = CmdResult::default();
    let mut removed = Vec::new();
    for path in archived_paths(services.layout, &log) {
        if !path.exists() {
            info!(path = %path.display(), "archived file already gone");
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not delete archived file");
                result.add_message(CmdMessage::warning(format!(
                    "Archived file {} could not be deleted: {}",
                    path.display(),
                    e
                )));
            }
        }
    }

    store.transaction(|tx| {
        tx.remove_deletion_log(&log.id);
        let mut entry = AuditEntry::new(AuditAction::Purged, &log.sop_number, &log.title, actor)
            .with_details(format!("{} archived file(s) deleted", removed.len()));
        if let Some(id) = log.document_id {
            entry = entry.with_document(id);
        }
        tx.append_audit(entry);
        Ok(())
    })?;

    info!(sop_number = %log.sop_number, admin = %actor.name, files = removed.len(), "archived document purged");
    result.add_message(CmdMessage::success(format!(
        "SOP {} permanently deleted",
        log.sop_number
    )));
    Ok(result.with_deletion_logs(vec![log]).with_paths(removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::number::next_sop_number;
    use crate::commands::{approve, archive, deletion};
    use crate::error::VaultError;
    use crate::model::DeletionLog;
    use crate::test_utils::{admin, author, manager, TestEnv};

    fn archived_video(env: &mut TestEnv, number: &str) -> DeletionLog {
        let doc = env.upload(number, "clip.mp4");
        let (store, services) = env.parts();
        approve::run(store, &services, &admin(), &DocumentRef::Id(doc.id)).unwrap();
        deletion::request(&mut env.store, &author(), &DocumentRef::Id(doc.id), "Obsolete").unwrap();
        let (store, services) = env.parts();
        archive::run(store, &services, &admin(), &DocumentRef::Id(doc.id))
            .unwrap()
            .deletion_logs[0]
            .clone()
    }

    #[test]
    fn deletes_files_and_log() {
        let mut env = TestEnv::new();
        let log = archived_video(&mut env, "QA-800");
        let (store, services) = env.parts();
        let result = run(store, &services, &admin(), &DocumentRef::Id(log.id)).unwrap();

        assert_eq!(result.paths.len(), 2);
        assert!(result.paths.iter().all(|p| !p.exists()));
        let tables = env.tables();
        assert!(tables.deletion_logs.is_empty());
        assert_eq!(
            tables.audit_for("QA-800").last().unwrap().action,
            AuditAction::Purged
        );
    }

    #[test]
    fn missing_files_do_not_block_the_rest() {
        let mut env = TestEnv::new();
        let log = archived_video(&mut env, "QA-801");
        fs::remove_file(
            env.storage("Archive/Deleted/Originals")
                .join(&log.original_file_name),
        )
        .unwrap();

        let (store, services) = env.parts();
        let result = run(store, &services, &admin(), &DocumentRef::number("QA-801")).unwrap();
        assert_eq!(result.paths.len(), 1);
        assert!(env.tables().deletion_logs.is_empty());
    }

    #[test]
    fn archived_row_outlives_the_purge() {
        let mut env = TestEnv::new();
        let log = archived_video(&mut env, "SOP-005");
        let (store, services) = env.parts();
        run(store, &services, &admin(), &DocumentRef::Id(log.id)).unwrap();
        assert_eq!(next_sop_number(&*store, &services, "SOP").unwrap(), "SOP-006");

        let tables = env.tables();
        let row = tables.document(&log.document_id.unwrap()).unwrap();
        assert!(row.is_archived);
        assert!(tables.live_document("SOP-005").is_none());
    }

    #[test]
    fn only_admins_purge() {
        let mut env = TestEnv::new();
        let log = archived_video(&mut env, "QA-802");
        let (store, services) = env.parts();
        assert!(matches!(
            run(store, &services, &manager(), &DocumentRef::Id(log.id)),
            Err(VaultError::Unauthorized(_))
        ));
        assert_eq!(env.tables().deletion_logs.len(), 1);
    }
}
