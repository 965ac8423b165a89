//! Read-only queries over the register.

use super::helpers::resolve_document;
use super::{CmdMessage, CmdResult, DocumentRef, Services};
use crate::error::Result;
use crate::files::locator::locate;
use crate::files::Category;
use crate::store::DataStore;

/// Register rows ordered by SOP number, newest revision first. Archived rows
/// only when asked for.
pub fn list<S: DataStore>(store: &S, include_archived: bool) -> Result<CmdResult> {
    let tables = store.load()?;
    let mut documents: Vec<_> = tables
        .documents
        .into_iter()
        .filter(|d| include_archived || d.is_live())
        .collect();
    documents.sort_by(|a, b| {
        a.sop_number
            .to_ascii_lowercase()
            .cmp(&b.sop_number.to_ascii_lowercase())
            .then(b.meta.revision.cmp(&a.meta.revision))
            .then(a.is_archived.cmp(&b.is_archived))
    });
    Ok(CmdResult::default().with_documents(documents))
}

/// One row with its structured SOP and audit trail.
pub fn show<S: DataStore>(store: &S, reference: &DocumentRef) -> Result<CmdResult> {
    let tables = store.load()?;
    let doc = resolve_document(&tables, reference)?.clone();
    let sop = doc
        .sop_id
        .and_then(|id| tables.sop(&id))
        .or_else(|| {
            if doc.structured && doc.is_live() {
                tables.live_sop(&doc.sop_number)
            } else {
                None
            }
        })
        .cloned();
    let audit = tables
        .audit_for(&doc.sop_number)
        .into_iter()
        .cloned()
        .collect();
    Ok(CmdResult::default()
        .with_documents(vec![doc])
        .with_sops(sop.into_iter().collect())
        .with_audit_entries(audit))
}

/// Deletion logs, most recent first.
pub fn trash<S: DataStore>(store: &S) -> Result<CmdResult> {
    let mut logs = store.load()?.deletion_logs;
    logs.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
    Ok(CmdResult::default().with_deletion_logs(logs))
}

/// Audit trail of an SOP number in chronological order.
pub fn audit<S: DataStore>(store: &S, sop_number: &str) -> Result<CmdResult> {
    let tables = store.load()?;
    let entries: Vec<_> = tables.audit_for(sop_number).into_iter().cloned().collect();
    let mut result = CmdResult::default();
    if entries.is_empty() {
        result.add_message(CmdMessage::info(format!(
            "No audit entries for SOP {}",
            sop_number.trim()
        )));
    }
    Ok(result.with_audit_entries(entries))
}

pub fn sops<S: DataStore>(store: &S, include_archived: bool) -> Result<CmdResult> {
    let mut sops: Vec<_> = store
        .load()?
        .sops
        .into_iter()
        .filter(|s| include_archived || s.is_live())
        .collect();
    sops.sort_by(|a, b| {
        a.sop_number
            .to_ascii_lowercase()
            .cmp(&b.sop_number.to_ascii_lowercase())
            .then(b.revision.cmp(&a.revision))
    });
    Ok(CmdResult::default().with_sops(sops))
}

/// Where a live file of `category` is, searching the type folder first and
/// the legacy layout last.
pub fn locate_file(
    services: &Services,
    category: Category,
    doc_type: Option<&str>,
    file_name: &str,
) -> Result<CmdResult> {
    let folder = doc_type.map(|t| services.folder(t));
    let roots = services.layout.candidates(category, folder.as_deref());
    let mut result = CmdResult::default();
    match locate(&roots, file_name) {
        Some(path) => Ok(result.with_paths(vec![path])),
        None => {
            result.add_message(CmdMessage::info(format!(
                "{} was not found under {}",
                file_name.trim(),
                category
            )));
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{approve, archive, deletion};
    use crate::test_utils::{admin, author, sample_draft, TestEnv};

    #[test]
    fn list_hides_archived_rows_unless_asked() {
        let mut env = TestEnv::new();
        let a = env.upload("QA-902", "a.docx");
        env.upload("QA-901", "b.docx");
        let (store, services) = env.parts();
        approve::run(store, &services, &admin(), &DocumentRef::Id(a.id)).unwrap();
        deletion::request(store, &author(), &DocumentRef::Id(a.id), "Old").unwrap();
        archive::run(store, &services, &admin(), &DocumentRef::Id(a.id)).unwrap();

        let live = list(&env.store, false).unwrap();
        assert_eq!(live.documents.len(), 1);
        assert_eq!(live.documents[0].sop_number, "QA-901");

        let all = list(&env.store, true).unwrap();
        let numbers: Vec<&str> = all.documents.iter().map(|d| d.sop_number.as_str()).collect();
        assert_eq!(numbers, vec!["QA-901", "QA-902"]);

        assert_eq!(trash(&env.store).unwrap().deletion_logs.len(), 1);
    }

    #[test]
    fn show_includes_sop_and_audit() {
        let mut env = TestEnv::new();
        env.create_sop(sample_draft("QA-903", 0));
        let result = show(&env.store, &DocumentRef::number("QA-903")).unwrap();
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.sops.len(), 1);
        assert!(!result.audit_entries.is_empty());
    }

    #[test]
    fn audit_for_unknown_number_is_empty() {
        let env = TestEnv::new();
        let result = audit(&env.store, "QA-000").unwrap();
        assert!(result.audit_entries.is_empty());
        assert_eq!(result.messages.len(), 1);
    }

    #[test]
    fn locates_legacy_uploads() {
        let mut env = TestEnv::new();
        let legacy = env.put("Uploads/QA-904_Old.docx", b"legacy");
        let (_, services) = env.parts();

        let found = locate_file(&services, Category::Originals, Some("SOP"), "QA-904_Old.docx").unwrap();
        assert_eq!(found.paths, vec![legacy]);

        let again = locate_file(&services, Category::Originals, Some("SOP"), "QA-904_Old.docx").unwrap();
        assert_eq!(found.paths, again.paths);

        let missing = locate_file(&services, Category::Pdfs, None, "nothing.pdf").unwrap();
        assert!(missing.paths.is_empty());
    }
}
