//! In-memory view of every record collection.
//!
//! A transaction works on an owned copy of [`Tables`]; committing hands the
//! copy back to the backend in one write. All lookups the commands need live
//! here so the commands never scan collections themselves.

use crate::audit::AuditEntry;
use crate::error::{Result, VaultError};
use crate::model::{DeletionLog, DocumentRecord, StructuredSop};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
    #[serde(default)]
    pub sops: Vec<StructuredSop>,
    #[serde(default)]
    pub deletion_logs: Vec<DeletionLog>,
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Document Register ---

    pub fn document(&self, id: &Uuid) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| d.id == *id)
    }

    pub fn document_mut(&mut self, id: &Uuid) -> Option<&mut DocumentRecord> {
        self.documents.iter_mut().find(|d| d.id == *id)
    }

    /// The non-archived row holding `sop_number`, if any.
    pub fn live_document(&self, sop_number: &str) -> Option<&DocumentRecord> {
        self.documents
            .iter()
            .find(|d| d.is_live() && d.sop_number.eq_ignore_ascii_case(sop_number))
    }

    /// The live row generated from a structured SOP with this number.
    pub fn live_structured_document(&self, sop_number: &str) -> Option<&DocumentRecord> {
        self.live_document(sop_number).filter(|d| d.structured)
    }

    /// Adds a row, refusing a second live row for the same SOP number.
    pub fn insert_document(&mut self, doc: DocumentRecord) -> Result<()> {
        if doc.is_live() {
            if let Some(existing) = self.live_document(&doc.sop_number) {
                if existing.id != doc.id {
                    return Err(VaultError::Conflict(format!(
                        "SOP {} already has a live register entry ({})",
                        doc.sop_number, existing.meta.revision
                    )));
                }
            }
        }
        if self.document(&doc.id).is_some() {
            return Err(VaultError::Conflict(format!(
                "Register entry {} already exists",
                doc.id
            )));
        }
        self.documents.push(doc);
        Ok(())
    }

    /// Whether a live row other than `except` names `file_name` as its
    /// original, artifact or video.
    pub fn file_in_use(&self, except: &Uuid, file_name: &str) -> bool {
        let file_name = file_name.trim();
        self.documents
            .iter()
            .filter(|d| d.is_live() && d.id != *except)
            .any(|d| {
                d.original_file.eq_ignore_ascii_case(file_name)
                    || d.file_name.eq_ignore_ascii_case(file_name)
                    || d.video_file
                        .as_deref()
                        .map_or(false, |v| v.eq_ignore_ascii_case(file_name))
            })
    }

    pub fn remove_document(&mut self, id: &Uuid) -> Option<DocumentRecord> {
        let pos = self.documents.iter().position(|d| d.id == *id)?;
        Some(self.documents.remove(pos))
    }

    // --- Structured SOPs ---

    pub fn sop(&self, id: &Uuid) -> Option<&StructuredSop> {
        self.sops.iter().find(|s| s.id == *id)
    }

    pub fn sop_mut(&mut self, id: &Uuid) -> Option<&mut StructuredSop> {
        self.sops.iter_mut().find(|s| s.id == *id)
    }

    pub fn live_sop(&self, sop_number: &str) -> Option<&StructuredSop> {
        self.sops
            .iter()
            .find(|s| s.is_live() && s.sop_number.eq_ignore_ascii_case(sop_number))
    }

    /// Most recently archived SOP with this number.
    pub fn archived_sop(&self, sop_number: &str) -> Option<&StructuredSop> {
        self.sops
            .iter()
            .filter(|s| !s.is_live() && s.sop_number.eq_ignore_ascii_case(sop_number))
            .max_by_key(|s| s.archived_on)
    }

    pub fn insert_sop(&mut self, sop: StructuredSop) -> Result<()> {
        if sop.is_live() && self.live_sop(&sop.sop_number).is_some() {
            return Err(VaultError::Conflict(format!(
                "SOP {} already has a live structured version",
                sop.sop_number
            )));
        }
        self.sops.push(sop);
        Ok(())
    }

    // --- Deletion Logs ---

    pub fn deletion_log(&self, id: &Uuid) -> Option<&DeletionLog> {
        self.deletion_logs.iter().find(|l| l.id == *id)
    }

    /// Latest deletion log for an SOP number.
    pub fn latest_deletion_log(&self, sop_number: &str) -> Option<&DeletionLog> {
        self.deletion_logs
            .iter()
            .filter(|l| l.sop_number.eq_ignore_ascii_case(sop_number))
            .max_by_key(|l| l.deleted_at)
    }

    pub fn insert_deletion_log(&mut self, log: DeletionLog) {
        self.deletion_logs.push(log);
    }

    pub fn remove_deletion_log(&mut self, id: &Uuid) -> Option<DeletionLog> {
        let pos = self.deletion_logs.iter().position(|l| l.id == *id)?;
        Some(self.deletion_logs.remove(pos))
    }

    // --- Audit Log ---

    pub fn append_audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    pub fn audit_for(&self, sop_number: &str) -> Vec<&AuditEntry> {
        let mut entries: Vec<&AuditEntry> = self
            .audit
            .iter()
            .filter(|e| e.sop_number.eq_ignore_ascii_case(sop_number))
            .collect();
        entries.sort_by_key(|e| e.at);
        entries
    }

    // --- Integrity ---

    /// Checks the invariants every committed state must hold:
    /// at most one live register row per SOP number, at most one live
    /// structured SOP per number, and every live structured SOP linked to a
    /// live structured row.
    pub fn check_invariants(&self) -> Result<()> {
        let mut live: HashMap<String, usize> = HashMap::new();
        for doc in self.documents.iter().filter(|d| d.is_live()) {
            *live.entry(doc.sop_number.to_ascii_lowercase()).or_default() += 1;
        }
        if let Some((number, _)) = live.iter().find(|(_, count)| **count > 1) {
            return Err(VaultError::Conflict(format!(
                "SOP {} would have more than one live register entry",
                number.to_ascii_uppercase()
            )));
        }

        let mut live_sops: HashMap<String, usize> = HashMap::new();
        for sop in self.sops.iter().filter(|s| s.is_live()) {
            *live_sops
                .entry(sop.sop_number.to_ascii_lowercase())
                .or_default() += 1;

            let linked = sop
                .document_id
                .and_then(|id| self.document(&id))
                .is_some_and(|d| d.is_live() && d.structured);
            if !linked {
                return Err(VaultError::Store(format!(
                    "Structured SOP {} has no live register entry",
                    sop.sop_number
                )));
            }
        }
        if let Some((number, _)) = live_sops.iter().find(|(_, count)| **count > 1) {
            return Err(VaultError::Conflict(format!(
                "SOP {} would have more than one live structured version",
                number.to_ascii_uppercase()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_document, sample_sop};

    #[test]
    fn file_in_use_ignores_the_asking_row_and_archived_rows() {
        let mut tables = Tables::new();
        let live = sample_document("QA-001");
        let mut archived = sample_document("QA-002");
        archived.original_file = "shared.docx".to_string();
        archived.is_archived = true;
        let live_id = live.id;
        tables.insert_document(live).unwrap();
        tables.insert_document(archived).unwrap();

        assert!(tables.file_in_use(&Uuid::new_v4(), "qa-001_sample.docx"));
        assert!(!tables.file_in_use(&live_id, "QA-001_Sample.docx"));
        assert!(!tables.file_in_use(&Uuid::new_v4(), "shared.docx"));
    }

    #[test]
    fn second_live_row_for_same_number_is_rejected() {
        let mut tables = Tables::new();
        tables.insert_document(sample_document("QA-001")).unwrap();
        let err = tables.insert_document(sample_document("qa-001")).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
        assert_eq!(tables.documents.len(), 1);
    }

    #[test]
    fn archived_rows_do_not_block_the_number() {
        let mut tables = Tables::new();
        let mut old = sample_document("QA-001");
        old.archive(chrono::Utc::now());
        tables.insert_document(old).unwrap();
        tables.insert_document(sample_document("QA-001")).unwrap();
        assert_eq!(tables.documents.len(), 2);
        assert!(tables.check_invariants().is_ok());
    }

    #[test]
    fn unlinked_live_sop_breaks_invariants() {
        let mut tables = Tables::new();
        tables.insert_sop(sample_sop("QA-002")).unwrap();
        assert!(matches!(
            tables.check_invariants(),
            Err(VaultError::Store(_))
        ));
    }

    #[test]
    fn duplicate_live_rows_break_invariants() {
        let mut tables = Tables::new();
        tables.documents.push(sample_document("QA-001"));
        tables.documents.push(sample_document("QA-001"));
        assert!(matches!(
            tables.check_invariants(),
            Err(VaultError::Conflict(_))
        ));
    }

    #[test]
    fn latest_deletion_log_wins() {
        let mut tables = Tables::new();
        let doc = sample_document("QA-003");
        let mut first = crate::test_utils::sample_log(&doc);
        first.deleted_at = chrono::Utc::now() - chrono::Duration::days(2);
        let second = crate::test_utils::sample_log(&doc);
        let second_id = second.id;
        tables.insert_deletion_log(first);
        tables.insert_deletion_log(second);
        assert_eq!(tables.latest_deletion_log("QA-003").unwrap().id, second_id);
    }
}
