//! Registers an uploaded file as a new document.
//!
//! The file is copied into `Originals/<DocType>/`; video files are copied into
//! `Videos/<DocType>/` as well. The new row starts in `Pending Approval`.
//!
//! An SOP number already held by a live row is a conflict, with one exception:
//! a plain upload that was returned for review is superseded by the new file.

use super::helpers::{content_type_for, file_size, require_text};
use super::{CmdMessage, CmdResult, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::files::archiver::FileArchiver;
use crate::files::{file_name_of, unique_destination, Category};
use crate::model::{Actor, DocumentMeta, DocumentRecord, DocumentStatus, Revision};
use crate::store::DataStore;
use chrono::{NaiveDate, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: PathBuf,
    pub sop_number: String,
    pub title: String,
    pub department: String,
    pub doc_type: Option<String>,
    pub area: String,
    pub revision: Revision,
    pub effective_date: Option<NaiveDate>,
    pub supervisor: Option<String>,
    pub supervisor_email: Option<String>,
}

impl UploadRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        sop_number: impl Into<String>,
        title: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            sop_number: sop_number.into(),
            title: title.into(),
            department: department.into(),
            doc_type: None,
            area: String::new(),
            revision: Revision::INITIAL,
            effective_date: None,
            supervisor: None,
            supervisor_email: None,
        }
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = area.into();
        self
    }

    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }

    pub fn with_supervisor(mut self, name: impl Into<String>, email: Option<String>) -> Self {
        self.supervisor = Some(name.into());
        self.supervisor_email = email;
        self
    }
}

pub fn run<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    request: UploadRequest,
) -> Result<CmdResult> {
    let sop_number = require_text(&request.sop_number, "SOP number")?;
    let title = require_text(&request.title, "Title")?;
    let department = require_text(&request.department, "Department")?;
    if !request.source.is_file() {
        return Err(VaultError::NotFound(format!(
            "Upload source {} does not exist",
            request.source.display()
        )));
    }
    let doc_type = request
        .doc_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&services.config.default_doc_type)
        .to_string();

    let snapshot = store.load()?;
    let superseded = match snapshot.live_document(&sop_number) {
        Some(existing)
            if !existing.structured && existing.status == DocumentStatus::ReturnedForReview =>
        {
            Some(existing.clone())
        }
        Some(existing) => {
            return Err(VaultError::Conflict(format!(
                "SOP {} is already registered ({}, {})",
                sop_number, existing.meta.revision, existing.status
            )))
        }
        None => None,
    };

    let folder = services.folder(&doc_type);
    let upload_name = file_name_of(&request.source);
    let dest = unique_destination(
        &services.layout.live_dir(Category::Originals, &folder),
        &upload_name,
        "_",
    );
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&request.source, &dest)?;
    let stored_name = file_name_of(&dest);
    let mut written = vec![dest.clone()];

    let mut video_file = None;
    if services.config.is_video(&stored_name) {
        let video_dest = unique_destination(
            &services.layout.live_dir(Category::Videos, &folder),
            &stored_name,
            "_",
        );
        if let Some(parent) = video_dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&request.source, &video_dest)?;
        video_file = Some(file_name_of(&video_dest));
        written.push(video_dest);
    }

    let (supervisor, supervisor_email) = match request.supervisor {
        Some(name) => (Some(name), request.supervisor_email),
        None => match services.reference.department_supervisor(&department) {
            Some(sup) => (Some(sup.name), sup.email),
            None => (None, None),
        },
    };

    let meta = DocumentMeta {
        department,
        doc_type,
        area: request.area.trim().to_string(),
        revision: request.revision,
        content_type: content_type_for(&stored_name).to_string(),
        size: file_size(&dest),
        author: actor.name.clone(),
        author_email: actor.email.clone(),
        supervisor,
        supervisor_email,
        uploaded_at: Utc::now(),
        last_review_at: None,
        effective_date: request.effective_date,
    };
    let mut doc = DocumentRecord::new(&sop_number, title, &stored_name, meta);
    doc.video_file = video_file;

    let committed = store.transaction(|tx| {
        let mut entry = AuditEntry::for_document(AuditAction::Uploaded, &doc, actor)
            .with_details(format!("{} uploaded as {}", stored_name, doc.meta.revision));
        if let Some(old) = &superseded {
            tx.remove_document(&old.id);
            entry = entry.with_details(format!(
                "{} uploaded as {}, replacing the returned version",
                stored_name, doc.meta.revision
            ));
        }
        tx.insert_document(doc.clone())?;
        tx.append_audit(entry);
        let old_file_shared = superseded
            .as_ref()
            .map_or(false, |old| tx.file_in_use(&old.id, &old.original_file));
        Ok(old_file_shared)
    });
    let old_file_shared = match committed {
        Ok(shared) => shared,
        Err(e) => {
            for path in &written {
                if let Err(cleanup) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %cleanup, "could not remove uploaded copy");
                }
            }
            return Err(e);
        }
    };

    let mut result = CmdResult::default();
    if let Some(old) = superseded {
        let archiver = FileArchiver::new(services.layout);
        if old.original_file != stored_name && !old_file_shared {
            if let Err(e) = archiver.remove(&old.original_file, Some(&folder), Category::Originals) {
                warn!(file = %old.original_file, error = %e, "could not remove replaced upload");
            }
        }
        result.add_message(CmdMessage::info(format!(
            "Replaced the version of SOP {} that was returned for review",
            old.sop_number
        )));
    }

    info!(sop_number = %doc.sop_number, file = %stored_name, "document uploaded");
    result.add_message(CmdMessage::success(format!(
        "SOP {} uploaded: {} ({})",
        doc.sop_number, doc.title, doc.status
    )));
    Ok(result.with_documents(vec![doc]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{author, TestEnv};

    #[test]
    fn copies_file_and_registers_pending_row() {
        let mut env = TestEnv::new();
        let source = env.incoming("QA-001_Cleaning.docx", b"doc");
        let request = UploadRequest::new(&source, "QA-001", "Cleaning", "Quality").with_doc_type("SOP");

        let (store, services) = env.parts();
        let result = run(store, &services, &author(), request).unwrap();

        let doc = &result.documents[0];
        assert_eq!(doc.status, DocumentStatus::PendingApproval);
        assert_eq!(doc.original_file, "QA-001_Cleaning.docx");
        assert_eq!(doc.meta.size, 3);
        assert!(env.storage("Originals/SOP/QA-001_Cleaning.docx").is_file());
        assert!(source.exists());

        let tables = env.tables();
        assert_eq!(tables.audit_for("QA-001")[0].action, AuditAction::Uploaded);
    }

    #[test]
    fn videos_get_a_copy_under_videos() {
        let mut env = TestEnv::new();
        let source = env.incoming("training.MP4", b"video");
        let request = UploadRequest::new(source, "QA-002", "Training", "Quality").with_doc_type("SOP");

        let (store, services) = env.parts();
        let result = run(store, &services, &author(), request).unwrap();

        assert_eq!(result.documents[0].video_file.as_deref(), Some("training.MP4"));
        assert!(env.storage("Videos/SOP/training.MP4").is_file());
        assert!(env.storage("Originals/SOP/training.MP4").is_file());
    }

    #[test]
    fn live_number_is_a_conflict() {
        let mut env = TestEnv::new();
        env.upload("QA-003", "a.docx");
        let source = env.incoming("b.docx", b"b");
        let request = UploadRequest::new(source, "QA-003", "Other", "Quality");

        let (store, services) = env.parts();
        let err = run(store, &services, &author(), request).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
        assert!(!env.storage("Originals/General/b.docx").exists());
    }

    #[test]
    fn failed_commit_removes_the_copy() {
        let mut env = TestEnv::new();
        env.store.backend().set_simulate_write_error(true);
        let source = env.incoming("c.docx", b"c");
        let request = UploadRequest::new(source, "QA-004", "C", "Quality").with_doc_type("SOP");

        let (store, services) = env.parts();
        assert!(run(store, &services, &author(), request).is_err());
        assert!(!env.storage("Originals/SOP/c.docx").exists());
    }

    #[test]
    fn missing_fields_and_sources_are_rejected() {
        let mut env = TestEnv::new();
        let source = env.incoming("d.docx", b"d");
        let (store, services) = env.parts();

        let blank = UploadRequest::new(&source, " ", "D", "Quality");
        assert!(matches!(
            run(store, &services, &author(), blank),
            Err(VaultError::Validation(_))
        ));
        let missing = UploadRequest::new("/definitely/not/here.docx", "QA-005", "D", "Quality");
        assert!(matches!(
            run(store, &services, &author(), missing),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn supervisor_defaults_from_department() {
        let mut env = TestEnv::new();
        env.reference = crate::reference::StaticDirectory::new().with_supervisor(
            "Quality",
            "Sue Supervisor",
            Some("sue@example.com".into()),
        );
        let doc = env.upload("QA-006", "e.docx");
        assert_eq!(doc.meta.supervisor.as_deref(), Some("Sue Supervisor"));
        assert_eq!(doc.meta.supervisor_email.as_deref(), Some("sue@example.com"));
    }
}
