use crate::commands::structured::{SopDraft, StepDraft};
use crate::commands::{structured, upload, CmdResult, Services};
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::files::StorageLayout;
use crate::model::{
    Actor, DeletionLog, DocumentMeta, DocumentRecord, DocumentStatus, Revision, Step, StructuredSop,
    PENDING_REVIEWER,
};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::reference::StaticDirectory;
use crate::render::{PageSettings, PdfRenderer, TextPdfRenderer};
use crate::store::memory::InMemoryStore;
use crate::store::{DataStore, Tables};
use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

pub fn sample_meta() -> DocumentMeta {
    DocumentMeta {
        department: "Quality".to_string(),
        doc_type: "SOP".to_string(),
        area: "Line 1".to_string(),
        revision: Revision::INITIAL,
        content_type: "application/pdf".to_string(),
        size: 0,
        author: "Ann Author".to_string(),
        author_email: Some("ann@example.com".to_string()),
        supervisor: None,
        supervisor_email: None,
        uploaded_at: Utc::now(),
        last_review_at: None,
        effective_date: None,
    }
}

pub fn sample_document(sop_number: &str) -> DocumentRecord {
    DocumentRecord::new(
        sop_number,
        "Sample",
        format!("{}_Sample.docx", sop_number),
        sample_meta(),
    )
}

pub fn sample_sop(sop_number: &str) -> StructuredSop {
    let mut sop = StructuredSop {
        id: Uuid::new_v4(),
        sop_number: sop_number.to_string(),
        title: "Sample Procedure".to_string(),
        revision: Revision::INITIAL,
        effective_date: None,
        department: "Quality".to_string(),
        doc_type: "SOP".to_string(),
        area: "Line 1".to_string(),
        author: "Ann Author".to_string(),
        author_email: Some("ann@example.com".to_string()),
        supervisor: None,
        supervisor_email: None,
        steps: vec![
            Step::new("<p>Put on gloves</p>", "<p>Nitrile only</p>"),
            Step::new("<p>Open the valve</p>", ""),
        ],
        status: DocumentStatus::PendingApproval,
        stage: None,
        reviewed_by: PENDING_REVIEWER.to_string(),
        rejection_reason: None,
        returned_at: None,
        approved_by: None,
        approved_at: None,
        created_at: Utc::now(),
        archived_on: None,
        document_id: None,
        synced_at: None,
    };
    sop.renumber_steps();
    sop
}

pub fn sample_log(doc: &DocumentRecord) -> DeletionLog {
    DeletionLog {
        id: Uuid::new_v4(),
        document_id: Some(doc.id),
        sop_id: None,
        sop_number: doc.sop_number.clone(),
        title: doc.title.clone(),
        file_name: doc.file_name.clone(),
        original_file_name: doc.original_file.clone(),
        video_file_name: doc.video_file.clone(),
        requested_by: Some("Ann Author".to_string()),
        reason: Some("Obsolete".to_string()),
        deleted_by: "Ada Admin".to_string(),
        deleted_at: Utc::now(),
        was_approved: true,
        structured: doc.structured,
        meta: doc.meta.clone(),
    }
}

pub fn sample_draft(sop_number: &str, revision: u32) -> SopDraft {
    SopDraft {
        sop_number: sop_number.to_string(),
        title: "Line Clearance".to_string(),
        revision: Some(Revision::new(revision)),
        effective_date: None,
        department: "Quality".to_string(),
        doc_type: "SOP".to_string(),
        area: "Packing".to_string(),
        supervisor: None,
        supervisor_email: None,
        steps: vec![
            StepDraft {
                instruction_html: "<p>Remove previous labels</p>".to_string(),
                key_point_html: "<p>Check the floor</p>".to_string(),
                images: vec!["Steps/clearance-1.png".to_string()],
            },
            StepDraft {
                instruction_html: "<p>Sign the log</p>".to_string(),
                key_point_html: String::new(),
                images: Vec::new(),
            },
        ],
    }
}

pub fn author() -> Actor {
    Actor::user("Ann Author").with_email("ann@example.com")
}

pub fn admin() -> Actor {
    Actor::admin("Ada Admin").with_email("ada@example.com")
}

pub fn manager() -> Actor {
    Actor::manager("Max Manager").with_email("max@example.com")
}

/// Notifier that remembers what it was asked to send and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<Notification>>,
    pub failing: Cell<bool>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.borrow().iter().map(|n| n.kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        if self.failing.get() {
            return Err(VaultError::External("mail server unreachable".to_string()));
        }
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}

pub struct FailingRenderer;

impl PdfRenderer for FailingRenderer {
    fn render(&self, _html: &str, _footer: &str, _settings: &PageSettings) -> Result<Vec<u8>> {
        Err(VaultError::External("renderer crashed".to_string()))
    }
}

/// In-memory register plus a temporary file tree.
pub struct TestEnv {
    // Keeps the directory alive for the duration of the test
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub store: InMemoryStore,
    pub layout: StorageLayout,
    pub config: VaultConfig,
    pub renderer: Box<dyn PdfRenderer>,
    pub notifier: RecordingNotifier,
    pub reference: StaticDirectory,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            layout: StorageLayout::new(root.join("storage")),
            _temp_dir: temp_dir,
            root,
            store: InMemoryStore::new(),
            config: VaultConfig::default(),
            renderer: Box::new(TextPdfRenderer),
            notifier: RecordingNotifier::default(),
            reference: StaticDirectory::new(),
        }
    }

    pub fn parts(&mut self) -> (&mut InMemoryStore, Services<'_>) {
        let services = Services {
            layout: &self.layout,
            config: &self.config,
            renderer: self.renderer.as_ref(),
            notifier: &self.notifier,
            reference: &self.reference,
        };
        (&mut self.store, services)
    }

    pub fn tables(&self) -> Tables {
        self.store.load().expect("load tables")
    }

    pub fn storage(&self, rel: &str) -> PathBuf {
        self.layout.root().join(rel)
    }

    /// Writes a file relative to the storage root.
    pub fn put(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.storage(rel);
        write(&path, content);
        path
    }

    /// Writes a file outside the storage tree, as a browser upload would
    /// arrive.
    pub fn incoming(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.root.join("incoming").join(name);
        write(&path, content);
        path
    }

    pub fn upload(&mut self, sop_number: &str, file_name: &str) -> DocumentRecord {
        let source = self.incoming(file_name, b"uploaded content");
        let request = upload::UploadRequest::new(source, sop_number, "Sample", "Quality")
            .with_doc_type("SOP");
        let (store, services) = self.parts();
        let result = upload::run(store, &services, &author(), request).expect("upload");
        result.documents[0].clone()
    }

    pub fn create_sop(&mut self, draft: SopDraft) -> CmdResult {
        let (store, services) = self.parts();
        structured::create(store, &services, &author(), draft).expect("create structured SOP")
    }

    pub fn document(&self, id: &Uuid) -> DocumentRecord {
        self.tables().document(id).cloned().expect("document exists")
    }
}

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(path, content).expect("write file");
}
