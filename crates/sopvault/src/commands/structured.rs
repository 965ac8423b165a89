//! Authoring of structured SOPs.
//!
//! Both [`create`] and [`edit`] render a draft PDF to
//! `PDFs/<DocType>/<SopNumber>_<Title>.pdf` before opening the transaction,
//! then store the SOP and [`sync`](super::sync) it to the register in one
//! commit. If the commit fails the draft file is put back the way it was.
//!
//! Creating an SOP under a number whose live SOP has a lower revision is a
//! revision: the previous SOP and its register row are archived. The same or
//! a lower revision is a conflict; revision labels only go up.

use super::helpers::{notify, require_text, WrittenFile};
use super::sync;
use super::{CmdMessage, CmdResult, Services};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{Result, VaultError};
use crate::files::archiver::{archive_timestamp, FileArchiver};
use crate::files::locator::locate;
use crate::files::Category;
use crate::model::{
    Actor, DocumentStatus, Revision, Step, StructuredSop, PENDING_REVIEWER,
};
use crate::notify::{Notification, NotificationKind};
use crate::render::{sop_footer, sop_html, PageSettings};
use crate::store::{DataStore, Tables};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDraft {
    pub instruction_html: String,
    #[serde(default)]
    pub key_point_html: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Input for a new structured SOP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SopDraft {
    pub sop_number: String,
    pub title: String,
    #[serde(default)]
    pub revision: Option<Revision>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    pub department: String,
    pub doc_type: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub supervisor: Option<String>,
    #[serde(default)]
    pub supervisor_email: Option<String>,
    pub steps: Vec<StepDraft>,
}

/// A step in an edit. Steps with an `id` keep their identity; steps of the
/// SOP that are not listed are deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEdit {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub instruction_html: String,
    #[serde(default)]
    pub key_point_html: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SopEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub steps: Option<Vec<StepEdit>>,
    /// Start a new revision (`Rev: n+1`) with a fresh register row.
    #[serde(default)]
    pub bump_revision: bool,
}

fn validate_steps<'a, I>(instructions: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut count = 0;
    for (i, html) in instructions.into_iter().enumerate() {
        if html.trim().is_empty() {
            return Err(VaultError::Validation(format!(
                "Step {} has no instruction",
                i + 1
            )));
        }
        count += 1;
    }
    if count == 0 {
        return Err(VaultError::Validation(
            "A structured SOP needs at least one step".to_string(),
        ));
    }
    Ok(())
}

fn render_draft(services: &Services, sop: &StructuredSop) -> Result<WrittenFile> {
    let bytes = services
        .renderer
        .render(&sop_html(sop), &sop_footer(sop), &PageSettings::default())?;
    let path = services
        .layout
        .live_dir(Category::Pdfs, &services.folder(&sop.doc_type))
        .join(sop.pdf_name());
    WrittenFile::write(path, &bytes)
}

pub fn create<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    draft: SopDraft,
) -> Result<CmdResult> {
    let sop_number = require_text(&draft.sop_number, "SOP number")?;
    let title = require_text(&draft.title, "Title")?;
    let department = require_text(&draft.department, "Department")?;
    let doc_type = require_text(&draft.doc_type, "Document type")?;
    validate_steps(draft.steps.iter().map(|s| s.instruction_html.as_str()))?;
    let revision = draft.revision.unwrap_or_default();

    let snapshot = store.load()?;
    let previous = snapshot.live_sop(&sop_number).cloned();
    if let Some(prev) = &previous {
        if revision <= prev.revision {
            return Err(VaultError::Conflict(format!(
                "SOP {} is live at {}; a new revision must be higher than that, not {}",
                sop_number, prev.revision, revision
            )));
        }
    }
    if let Some(doc) = snapshot.live_document(&sop_number) {
        if !doc.structured {
            return Err(VaultError::Conflict(format!(
                "SOP {} is held by an uploaded document",
                sop_number
            )));
        }
    }

    let (supervisor, supervisor_email) = match draft.supervisor {
        Some(name) => (Some(name), draft.supervisor_email),
        None => match services.reference.department_supervisor(&department) {
            Some(sup) => (Some(sup.name), sup.email),
            None => (None, None),
        },
    };

    let now = Utc::now();
    let mut sop = StructuredSop {
        id: Uuid::new_v4(),
        sop_number,
        title,
        revision,
        effective_date: draft.effective_date,
        department,
        doc_type,
        area: draft.area.trim().to_string(),
        author: actor.name.clone(),
        author_email: actor.email.clone(),
        supervisor,
        supervisor_email,
        steps: draft
            .steps
            .into_iter()
            .map(|s| {
                let mut step = Step::new(s.instruction_html, s.key_point_html);
                step.set_images(&s.images);
                step
            })
            .collect(),
        status: DocumentStatus::PendingApproval,
        stage: None,
        reviewed_by: PENDING_REVIEWER.to_string(),
        rejection_reason: None,
        returned_at: None,
        approved_by: None,
        approved_at: None,
        created_at: now,
        archived_on: None,
        document_id: None,
        synced_at: None,
    };
    sop.renumber_steps();

    let draft_pdf = render_draft(services, &sop)?;
    let pdf_name = sop.pdf_name();
    let sop_id = sop.id;

    let committed = store.transaction(|tx| {
        if let Some(prev) = &previous {
            if let Some(old) = tx.sop_mut(&prev.id) {
                old.archive(now);
            }
        }
        tx.insert_sop(sop.clone())?;
        let outcome = sync::apply(tx, services, sop_id, actor, &pdf_name)?;
        let mut entry = AuditEntry::new(AuditAction::Created, &sop.sop_number, &sop.title, actor)
            .with_document(outcome.document_id)
            .with_details(format!("{} with {} steps", sop.revision, sop.steps.len()));
        if let Some(prev) = &previous {
            entry = entry.with_details(format!(
                "{} with {} steps, supersedes {}",
                sop.revision,
                sop.steps.len(),
                prev.revision
            ));
        }
        tx.append_audit(entry);
        let doc = tx
            .document(&outcome.document_id)
            .cloned()
            .ok_or_else(|| VaultError::Store("Synced register entry missing".to_string()))?;
        let stored = tx
            .sop(&sop_id)
            .cloned()
            .ok_or_else(|| VaultError::Store("Structured SOP missing after insert".to_string()))?;
        Ok((doc, stored))
    });
    let (doc, stored) = match committed {
        Ok(v) => v,
        Err(e) => {
            draft_pdf.undo();
            return Err(e);
        }
    };

    info!(sop_number = %stored.sop_number, revision = %stored.revision, "structured SOP created");
    let mut result = CmdResult::default();
    if let Some(prev) = previous {
        result.add_message(CmdMessage::info(format!(
            "SOP {} {} archived in favour of {}",
            prev.sop_number, prev.revision, stored.revision
        )));
    }
    result.add_message(CmdMessage::success(format!(
        "SOP {} created: {} ({})",
        stored.sop_number, stored.title, stored.revision
    )));
    notify(
        services,
        &mut result,
        Notification::for_document(NotificationKind::PendingSop, &doc, &actor.name),
    );
    result.paths.push(draft_pdf.path);
    Ok(result.with_documents(vec![doc]).with_sops(vec![stored]))
}

pub fn edit<S: DataStore>(
    store: &mut S,
    services: &Services,
    actor: &Actor,
    sop_id: Uuid,
    changes: SopEdit,
) -> Result<CmdResult> {
    let snapshot = store.load()?;
    let current = snapshot
        .sop(&sop_id)
        .cloned()
        .ok_or_else(|| VaultError::NotFound(format!("No structured SOP with id {}", sop_id)))?;
    if !current.is_live() {
        return Err(VaultError::Conflict(format!(
            "SOP {} is archived and cannot be edited",
            current.sop_number
        )));
    }
    if !actor.is_reviewer() && !actor.is(&current.author) {
        return Err(VaultError::Unauthorized(format!(
            "Only the author or a reviewer may edit SOP {}",
            current.sop_number
        )));
    }
    let linked_status = current
        .document_id
        .and_then(|id| snapshot.document(&id))
        .map(|d| d.status);
    if matches!(
        linked_status,
        Some(DocumentStatus::PendingDeletion) | Some(DocumentStatus::Archived)
    ) {
        return Err(VaultError::Conflict(format!(
            "SOP {} is pending deletion and cannot be edited",
            current.sop_number
        )));
    }

    let mut sop = current.clone();
    if let Some(title) = &changes.title {
        sop.title = require_text(title, "Title")?;
    }
    if let Some(area) = &changes.area {
        sop.area = area.trim().to_string();
    }
    if changes.effective_date.is_some() {
        sop.effective_date = changes.effective_date;
    }
    if let Some(steps) = changes.steps {
        validate_steps(steps.iter().map(|s| s.instruction_html.as_str()))?;
        sop.steps = steps
            .into_iter()
            .map(|edit| {
                let kept = edit
                    .id
                    .and_then(|id| current.steps.iter().find(|s| s.id == id));
                let mut step = match kept {
                    Some(existing) => existing.clone(),
                    None => Step::new("", ""),
                };
                step.instruction_html = edit.instruction_html;
                step.key_point_html = edit.key_point_html;
                step.set_images(&edit.images);
                step
            })
            .collect();
    }
    sop.renumber_steps();
    if changes.bump_revision {
        sop.revision = current.revision.next()?;
    }

    let orphaned: BTreeSet<String> = current
        .referenced_images()
        .difference(&sop.referenced_images())
        .cloned()
        .collect();

    let draft_pdf = render_draft(services, &sop)?;
    let pdf_name = sop.pdf_name();
    let action = if changes.bump_revision {
        AuditAction::Revised
    } else {
        AuditAction::Edited
    };

    let committed = store.transaction(|tx| {
        let slot = tx
            .sop_mut(&sop_id)
            .ok_or_else(|| VaultError::NotFound(format!("No structured SOP with id {}", sop_id)))?;
        *slot = sop.clone();
        let outcome = sync::apply(tx, services, sop_id, actor, &pdf_name)?;
        let details = if changes.bump_revision {
            format!("{} -> {}", current.revision, sop.revision)
        } else {
            format!("{} steps", sop.steps.len())
        };
        tx.append_audit(
            AuditEntry::new(action, &sop.sop_number, &sop.title, actor)
                .with_document(outcome.document_id)
                .with_details(details),
        );
        let doc = tx
            .document(&outcome.document_id)
            .cloned()
            .ok_or_else(|| VaultError::Store("Synced register entry missing".to_string()))?;
        let stored = tx
            .sop(&sop_id)
            .cloned()
            .ok_or_else(|| VaultError::Store("Structured SOP missing after edit".to_string()))?;
        Ok((doc, stored))
    });
    let (doc, stored) = match committed {
        Ok(v) => v,
        Err(e) => {
            draft_pdf.undo();
            return Err(e);
        }
    };

    let mut result = CmdResult::default();
    if !orphaned.is_empty() {
        archive_orphaned_images(services, &snapshot, sop_id, &orphaned, &mut result);
    }

    info!(sop_number = %stored.sop_number, revision = %stored.revision, "structured SOP edited");
    result.add_message(CmdMessage::success(format!(
        "SOP {} updated: {} ({}, {} steps)",
        stored.sop_number,
        stored.title,
        stored.revision,
        stored.steps.len()
    )));
    notify(
        services,
        &mut result,
        Notification::for_document(NotificationKind::PendingSop, &doc, &actor.name),
    );
    result.paths.push(draft_pdf.path);
    Ok(result.with_documents(vec![doc]).with_sops(vec![stored]))
}

/// Moves images no longer referenced by `sop_id` into the step archive.
/// An image is resolved at its stored path under the storage root first;
/// files still referenced by another live SOP stay where they are.
fn archive_orphaned_images(
    services: &Services,
    tables: &Tables,
    sop_id: Uuid,
    orphaned: &BTreeSet<String>,
    result: &mut CmdResult,
) {
    let layout = services.layout;
    let in_use: Vec<PathBuf> = tables
        .sops
        .iter()
        .filter(|s| s.is_live() && s.id != sop_id)
        .flat_map(|s| s.referenced_images())
        .map(|image| layout.root().join(image))
        .collect();
    let archiver = FileArchiver::new(layout);
    let timestamp = archive_timestamp(Utc::now());

    for image in orphaned {
        let stored = layout.root().join(image);
        let found = if stored.is_file() {
            Some(stored)
        } else {
            locate(&layout.candidates(Category::Steps, None), image)
        };
        let Some(found) = found else {
            warn!(image = %image, "orphaned step image not found");
            continue;
        };
        if in_use.iter().any(|p| same_file(p, &found)) {
            info!(image = %image, "step image still used by another SOP");
            continue;
        }
        match archiver.archive_found(&found, &timestamp, Category::Steps) {
            Ok(name) => result.add_message(CmdMessage::info(format!("Archived step image {}", name))),
            Err(e) => {
                warn!(image = %image, error = %e, "could not archive step image");
                result.add_message(CmdMessage::warning(format!(
                    "Step image {} could not be archived: {}",
                    image, e
                )));
            }
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{admin, author, sample_draft, FailingRenderer, TestEnv};

    #[test]
    fn create_renders_draft_and_links_row() {
        let mut env = TestEnv::new();
        let result = env.create_sop(sample_draft("QA-200", 0));

        let sop = &result.sops[0];
        let doc = &result.documents[0];
        assert_eq!(sop.document_id, Some(doc.id));
        assert_eq!(doc.status, DocumentStatus::PendingApproval);
        assert_eq!(doc.file_name, "QA-200_Line Clearance.pdf");
        assert!(env.storage("PDFs/SOP/QA-200_Line Clearance.pdf").is_file());
        assert!(doc.meta.size > 0);
        assert_eq!(sop.steps[1].sequence, 2);
        assert_eq!(env.notifier.kinds(), vec![NotificationKind::PendingSop]);
        assert_eq!(env.tables().audit_for("QA-200")[0].action, AuditAction::Created);
    }

    #[test]
    fn same_revision_twice_is_a_conflict() {
        let mut env = TestEnv::new();
        env.create_sop(sample_draft("QA-201", 0));
        let (store, services) = env.parts();
        let err = create(store, &services, &author(), sample_draft("QA-201", 0)).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
    }

    #[test]
    fn older_revision_cannot_replace_a_newer_one() {
        let mut env = TestEnv::new();
        let live = env.create_sop(sample_draft("QA-209", 3));
        let (store, services) = env.parts();
        let err = create(store, &services, &author(), sample_draft("QA-209", 1)).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));

        let tables = env.tables();
        let row = tables.live_document("QA-209").unwrap();
        assert_eq!(row.id, live.documents[0].id);
        assert_eq!(row.meta.revision, Revision::new(3));
        assert!(tables.sop(&live.sops[0].id).unwrap().is_live());
    }

    #[test]
    fn new_revision_archives_previous_row() {
        let mut env = TestEnv::new();
        let first = env.create_sop(sample_draft("QA-202", 0));
        let second = env.create_sop(sample_draft("QA-202", 1));

        let tables = env.tables();
        let old_row = tables.document(&first.documents[0].id).unwrap();
        assert!(old_row.is_archived);
        assert!(!tables.sop(&first.sops[0].id).unwrap().is_live());

        let live: Vec<_> = tables
            .documents
            .iter()
            .filter(|d| d.sop_number == "QA-202" && d.is_live())
            .collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].sop_id, Some(second.sops[0].id));
        assert_eq!(live[0].meta.revision, Revision::new(1));
    }

    #[test]
    fn plain_upload_number_blocks_creation() {
        let mut env = TestEnv::new();
        env.upload("QA-203", "file.docx");
        let (store, services) = env.parts();
        let err = create(store, &services, &author(), sample_draft("QA-203", 0)).unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
    }

    #[test]
    fn render_failure_leaves_no_trace() {
        let mut env = TestEnv::new();
        env.renderer = Box::new(FailingRenderer);
        let (store, services) = env.parts();
        let err = create(store, &services, &author(), sample_draft("QA-204", 0)).unwrap_err();
        assert!(matches!(err, VaultError::External(_)));
        let tables = env.tables();
        assert!(tables.documents.is_empty());
        assert!(tables.sops.is_empty());
    }

    #[test]
    fn commit_failure_removes_draft_pdf() {
        let mut env = TestEnv::new();
        env.store.backend().set_simulate_write_error(true);
        let (store, services) = env.parts();
        assert!(create(store, &services, &author(), sample_draft("QA-205", 0)).is_err());
        assert!(!env.storage("PDFs/SOP/QA-205_Line Clearance.pdf").exists());
    }

    #[test]
    fn steps_are_required() {
        let mut env = TestEnv::new();
        let mut draft = sample_draft("QA-206", 0);
        draft.steps.clear();
        let (store, services) = env.parts();
        assert!(matches!(
            create(store, &services, &author(), draft),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn edit_replaces_steps_and_archives_orphaned_images() {
        let mut env = TestEnv::new();
        env.put("Steps/clearance-1.png", b"png");
        let created = env.create_sop(sample_draft("QA-207", 0));
        let sop = created.sops[0].clone();

        let changes = SopEdit {
            title: Some("Line Clearance v2".into()),
            steps: Some(vec![StepEdit {
                id: Some(sop.steps[1].id),
                instruction_html: "<p>Sign the log twice</p>".into(),
                key_point_html: String::new(),
                images: Vec::new(),
            }]),
            ..Default::default()
        };
        let (store, services) = env.parts();
        let result = edit(store, &services, &author(), sop.id, changes).unwrap();

        let edited = &result.sops[0];
        assert_eq!(edited.steps.len(), 1);
        assert_eq!(edited.steps[0].id, sop.steps[1].id);
        assert_eq!(edited.steps[0].sequence, 1);
        assert_eq!(edited.title, "Line Clearance v2");
        assert!(!env.storage("Steps/clearance-1.png").exists());
        let archived: Vec<_> = std::fs::read_dir(env.layout.archive_dir(Category::Steps))
            .unwrap()
            .collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(result.documents[0].id, created.documents[0].id);
        assert_eq!(env.tables().audit_for("QA-207").last().unwrap().action, AuditAction::Edited);
    }

    #[test]
    fn orphaned_image_is_found_by_its_stored_path() {
        let mut env = TestEnv::new();
        env.put("Steps/A/1.png", b"kept");
        env.put("Steps/B/1.png", b"dropped");

        let mut first = sample_draft("QA-901", 0);
        first.steps[0].images = vec!["Steps/B/1.png".to_string()];
        let first = env.create_sop(first).sops[0].clone();
        let mut second = sample_draft("QA-902", 0);
        second.steps[0].images = vec!["Steps/A/1.png".to_string()];
        env.create_sop(second);

        let changes = SopEdit {
            steps: Some(vec![StepEdit {
                id: Some(first.steps[0].id),
                instruction_html: "<p>Remove previous labels</p>".into(),
                key_point_html: String::new(),
                images: Vec::new(),
            }]),
            ..Default::default()
        };
        let (store, services) = env.parts();
        edit(store, &services, &author(), first.id, changes).unwrap();

        assert!(env.storage("Steps/A/1.png").is_file());
        assert!(!env.storage("Steps/B/1.png").exists());
    }

    #[test]
    fn image_shared_with_another_live_sop_stays_in_place() {
        let mut env = TestEnv::new();
        env.put("Steps/clearance-1.png", b"png");
        let first = env.create_sop(sample_draft("QA-903", 0)).sops[0].clone();
        env.create_sop(sample_draft("QA-904", 0));

        let changes = SopEdit {
            steps: Some(vec![StepEdit {
                id: Some(first.steps[1].id),
                instruction_html: "<p>Sign the log</p>".into(),
                key_point_html: String::new(),
                images: Vec::new(),
            }]),
            ..Default::default()
        };
        let (store, services) = env.parts();
        edit(store, &services, &author(), first.id, changes).unwrap();

        assert!(env.storage("Steps/clearance-1.png").is_file());
        assert!(!env.layout.archive_dir(Category::Steps).exists());
    }

    #[test]
    fn edit_with_revision_bump_starts_a_fresh_row() {
        let mut env = TestEnv::new();
        let created = env.create_sop(sample_draft("QA-208", 0));
        let sop_id = created.sops[0].id;
        let changes = SopEdit {
            bump_revision: true,
            ..Default::default()
        };
        let (store, services) = env.parts();
        let result = edit(store, &services, &admin(), sop_id, changes).unwrap();

        assert_eq!(result.sops[0].revision, Revision::new(1));
        assert_ne!(result.documents[0].id, created.documents[0].id);
        let tables = env.tables();
        assert!(tables.document(&created.documents[0].id).unwrap().is_archived);
        assert_eq!(tables.live_document("QA-208").unwrap().meta.revision, Revision::new(1));
    }

    #[test]
    fn strangers_cannot_edit() {
        let mut env = TestEnv::new();
        let created = env.create_sop(sample_draft("QA-209", 0));
        let (store, services) = env.parts();
        let err = edit(
            store,
            &services,
            &Actor::user("Somebody Else"),
            created.sops[0].id,
            SopEdit::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized(_)));
    }
}
