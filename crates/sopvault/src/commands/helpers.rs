use super::{CmdMessage, CmdResult, DocumentRef, Services};
use crate::error::{Result, VaultError};
use crate::model::{Actor, DeletionLog, DocumentRecord, Role};
use crate::notify::Notification;
use crate::store::Tables;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

pub const MAX_REASON_LEN: usize = 500;

pub fn require_reviewer(actor: &Actor, action: &str) -> Result<()> {
    if actor.is_reviewer() {
        Ok(())
    } else {
        Err(VaultError::Unauthorized(format!(
            "{} cannot {}: requires the Manager or Admin role",
            actor.name, action
        )))
    }
}

pub fn require_admin(actor: &Actor, action: &str) -> Result<()> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(VaultError::Unauthorized(format!(
            "{} cannot {}: requires the Admin role",
            actor.name, action
        )))
    }
}

/// Trims a free-text reason and enforces presence and length.
pub fn validate_reason(reason: &str, what: &str) -> Result<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(VaultError::Validation(format!("A {} is required", what)));
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(VaultError::Validation(format!(
            "The {} must be at most {} characters",
            what, MAX_REASON_LEN
        )));
    }
    Ok(reason.to_string())
}

pub fn require_text(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(VaultError::Validation(format!("{} is required", field)))
    } else {
        Ok(value.to_string())
    }
}

/// Finds the register row a caller refers to. Numbers resolve to the live
/// row only; ids resolve to any row.
pub fn resolve_document<'t>(tables: &'t Tables, reference: &DocumentRef) -> Result<&'t DocumentRecord> {
    match reference {
        DocumentRef::Id(id) => tables
            .document(id)
            .ok_or_else(|| VaultError::NotFound(format!("No register entry with id {}", id))),
        DocumentRef::Sop { number, title } => tables
            .live_document(number)
            .filter(|d| {
                title
                    .as_deref()
                    .map_or(true, |t| d.title.trim().eq_ignore_ascii_case(t.trim()))
            })
            .ok_or_else(|| VaultError::NotFound(format!("No live register entry for SOP {}", reference))),
    }
}

/// Finds a deletion log by its id, or the latest one for an SOP number.
pub fn resolve_deletion_log<'t>(tables: &'t Tables, reference: &DocumentRef) -> Result<&'t DeletionLog> {
    match reference {
        DocumentRef::Id(id) => tables
            .deletion_log(id)
            .ok_or_else(|| VaultError::NotFound(format!("No deletion log with id {}", id))),
        DocumentRef::Sop { number, .. } => tables
            .latest_deletion_log(number)
            .ok_or_else(|| VaultError::NotFound(format!("SOP {} is not in the trash", number))),
    }
}

/// Finds a structured SOP: an id may name the SOP itself or its register
/// row; a number names the live SOP.
pub fn resolve_sop_id(tables: &Tables, reference: &DocumentRef) -> Result<Uuid> {
    let found = match reference {
        DocumentRef::Id(id) => tables
            .sop(id)
            .map(|s| s.id)
            .or_else(|| tables.document(id).and_then(|d| linked_sop_id(tables, d))),
        DocumentRef::Sop { number, .. } => tables.live_sop(number).map(|s| s.id),
    };
    found.ok_or_else(|| VaultError::NotFound(format!("No structured SOP for {}", reference)))
}

/// Id of the live structured SOP paired with `doc`, if any.
pub fn linked_sop_id(tables: &Tables, doc: &DocumentRecord) -> Option<Uuid> {
    if let Some(sop) = doc.sop_id.and_then(|id| tables.sop(&id)) {
        if sop.is_live() {
            return Some(sop.id);
        }
    }
    if doc.structured && doc.is_live() {
        return tables
            .live_sop(&doc.sop_number)
            .filter(|s| s.document_id.map_or(true, |id| id == doc.id))
            .map(|s| s.id);
    }
    None
}

/// Copies the approval state of a register row onto its structured SOP.
pub fn mirror_to_sop(tables: &mut Tables, doc_id: &Uuid) {
    let Some(doc) = tables.document(doc_id).cloned() else {
        return;
    };
    let Some(sop_id) = linked_sop_id(tables, &doc) else {
        return;
    };
    if let Some(sop) = tables.sop_mut(&sop_id) {
        sop.status = doc.status;
        sop.stage = doc.stage;
        sop.reviewed_by = doc.reviewed_by.clone();
    }
}

/// Sends a notification. Failures are logged and reported as a warning on
/// the result; they never fail the command.
pub fn notify(services: &Services, result: &mut CmdResult, notification: Notification) {
    if let Err(e) = services.notifier.notify(&notification) {
        warn!(
            kind = %notification.kind,
            sop_number = %notification.sop_number,
            error = %e,
            "notification failed"
        );
        result.add_message(CmdMessage::warning(format!(
            "SOP {}: {} notification could not be sent ({})",
            notification.sop_number, notification.kind, e
        )));
        result.notification_failures.push(notification.kind);
    }
}

/// A file written ahead of a commit, undone if the commit fails.
pub struct WrittenFile {
    pub path: PathBuf,
    previous: Option<Vec<u8>>,
}

impl WrittenFile {
    pub fn write(path: PathBuf, bytes: &[u8]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let previous = if path.is_file() {
            Some(fs::read(&path)?)
        } else {
            None
        };
        fs::write(&path, bytes)?;
        Ok(Self { path, previous })
    }

    /// Puts back what was there before, or removes the file.
    pub fn undo(self) {
        let outcome = match &self.previous {
            Some(bytes) => fs::write(&self.path, bytes),
            None => fs::remove_file(&self.path),
        };
        if let Err(e) = outcome {
            warn!(path = %self.path.display(), error = %e, "could not undo file write");
        }
    }
}

/// A file moved aside ahead of a commit. [`finish`](Self::finish) deletes
/// it once the commit has landed; [`undo`](Self::undo) puts it back.
pub struct StagedRemoval {
    pub path: PathBuf,
    staged: PathBuf,
}

impl StagedRemoval {
    pub fn stage(path: PathBuf) -> Result<Self> {
        let name = crate::files::file_name_of(&path);
        let staged = path.with_file_name(format!(".{}.removing", name));
        fs::rename(&path, &staged)?;
        Ok(Self { path, staged })
    }

    pub fn finish(self) -> std::io::Result<()> {
        fs::remove_file(&self.staged)
    }

    pub fn undo(self) {
        if let Err(e) = fs::rename(&self.staged, &self.path) {
            warn!(path = %self.path.display(), error = %e, "could not put back staged file");
        }
    }
}

/// Size of a file, or 0 when it is not there.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn content_type_for(file_name: &str) -> &'static str {
    match crate::files::extension_of(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
