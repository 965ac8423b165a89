//! Plain-text rendering of command results.
//!
//! Functions here return strings; `commands.rs` decides where they go.
//! Colors come from `colored` and are switched off when stdout is not a
//! terminal.

use colored::Colorize;
use sopvault::audit::AuditEntry;
use sopvault::commands::{CmdMessage, MessageLevel};
use sopvault::model::{DeletionLog, DocumentRecord, DocumentStatus, StructuredSop};
use std::fmt::Write;
use std::path::PathBuf;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn messages(messages: &[CmdMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        let line = match message.level {
            MessageLevel::Info => message.content.normal(),
            MessageLevel::Success => message.content.green(),
            MessageLevel::Warning => format!("warning: {}", message.content).yellow(),
            MessageLevel::Error => format!("error: {}", message.content).red().bold(),
        };
        let _ = writeln!(out, "{}", line);
    }
    out
}

fn status_label(status: DocumentStatus) -> colored::ColoredString {
    let label = status.as_str();
    match status {
        DocumentStatus::Approved | DocumentStatus::Restored => label.green(),
        DocumentStatus::ReturnedForReview | DocumentStatus::PendingDeletion => label.yellow(),
        DocumentStatus::Archived => label.dimmed(),
        _ => label.cyan(),
    }
}

pub fn documents(docs: &[DocumentRecord]) -> String {
    if docs.is_empty() {
        return "No documents.\n".to_string();
    }
    let mut out = String::new();
    for doc in docs {
        let _ = writeln!(
            out,
            "{:<12} {:<8} {:<24} {} ({})",
            doc.sop_number.bold(),
            doc.meta.revision,
            status_label(doc.status),
            doc.title,
            doc.meta.doc_type
        );
    }
    out
}

pub fn document_detail(doc: &DocumentRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", doc.sop_number.bold(), doc.title);
    let _ = writeln!(out, "  id:          {}", doc.id);
    let _ = writeln!(out, "  revision:    {}", doc.meta.revision);
    let _ = writeln!(out, "  status:      {}", status_label(doc.status));
    if let Some(stage) = doc.stage {
        let _ = writeln!(out, "  stage:       {}", stage);
    }
    let _ = writeln!(out, "  reviewed by: {}", doc.reviewed_by);
    let _ = writeln!(out, "  type:        {} / {}", doc.meta.department, doc.meta.doc_type);
    let _ = writeln!(out, "  original:    {}", doc.original_file);
    if doc.has_artifact() {
        let _ = writeln!(out, "  pdf:         {}", doc.file_name);
    }
    if let Some(video) = &doc.video_file {
        let _ = writeln!(out, "  video:       {}", video);
    }
    if let Some(supervisor) = doc.required_supervisor() {
        let _ = writeln!(out, "  supervisor:  {}", supervisor);
    }
    if let Some(reason) = &doc.rejection_reason {
        let _ = writeln!(out, "  returned:    {}", reason.yellow());
    }
    if let Some(reason) = &doc.deletion_reason {
        let _ = writeln!(
            out,
            "  deletion:    {} ({})",
            reason.yellow(),
            doc.deletion_requested_by.as_deref().unwrap_or("unknown")
        );
    }
    out
}

pub fn sops(sops: &[StructuredSop]) -> String {
    if sops.is_empty() {
        return "No structured SOPs.\n".to_string();
    }
    let mut out = String::new();
    for sop in sops {
        let archived = if sop.is_live() { "" } else { " [archived]" };
        let _ = writeln!(
            out,
            "{:<12} {:<8} {:<24} {} ({} steps){}",
            sop.sop_number.bold(),
            sop.revision,
            status_label(sop.status),
            sop.title,
            sop.steps.len(),
            archived
        );
    }
    out
}

pub fn trash(logs: &[DeletionLog]) -> String {
    if logs.is_empty() {
        return "Trash is empty.\n".to_string();
    }
    let mut out = String::new();
    for log in logs {
        let _ = writeln!(
            out,
            "{:<12} {}  deleted {} by {}",
            log.sop_number.bold(),
            log.title,
            log.deleted_at.format(TIME_FORMAT),
            log.deleted_by
        );
        let _ = writeln!(out, "  log id: {}", log.id.to_string().dimmed());
        if let Some(reason) = &log.reason {
            let _ = writeln!(out, "  reason: {}", reason);
        }
    }
    out
}

pub fn audit(entries: &[AuditEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = write!(
            out,
            "{}  {:<20} {}",
            entry.at.format(TIME_FORMAT),
            entry.action.to_string().bold(),
            entry.actor
        );
        if entry.details.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, ": {}", entry.details);
        }
    }
    out
}

pub fn paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("{}\n", p.display()))
        .collect()
}
