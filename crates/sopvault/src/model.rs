//! # Domain Model
//!
//! The register keeps two aggregates that describe the same controlled document
//! from different angles:
//!
//! - [`DocumentRecord`]: the canonical register row. Owns status, revision,
//!   approval metadata and the physical file references. Every document has
//!   one, whether it was uploaded as a file or authored as steps.
//! - [`StructuredSop`]: step content for documents written in the structured
//!   editor. Always paired with exactly one live [`DocumentRecord`]; the sync
//!   command keeps the pair in lockstep.
//!
//! Once a document is archived, the only durable copy of its metadata is the
//! [`DeletionLog`] snapshot written by the archive pipeline.
//!
//! ## Status Machine
//!
//! ```text
//! Pending Approval ─┬─(manager)─▶ Pending Admin Approval ─(admin)─▶ Approved
//!                   ├─(admin)──────────────────────────────────────▶ Approved
//!                   └─(reject)─▶ Returned for Review
//!
//! Approved ─(request deletion)─▶ Pending Deletion ─(approve)─▶ Archived
//!                                       └─(reject deletion)─▶ Approved
//! ```
//!
//! `Pending Manager Approval` and `Under Review` are intermediate waiting
//! states some imported documents carry; they behave like `Pending Approval`.
//!
//! ## Revisions
//!
//! Revisions are labelled `Rev: <n>`. A revision bump on a structured SOP never
//! edits the register row in place: the old row is archived and a fresh one is
//! created, so the history survives.

use crate::error::VaultError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sentinel stored when a document has no generated artifact.
pub const NO_ARTIFACT: &str = "N/A";

/// Supervisor value meaning "any manager may approve".
pub const NO_SUPERVISOR: &str = "N/A";

/// Reviewer placeholder while nobody has acted on a document yet.
pub const PENDING_REVIEWER: &str = "Pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[serde(rename = "Pending Approval")]
    PendingApproval,
    #[serde(rename = "Pending Manager Approval")]
    PendingManagerApproval,
    #[serde(rename = "Under Review")]
    UnderReview,
    #[serde(rename = "Pending Admin Approval")]
    PendingAdminApproval,
    Approved,
    #[serde(rename = "Returned for Review")]
    ReturnedForReview,
    Archived,
    #[serde(rename = "Pending Deletion")]
    PendingDeletion,
    Restored,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "Pending Approval",
            Self::PendingManagerApproval => "Pending Manager Approval",
            Self::UnderReview => "Under Review",
            Self::PendingAdminApproval => "Pending Admin Approval",
            Self::Approved => "Approved",
            Self::ReturnedForReview => "Returned for Review",
            Self::Archived => "Archived",
            Self::PendingDeletion => "Pending Deletion",
            Self::Restored => "Restored",
        }
    }

    /// States from which a manager can still move the document forward.
    pub fn awaits_manager(&self) -> bool {
        matches!(
            self,
            Self::PendingApproval | Self::PendingManagerApproval | Self::UnderReview
        )
    }

    /// States an admin may approve from.
    pub fn awaits_approval(&self) -> bool {
        self.awaits_manager() || *self == Self::PendingAdminApproval
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which approval tier most recently acted on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStage {
    Manager,
    Admin,
}

impl fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manager => f.write_str("Manager"),
            Self::Admin => f.write_str("Admin"),
        }
    }
}

/// Revision label, `Rev: <n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(u32);

impl Revision {
    pub const INITIAL: Revision = Revision(0);

    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Result<Self, VaultError> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or_else(|| VaultError::Validation(format!("{} is the last possible revision", self)))
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev: {}", self.0)
    }
}

/// Accepts `Rev: 3`, `rev:3`, `Rev 3` and a bare `3`.
impl FromStr for Revision {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("rev") => {
                trimmed[3..].trim_start_matches([':', '.', ' '])
            }
            _ => trimmed,
        };
        digits
            .trim()
            .parse::<u32>()
            .map(Revision)
            .map_err(|_| VaultError::Validation(format!("Invalid revision label '{}'", s)))
    }
}

impl TryFrom<String> for Revision {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl FromStr for Role {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "user" => Ok(Self::User),
            other => Err(VaultError::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("Admin"),
            Self::Manager => f.write_str("Manager"),
            Self::User => f.write_str("User"),
        }
    }
}

/// The authenticated person performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            email: None,
            role,
        }
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self::new(name, Role::Admin)
    }

    pub fn manager(name: impl Into<String>) -> Self {
        Self::new(name, Role::Manager)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, Role::User)
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn is_reviewer(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }

    /// Matches a supervisor entry by name or e-mail, case-insensitively.
    pub fn is(&self, who: &str) -> bool {
        let who = who.trim();
        self.name.eq_ignore_ascii_case(who)
            || self
                .email
                .as_deref()
                .is_some_and(|email| email.eq_ignore_ascii_case(who))
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Metadata shared between a live register row and its deletion-log snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub department: String,
    pub doc_type: String,
    #[serde(default)]
    pub area: String,
    pub revision: Revision,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    pub author: String,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub supervisor: Option<String>,
    #[serde(default)]
    pub supervisor_email: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub last_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

/// Canonical register row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub sop_number: String,
    pub title: String,
    /// File under `Originals/<DocType>/`.
    pub original_file: String,
    /// Generated artifact under `PDFs/<DocType>/`, or [`NO_ARTIFACT`].
    pub file_name: String,
    #[serde(default)]
    pub video_file: Option<String>,
    pub meta: DocumentMeta,
    pub status: DocumentStatus,
    #[serde(default)]
    pub stage: Option<ApprovalStage>,
    pub reviewed_by: String,
    #[serde(default)]
    pub manager_approved: bool,
    #[serde(default)]
    pub manager_approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manager_approved_by: Option<String>,
    #[serde(default)]
    pub admin_approved: bool,
    #[serde(default)]
    pub admin_approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_approved_by: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deletion_requested_by: Option<String>,
    #[serde(default)]
    pub deletion_reason: Option<String>,
    #[serde(default)]
    pub deletion_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub structured: bool,
    #[serde(default)]
    pub sop_id: Option<Uuid>,
}

impl DocumentRecord {
    pub fn new(
        sop_number: impl Into<String>,
        title: impl Into<String>,
        original_file: impl Into<String>,
        meta: DocumentMeta,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sop_number: sop_number.into(),
            title: title.into(),
            original_file: original_file.into(),
            file_name: NO_ARTIFACT.to_string(),
            video_file: None,
            meta,
            status: DocumentStatus::PendingApproval,
            stage: None,
            reviewed_by: PENDING_REVIEWER.to_string(),
            manager_approved: false,
            manager_approved_at: None,
            manager_approved_by: None,
            admin_approved: false,
            admin_approved_at: None,
            admin_approved_by: None,
            rejection_reason: None,
            returned_at: None,
            deletion_requested_by: None,
            deletion_reason: None,
            deletion_requested_at: None,
            is_archived: false,
            archived_at: None,
            structured: false,
            sop_id: None,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.is_archived
    }

    pub fn has_artifact(&self) -> bool {
        !self.file_name.trim().is_empty() && self.file_name != NO_ARTIFACT
    }

    /// Restart the approval pipeline from scratch.
    pub fn reset_approvals(&mut self) {
        self.status = DocumentStatus::PendingApproval;
        self.stage = None;
        self.reviewed_by = PENDING_REVIEWER.to_string();
        self.manager_approved = false;
        self.manager_approved_at = None;
        self.manager_approved_by = None;
        self.admin_approved = false;
        self.admin_approved_at = None;
        self.admin_approved_by = None;
        self.rejection_reason = None;
        self.returned_at = None;
    }

    pub fn clear_deletion_request(&mut self) {
        self.deletion_requested_by = None;
        self.deletion_reason = None;
        self.deletion_requested_at = None;
    }

    /// Flag the row archived and drop its binding to a structured SOP.
    pub fn archive(&mut self, at: DateTime<Utc>) {
        self.is_archived = true;
        self.archived_at = Some(at);
        self.status = DocumentStatus::Archived;
        self.sop_id = None;
    }

    /// The assigned supervisor, unless it is absent or the "N/A" wildcard.
    pub fn required_supervisor(&self) -> Option<&str> {
        self.meta
            .supervisor
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(NO_SUPERVISOR))
    }
}

/// One instruction in a structured SOP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    /// 1-based and contiguous.
    pub sequence: u32,
    pub instruction_html: String,
    #[serde(default)]
    pub key_point_html: String,
    /// Comma-joined relative storage paths.
    #[serde(default)]
    pub image_paths: String,
}

impl Step {
    pub fn new(instruction_html: impl Into<String>, key_point_html: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            instruction_html: instruction_html.into(),
            key_point_html: key_point_html.into(),
            image_paths: String::new(),
        }
    }

    pub fn images(&self) -> Vec<&str> {
        self.image_paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn set_images<I, P>(&mut self, images: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.image_paths = images
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(",");
    }
}

/// A document authored as ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSop {
    pub id: Uuid,
    pub sop_number: String,
    pub title: String,
    pub revision: Revision,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    pub department: String,
    pub doc_type: String,
    #[serde(default)]
    pub area: String,
    pub author: String,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub supervisor: Option<String>,
    #[serde(default)]
    pub supervisor_email: Option<String>,
    pub steps: Vec<Step>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub stage: Option<ApprovalStage>,
    pub reviewed_by: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl StructuredSop {
    pub fn is_live(&self) -> bool {
        self.archived_on.is_none()
    }

    /// `<SopNumber>_<Title>.pdf`, the name used for both the draft and the
    /// approved PDF.
    pub fn pdf_name(&self) -> String {
        document_file_name(&self.sop_number, &self.title, "pdf")
    }

    /// Reassign sequence numbers 1..=n in current order.
    pub fn renumber_steps(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.sequence = i as u32 + 1;
        }
    }

    pub fn referenced_images(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .flat_map(|s| s.images())
            .map(str::to_string)
            .collect()
    }

    pub fn archive(&mut self, at: DateTime<Utc>) {
        self.archived_on = Some(at);
        self.status = DocumentStatus::Archived;
    }
}

/// Capabilities shared by both aggregates when a reviewer sends a document
/// back. Lets the reject command treat either one uniformly.
pub trait ReviewTarget {
    fn set_status(&mut self, status: DocumentStatus);
    fn set_reviewed_by(&mut self, reviewer: &str);
    fn set_rejection_reason(&mut self, reason: String);
    fn set_returned_at(&mut self, at: DateTime<Utc>);
}

impl ReviewTarget for DocumentRecord {
    fn set_status(&mut self, status: DocumentStatus) {
        self.status = status;
    }

    fn set_reviewed_by(&mut self, reviewer: &str) {
        self.reviewed_by = reviewer.to_string();
    }

    fn set_rejection_reason(&mut self, reason: String) {
        self.rejection_reason = Some(reason);
    }

    fn set_returned_at(&mut self, at: DateTime<Utc>) {
        self.returned_at = Some(at);
    }
}

impl ReviewTarget for StructuredSop {
    fn set_status(&mut self, status: DocumentStatus) {
        self.status = status;
    }

    fn set_reviewed_by(&mut self, reviewer: &str) {
        self.reviewed_by = reviewer.to_string();
    }

    fn set_rejection_reason(&mut self, reason: String) {
        self.rejection_reason = Some(reason);
    }

    fn set_returned_at(&mut self, at: DateTime<Utc>) {
        self.returned_at = Some(at);
    }
}

/// Send a document back to its author. The stored reason is prefixed with the
/// reviewer's name.
pub fn return_for_review<T: ReviewTarget + ?Sized>(
    target: &mut T,
    actor: &Actor,
    reason: &str,
    at: DateTime<Utc>,
) {
    target.set_status(DocumentStatus::ReturnedForReview);
    target.set_reviewed_by(&actor.name);
    target.set_rejection_reason(format!("{}: {}", actor.name, reason));
    target.set_returned_at(at);
}

/// Snapshot of a register row at the moment it was archived ("trash").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionLog {
    pub id: Uuid,
    /// Register row this snapshot came from. Always empty for structured SOPs.
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub sop_id: Option<Uuid>,
    pub sop_number: String,
    pub title: String,
    /// Artifact name, archived name preferred.
    pub file_name: String,
    /// Original upload name, archived name preferred.
    pub original_file_name: String,
    #[serde(default)]
    pub video_file_name: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    pub deleted_by: String,
    pub deleted_at: DateTime<Utc>,
    pub was_approved: bool,
    #[serde(default)]
    pub structured: bool,
    pub meta: DocumentMeta,
}

/// Builds `<SopNumber>_<Title>.<ext>` with characters that are unsafe in file
/// names replaced by `_`.
pub fn document_file_name(sop_number: &str, title: &str, ext: &str) -> String {
    let stem = format!("{}_{}", sop_number.trim(), title.trim());
    let safe: String = stem
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}.{}", safe, ext.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_parses_common_spellings() {
        assert_eq!("Rev: 3".parse::<Revision>().unwrap(), Revision::new(3));
        assert_eq!("rev:3".parse::<Revision>().unwrap(), Revision::new(3));
        assert_eq!("Rev 12".parse::<Revision>().unwrap(), Revision::new(12));
        assert_eq!("7".parse::<Revision>().unwrap(), Revision::new(7));
        assert!("Rev: x".parse::<Revision>().is_err());
        assert!("".parse::<Revision>().is_err());
    }

    #[test]
    fn revision_displays_and_increments() {
        let rev = Revision::new(4);
        assert_eq!(rev.to_string(), "Rev: 4");
        assert_eq!(rev.next().unwrap().to_string(), "Rev: 5");
        assert!(matches!(
            Revision::new(u32::MAX).next(),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn revision_serializes_as_label() {
        let json = serde_json::to_string(&Revision::new(2)).unwrap();
        assert_eq!(json, "\"Rev: 2\"");
        let back: Revision = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Revision::new(2));
    }

    #[test]
    fn status_uses_display_names_on_the_wire() {
        let json = serde_json::to_string(&DocumentStatus::PendingAdminApproval).unwrap();
        assert_eq!(json, "\"Pending Admin Approval\"");
        assert_eq!(
            DocumentStatus::ReturnedForReview.to_string(),
            "Returned for Review"
        );
    }

    #[test]
    fn step_images_are_comma_joined() {
        let mut step = Step::new("Do it", "");
        step.set_images(["Steps/a.png", " ", "Steps/b.png "]);
        assert_eq!(step.image_paths, "Steps/a.png,Steps/b.png");
        assert_eq!(step.images(), vec!["Steps/a.png", "Steps/b.png"]);
    }

    #[test]
    fn supervisor_wildcard_is_ignored() {
        let meta = DocumentMeta {
            department: "QA".into(),
            doc_type: "SOP".into(),
            area: String::new(),
            revision: Revision::INITIAL,
            content_type: String::new(),
            size: 0,
            author: "ann".into(),
            author_email: None,
            supervisor: Some("n/a".into()),
            supervisor_email: None,
            uploaded_at: Utc::now(),
            last_review_at: None,
            effective_date: None,
        };
        let mut doc = DocumentRecord::new("QA-001", "Title", "a.docx", meta);
        assert_eq!(doc.required_supervisor(), None);
        doc.meta.supervisor = Some("Bob".into());
        assert_eq!(doc.required_supervisor(), Some("Bob"));
    }

    #[test]
    fn return_for_review_prefixes_reason() {
        let meta = DocumentMeta {
            department: "QA".into(),
            doc_type: "SOP".into(),
            area: String::new(),
            revision: Revision::INITIAL,
            content_type: String::new(),
            size: 0,
            author: "ann".into(),
            author_email: None,
            supervisor: None,
            supervisor_email: None,
            uploaded_at: Utc::now(),
            last_review_at: None,
            effective_date: None,
        };
        let mut doc = DocumentRecord::new("QA-001", "Title", "a.docx", meta);
        let actor = Actor::manager("Bob");
        return_for_review(&mut doc, &actor, "missing signature", Utc::now());
        assert_eq!(doc.status, DocumentStatus::ReturnedForReview);
        assert_eq!(doc.rejection_reason.as_deref(), Some("Bob: missing signature"));
        assert_eq!(doc.reviewed_by, "Bob");
        assert!(doc.returned_at.is_some());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(
            document_file_name("QA-001", "Clean/Room: Entry", "pdf"),
            "QA-001_Clean_Room_ Entry.pdf"
        );
    }
}
