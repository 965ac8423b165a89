use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use sopvault::files::Category;
use sopvault::model::{Revision, Role};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sopvault")]
#[command(about = "Controlled-document register: approval, deletion, archive and restore of SOPs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Keep the register and the file tree under this directory
    #[arg(long, global = true, help_heading = "Options")]
    pub root: Option<PathBuf>,

    /// Name of the person acting (defaults to $SOPVAULT_USER)
    #[arg(long = "as", global = true, value_name = "NAME", help_heading = "Identity")]
    pub actor: Option<String>,

    /// Email of the person acting
    #[arg(long, global = true, help_heading = "Identity")]
    pub email: Option<String>,

    /// Role of the person acting
    #[arg(long, global = true, value_enum, default_value_t = RoleArg::User, help_heading = "Identity")]
    pub role: RoleArg,

    /// Log lifecycle events to stderr
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, help_heading = "Options")]
    pub log_json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Manager,
    User,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Manager => Role::Manager,
            RoleArg::User => Role::User,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Originals,
    Pdfs,
    Videos,
    Steps,
}

impl From<CategoryArg> for Category {
    fn from(category: CategoryArg) -> Self {
        match category {
            CategoryArg::Originals => Category::Originals,
            CategoryArg::Pdfs => Category::Pdfs,
            CategoryArg::Videos => Category::Videos,
            CategoryArg::Steps => Category::Steps,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register an uploaded file for approval
    #[command(display_order = 1)]
    Upload {
        /// File to upload
        file: PathBuf,

        /// SOP number (e.g. QA-001)
        #[arg(long, short = 'n')]
        number: String,

        #[arg(long, short = 't')]
        title: String,

        #[arg(long, short = 'd')]
        department: String,

        /// Document type (defaults to the configured default)
        #[arg(long)]
        doc_type: Option<String>,

        #[arg(long, default_value = "")]
        area: String,

        /// Revision label (e.g. "Rev: 2" or 2)
        #[arg(long, short = 'r')]
        revision: Option<Revision>,

        /// Effective date (YYYY-MM-DD)
        #[arg(long)]
        effective_date: Option<NaiveDate>,

        /// Manager who must approve
        #[arg(long)]
        supervisor: Option<String>,

        #[arg(long, requires = "supervisor")]
        supervisor_email: Option<String>,
    },

    /// Create a structured SOP from a JSON draft
    #[command(display_order = 2)]
    Create {
        /// JSON file with the draft
        draft: PathBuf,
    },

    /// Apply a JSON edit to a structured SOP
    #[command(display_order = 3)]
    Edit {
        /// SOP number, SOP id or register id
        sop: String,

        /// JSON file with the changes
        changes: PathBuf,
    },

    /// Rebuild the register row of a structured SOP
    #[command(display_order = 4)]
    Sync {
        sop: String,
    },

    /// Approve at the current stage (manager, then admin)
    #[command(display_order = 10)]
    Approve {
        /// SOP number or register id
        document: String,
    },

    /// Return a document for review, or remove a plain upload
    #[command(display_order = 11)]
    Reject {
        document: String,

        #[arg(long, short = 'm')]
        reason: String,
    },

    /// Ask for an approved document to be deleted
    #[command(display_order = 20)]
    RequestDeletion {
        document: String,

        #[arg(long, short = 'm')]
        reason: String,
    },

    /// Turn down a pending deletion request
    #[command(display_order = 21)]
    RejectDeletion {
        document: String,
    },

    /// Approve a deletion request and archive the document
    #[command(display_order = 22)]
    ApproveDeletion {
        document: String,
    },

    /// Bring an archived document back
    #[command(display_order = 23)]
    Restore {
        /// Deletion log id, or SOP number for its latest log
        log: String,
    },

    /// Permanently erase an archived document
    #[command(display_order = 24)]
    Purge {
        log: String,
    },

    /// List register entries
    #[command(alias = "ls", display_order = 30)]
    List {
        /// Include archived rows
        #[arg(long)]
        all: bool,
    },

    /// Show one document with its structured SOP and audit trail
    #[command(display_order = 31)]
    Show {
        document: String,
    },

    /// List structured SOPs
    #[command(display_order = 32)]
    Sops {
        #[arg(long)]
        all: bool,
    },

    /// List archived documents
    #[command(display_order = 33)]
    Trash,

    /// Audit trail of an SOP number
    #[command(display_order = 34)]
    Audit {
        number: String,
    },

    /// Find a file across current and legacy folders
    #[command(display_order = 35)]
    Locate {
        #[arg(value_enum)]
        category: CategoryArg,

        file_name: String,

        #[arg(long)]
        doc_type: Option<String>,
    },

    /// Next free SOP number for a document type
    #[command(display_order = 40)]
    NextNumber {
        doc_type: String,
    },
}
