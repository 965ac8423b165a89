//! # Dispatch
//!
//! 1. **Parse** arguments with clap ([`super::setup`]).
//! 2. **Log**: install a `tracing-subscriber` on stderr, filtered by
//!    `SOPVAULT_LOG` (default `warn`, `info` with `-v`), JSON with `--log-json`.
//! 3. **Open** the vault through [`sopvault::init::initialize`].
//! 4. **Dispatch** to the matching [`SopVault`] method and print the result.
//!
//! Errors bubble up to `main`, which prints them and exits with status 1.

use super::render;
use super::setup::{Cli, Commands};
use anyhow::{bail, Context, Result};
use clap::Parser;
use sopvault::api::SopVault;
use sopvault::commands::structured::{SopDraft, SopEdit};
use sopvault::commands::upload::UploadRequest;
use sopvault::commands::{CmdResult, DocumentRef};
use sopvault::init::initialize;
use sopvault::model::Actor;
use sopvault::store::fs::FileStore;
use std::fs;
use std::io::IsTerminal;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SOPVAULT_LOG";
pub const USER_ENV: &str = "SOPVAULT_USER";

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let ctx = initialize(cli.root.clone())?;
    debug!(data_dir = %ctx.data_dir.display(), "vault opened");
    let mut vault = ctx.api;
    dispatch(&cli, &mut vault)
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// The caller named by `--as`/`--email`/`--role`, falling back to
/// `SOPVAULT_USER` for the name.
fn actor(cli: &Cli) -> Result<Actor> {
    let name = match &cli.actor {
        Some(name) => name.clone(),
        None => std::env::var(USER_ENV).unwrap_or_default(),
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Pass --as <NAME> or set {} to say who is acting", USER_ENV);
    }
    let mut actor = Actor::new(name, cli.role.into());
    if let Some(email) = &cli.email {
        actor = actor.with_email(email.trim());
    }
    Ok(actor)
}

fn reference(raw: &str) -> Result<DocumentRef> {
    Ok(raw.parse::<DocumentRef>()?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn dispatch(cli: &Cli, vault: &mut SopVault<FileStore>) -> Result<()> {
    match &cli.command {
        Commands::Upload {
            file,
            number,
            title,
            department,
            doc_type,
            area,
            revision,
            effective_date,
            supervisor,
            supervisor_email,
        } => {
            let actor = actor(cli)?;
            let doc_type = doc_type
                .clone()
                .unwrap_or_else(|| vault.config().default_doc_type.clone());
            let mut request = UploadRequest::new(file, number, title, department)
                .with_doc_type(doc_type)
                .with_area(area);
            if let Some(revision) = revision {
                request = request.with_revision(*revision);
            }
            if let Some(date) = effective_date {
                request = request.with_effective_date(*date);
            }
            if let Some(name) = supervisor {
                request = request.with_supervisor(name, supervisor_email.clone());
            }
            print_outcome(&vault.upload(&actor, request)?);
        }
        Commands::Create { draft } => {
            let actor = actor(cli)?;
            let draft: SopDraft = read_json(draft)?;
            print_outcome(&vault.create_sop(&actor, draft)?);
        }
        Commands::Edit { sop, changes } => {
            let actor = actor(cli)?;
            let changes: SopEdit = read_json(changes)?;
            print_outcome(&vault.edit_sop(&actor, &reference(sop)?, changes)?);
        }
        Commands::Sync { sop } => {
            let actor = actor(cli)?;
            print_outcome(&vault.sync_sop(&actor, &reference(sop)?)?);
        }
        Commands::Approve { document } => {
            let actor = actor(cli)?;
            print_outcome(&vault.approve(&actor, &reference(document)?)?);
        }
        Commands::Reject { document, reason } => {
            let actor = actor(cli)?;
            print_outcome(&vault.reject(&actor, &reference(document)?, reason)?);
        }
        Commands::RequestDeletion { document, reason } => {
            let actor = actor(cli)?;
            print_outcome(&vault.request_deletion(&actor, &reference(document)?, reason)?);
        }
        Commands::RejectDeletion { document } => {
            let actor = actor(cli)?;
            print_outcome(&vault.reject_deletion(&actor, &reference(document)?)?);
        }
        Commands::ApproveDeletion { document } => {
            let actor = actor(cli)?;
            print_outcome(&vault.approve_deletion(&actor, &reference(document)?)?);
        }
        Commands::Restore { log } => {
            let actor = actor(cli)?;
            print_outcome(&vault.restore(&actor, &reference(log)?)?);
        }
        Commands::Purge { log } => {
            let actor = actor(cli)?;
            let result = vault.purge(&actor, &reference(log)?)?;
            print!("{}", render::messages(&result.messages));
            print!("{}", render::paths(&result.paths));
        }
        Commands::List { all } => {
            let result = vault.list(*all)?;
            print!("{}", render::documents(&result.documents));
        }
        Commands::Show { document } => {
            let result = vault.show(&reference(document)?)?;
            for doc in &result.documents {
                print!("{}", render::document_detail(doc));
            }
            if !result.sops.is_empty() {
                println!();
                print!("{}", render::sops(&result.sops));
            }
            if !result.audit_entries.is_empty() {
                println!();
                print!("{}", render::audit(&result.audit_entries));
            }
        }
        Commands::Sops { all } => {
            let result = vault.sops(*all)?;
            print!("{}", render::sops(&result.sops));
        }
        Commands::Trash => {
            let result = vault.trash()?;
            print!("{}", render::trash(&result.deletion_logs));
        }
        Commands::Audit { number } => {
            let result = vault.audit(number)?;
            print!("{}", render::messages(&result.messages));
            print!("{}", render::audit(&result.audit_entries));
        }
        Commands::Locate {
            category,
            file_name,
            doc_type,
        } => {
            let result = vault.locate((*category).into(), doc_type.as_deref(), file_name)?;
            print!("{}", render::messages(&result.messages));
            print!("{}", render::paths(&result.paths));
        }
        Commands::NextNumber { doc_type } => {
            println!("{}", vault.next_sop_number(doc_type)?);
        }
    }
    Ok(())
}

/// Messages first, then the rows the command touched.
fn print_outcome(result: &CmdResult) {
    print!("{}", render::messages(&result.messages));
    if !result.documents.is_empty() {
        print!("{}", render::documents(&result.documents));
    }
    if !result.deletion_logs.is_empty() {
        print!("{}", render::trash(&result.deletion_logs));
    }
}
