//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the single
//! entry point for every sopvault operation, whatever the front end.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Owns the collaborators**: store, storage layout, configuration,
//!   renderer, notifier and reference data
//! - **Dispatches** each call to its command function with a borrowed
//!   [`Services`] bundle
//! - **Normalizes references**: SOP numbers, register ids and structured SOP
//!   ids all arrive as [`DocumentRef`]
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: that belongs in `commands/*.rs`
//! - **Presentation**: returns [`CmdResult`] values, never strings
//!
//! ## Generic Over DataStore
//!
//! `SopVault<S: DataStore>` runs on the JSON file store in production and on
//! the in-memory store in tests.

use crate::commands::structured::{SopDraft, SopEdit};
use crate::commands::upload::UploadRequest;
use crate::commands::{self, helpers, CmdResult, DocumentRef, Services};
use crate::config::VaultConfig;
use crate::error::Result;
use crate::files::{Category, StorageLayout};
use crate::model::Actor;
use crate::notify::{LogNotifier, Notifier};
use crate::reference::{ReferenceData, StaticDirectory};
use crate::render::{PdfRenderer, TextPdfRenderer};
use crate::store::DataStore;

pub struct SopVault<S: DataStore> {
    store: S,
    layout: StorageLayout,
    config: VaultConfig,
    renderer: Box<dyn PdfRenderer>,
    notifier: Box<dyn Notifier>,
    reference: Box<dyn ReferenceData>,
}

impl<S: DataStore> SopVault<S> {
    /// A vault with the default collaborators: text PDF renderer, logging
    /// notifier and reference data taken from `config`.
    pub fn new(store: S, layout: StorageLayout, config: VaultConfig) -> Self {
        let reference = StaticDirectory::from_config(&config);
        Self {
            store,
            layout,
            config,
            renderer: Box::new(TextPdfRenderer),
            notifier: Box::new(LogNotifier),
            reference: Box::new(reference),
        }
    }

    pub fn with_renderer(mut self, renderer: impl PdfRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_reference(mut self, reference: impl ReferenceData + 'static) -> Self {
        self.reference = Box::new(reference);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn parts(&mut self) -> (&mut S, Services<'_>) {
        let services = Services {
            layout: &self.layout,
            config: &self.config,
            renderer: self.renderer.as_ref(),
            notifier: self.notifier.as_ref(),
            reference: self.reference.as_ref(),
        };
        (&mut self.store, services)
    }

    fn services(&self) -> Services<'_> {
        Services {
            layout: &self.layout,
            config: &self.config,
            renderer: self.renderer.as_ref(),
            notifier: self.notifier.as_ref(),
            reference: self.reference.as_ref(),
        }
    }

    // --- Intake ---

    pub fn upload(&mut self, actor: &Actor, request: UploadRequest) -> Result<CmdResult> {
        let (store, services) = self.parts();
        commands::upload::run(store, &services, actor, request)
    }

    pub fn create_sop(&mut self, actor: &Actor, draft: SopDraft) -> Result<CmdResult> {
        let (store, services) = self.parts();
        commands::structured::create(store, &services, actor, draft)
    }

    pub fn edit_sop(&mut self, actor: &Actor, sop: &DocumentRef, changes: SopEdit) -> Result<CmdResult> {
        let sop_id = helpers::resolve_sop_id(&self.store.load()?, sop)?;
        let (store, services) = self.parts();
        commands::structured::edit(store, &services, actor, sop_id, changes)
    }

    pub fn sync_sop(&mut self, actor: &Actor, sop: &DocumentRef) -> Result<CmdResult> {
        let sop_id = helpers::resolve_sop_id(&self.store.load()?, sop)?;
        let (store, services) = self.parts();
        commands::sync::run(store, &services, actor, sop_id)
    }

    pub fn next_sop_number(&self, doc_type: &str) -> Result<String> {
        commands::number::next_sop_number(&self.store, &self.services(), doc_type)
    }

    // --- Approval ---

    pub fn approve(&mut self, actor: &Actor, document: &DocumentRef) -> Result<CmdResult> {
        let (store, services) = self.parts();
        commands::approve::run(store, &services, actor, document)
    }

    pub fn reject(&mut self, actor: &Actor, document: &DocumentRef, reason: &str) -> Result<CmdResult> {
        let (store, services) = self.parts();
        commands::reject::run(store, &services, actor, document, reason)
    }

    // --- Deletion and archive ---

    pub fn request_deletion(
        &mut self,
        actor: &Actor,
        document: &DocumentRef,
        reason: &str,
    ) -> Result<CmdResult> {
        commands::deletion::request(&mut self.store, actor, document, reason)
    }

    pub fn reject_deletion(&mut self, actor: &Actor, document: &DocumentRef) -> Result<CmdResult> {
        commands::deletion::reject(&mut self.store, actor, document)
    }

    pub fn approve_deletion(&mut self, actor: &Actor, document: &DocumentRef) -> Result<CmdResult> {
        let (store, services) = self.parts();
        commands::archive::run(store, &services, actor, document)
    }

    /// `log` names a deletion log by id, or the latest one for an SOP number.
    pub fn restore(&mut self, actor: &Actor, log: &DocumentRef) -> Result<CmdResult> {
        let (store, services) = self.parts();
        commands::restore::run(store, &services, actor, log)
    }

    pub fn purge(&mut self, actor: &Actor, log: &DocumentRef) -> Result<CmdResult> {
        let (store, services) = self.parts();
        commands::purge::run(store, &services, actor, log)
    }

    // --- Queries ---

    pub fn list(&self, include_archived: bool) -> Result<CmdResult> {
        commands::get::list(&self.store, include_archived)
    }

    pub fn show(&self, document: &DocumentRef) -> Result<CmdResult> {
        commands::get::show(&self.store, document)
    }

    pub fn trash(&self) -> Result<CmdResult> {
        commands::get::trash(&self.store)
    }

    pub fn audit(&self, sop_number: &str) -> Result<CmdResult> {
        commands::get::audit(&self.store, sop_number)
    }

    pub fn sops(&self, include_archived: bool) -> Result<CmdResult> {
        commands::get::sops(&self.store, include_archived)
    }

    pub fn locate(&self, category: Category, doc_type: Option<&str>, file_name: &str) -> Result<CmdResult> {
        commands::get::locate_file(&self.services(), category, doc_type, file_name)
    }
}
