//! # sopvault
//!
//! Lifecycle engine for controlled documents (SOPs): upload or structured
//! authoring, two-stage approval, revision, deletion requests, archive,
//! restore and purge.
//!
//! ## Architecture
//!
//! The crate is UI-agnostic and layered:
//!
//! ```text
//! api (SopVault facade)
//!  └── commands (one module per lifecycle operation)
//!       ├── store (DataStore: register.json or in memory)
//!       ├── files (storage layout, locator, archiver)
//!       └── collaborators: render, notify, reference
//! ```
//!
//! - [`api::SopVault`] is the entry point. Front ends construct one through
//!   [`init::initialize`] and call one method per operation.
//! - [`commands`] hold the business rules and return
//!   [`commands::CmdResult`] values; they never print.
//! - [`store::DataStore`] gives each command a transaction over the whole
//!   register.
//! - [`files`] finds live files across current and legacy layouts and moves
//!   them into `Archive/Deleted/`.
//!
//! ## Logging
//!
//! The library emits [`tracing`] events and never installs a subscriber; the
//! binary decides where they go.

pub mod api;
pub mod audit;
pub mod commands;
pub mod config;
pub mod error;
pub mod files;
pub mod init;
pub mod model;
pub mod notify;
pub mod reference;
pub mod render;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
