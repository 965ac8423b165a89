//! # CLI Layer
//!
//! This module is one client of the sopvault library. It is the only place
//! that:
//! - Parses shell arguments
//! - Installs a tracing subscriber
//! - Writes to stdout and stderr
//!
//! [`setup`] defines the clap interface, [`commands`] wires the vault and
//! dispatches, and [`render`] turns a `CmdResult` into terminal text.

mod commands;
mod render;
pub mod setup;

pub use commands::run;
