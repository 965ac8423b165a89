//! # sopvault CLI
//!
//! The binary is thin: the CLI lives in `src/cli/`, and this file only invokes
//! `cli::run()` and handles process termination.
//!
//! ## Workspace Structure
//!
//! - `crates/sopvault/`: the UI-agnostic lifecycle library
//! - `crates/sopvault-cli/`: this client, which depends on the library
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/sopvault-cli/src/cli/)                   │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - logging, context wiring and dispatch (commands.rs)       │
//! │  - terminal output (render.rs)                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (crates/sopvault/src/api.rs)                     │
//! │  - Resolves SOP numbers and ids                             │
//! │  - Dispatches to command modules                            │
//! │  - Returns structured `CmdResult` values                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (crates/sopvault/src/commands/*)             │
//! │  - Lifecycle rules, register transactions, file moves       │
//! │  - No knowledge of stdout/stderr or process exits           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from `api.rs` inward returns Rust values. The CLI owns every
//! user-facing concern: who the caller is (`--as`, `--role`), where the vault
//! lives (`--root`), how logs are emitted, and how results are printed.
//!
//! ## Testing Approach
//!
//! - **Command layer**: unit tests next to each command.
//! - **Library integration**: `crates/sopvault/tests/` against the JSON store.
//! - **CLI**: `tests/cli_e2e.rs` runs the binary against a temporary root.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
