//! # Pagescribe CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/pagescribe/cli/`,
//! and this file only invokes `cli::run()` and handles process termination.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/)                                           │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Per-command handlers (handlers.rs)                       │
//! │  - Colored message output (print.rs)                        │
//! │  - Interactive session loop (shell.rs)                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Returns structured `CmdResult` values                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Page numbers are 1-based on the command line and converted to the
//! library's 0-based indices in the handlers.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
