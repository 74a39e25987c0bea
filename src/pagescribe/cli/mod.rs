//! # CLI Behavior
//!
//! This is **one possible front-end** for pagescribe, not the application
//! itself. It is the only place that knows about terminal I/O, exit codes, and
//! output formatting. For the overall architecture, see the crate-level
//! documentation of the `pagescribe` library.
//!
//! ## Commands
//!
//! - `pages <pdf>`: prints the page count
//! - `thumbs <pdf> --out <dir>`: loads every thumbnail in the background and
//!   copies them to `<dir>/page-N.png`
//! - `annotate <pdf> -p N...`: opens the editor for each listed page in turn,
//!   then saves to `-o <out>` or `<name>-annotated.pdf`
//! - `shell <pdf>`: an interactive session (see [`shell`])
//!
//! ## Logging
//!
//! `env_logger` writes the library's `log` records to stderr. The default
//! level is `warn`; `-v` raises it to `debug`, which shows every external
//! program invocation. `RUST_LOG` overrides both.

mod handlers;
mod print;
mod setup;
mod shell;

use clap::Parser;
use env_logger::Env;
use pagescribe::error::Result;
use pagescribe::init::initialize;
use setup::{Cli, Commands};

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let api = initialize()?;

    match cli.command {
        Commands::Pages { pdf } => handlers::handle_pages(api, &pdf),
        Commands::Thumbs { pdf, out } => handlers::handle_thumbs(api, &pdf, &out),
        Commands::Annotate { pdf, pages, output } => {
            handlers::handle_annotate(api, &pdf, &pages, output)
        }
        Commands::Shell { pdf } => shell::run_shell(api, &pdf),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}
