//! Interactive session on one document.
//!
//! Reads one command per line from stdin. Between commands the shell drains
//! thumbnail events from the background loader and reports pages whose
//! thumbnail could not be produced. Page numbers are 1-based.
//!
//! Leaving with `quit` (or `close`) is refused while there are unsaved
//! annotations; `quit!` discards them. End of input behaves like `quit!`
//! after printing a warning.

use super::handlers::page_index;
use super::print::{print_messages, print_status, print_thumbnail_events};
use colored::Colorize;
use pagescribe::api::{CmdMessage, ScribeApi};
use pagescribe::error::{Result, ScribeError};
use pagescribe::tools::Toolkit;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

const PROMPT: &str = "pagescribe> ";

const HELP: &str = "\
Commands:
  list            show every page and whether it is annotated
  annotate N      draw on page N in the editor
  clear N         discard the annotations on page N
  save PATH       write the annotated document (.pdf is added if missing)
  open PATH       switch to another document
  close, quit     leave (refused while annotations are unsaved)
  quit!           leave and discard unsaved annotations
  help            show this text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ShellCommand {
    List,
    Annotate(usize),
    Clear(usize),
    Save(PathBuf),
    Open(PathBuf),
    Quit { force: bool },
    Help,
    Empty,
}

pub(super) fn parse_command(line: &str) -> std::result::Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let page = |rest: &str| {
        rest.parse::<usize>()
            .map_err(|_| format!("'{}' is not a page number", rest))
    };
    let path = |rest: &str| {
        if rest.is_empty() {
            Err(format!("'{}' needs a path", word))
        } else {
            Ok(PathBuf::from(rest))
        }
    };

    match word {
        "" => Ok(ShellCommand::Empty),
        "list" | "ls" => Ok(ShellCommand::List),
        "annotate" | "a" => page(rest).map(ShellCommand::Annotate),
        "clear" => page(rest).map(ShellCommand::Clear),
        "save" => path(rest).map(ShellCommand::Save),
        "open" => path(rest).map(ShellCommand::Open),
        "close" | "quit" | "q" => Ok(ShellCommand::Quit { force: false }),
        "quit!" | "q!" => Ok(ShellCommand::Quit { force: true }),
        "help" | "?" => Ok(ShellCommand::Help),
        other => Err(format!("Unknown command '{}'. Type 'help'.", other)),
    }
}

enum Flow {
    Continue,
    Exit,
}

fn execute<T: Toolkit + 'static>(api: &mut ScribeApi<T>, command: ShellCommand) -> Result<Flow> {
    match command {
        ShellCommand::Empty => {}
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::List => print_status(&api.status()?),
        ShellCommand::Annotate(page) => {
            let index = page_index(api, page)?;
            print_messages(&api.annotate(index)?.messages);
        }
        ShellCommand::Clear(page) => {
            let index = page_index(api, page)?;
            print_messages(&api.clear(index)?.messages);
        }
        ShellCommand::Save(path) => print_messages(&api.save(&path)?.messages),
        ShellCommand::Open(path) => print_messages(&api.open(&path)?.messages),
        ShellCommand::Quit { force } => {
            print_messages(&api.close(force)?.messages);
            return Ok(Flow::Exit);
        }
    }
    Ok(Flow::Continue)
}

pub(super) fn run_shell<T: Toolkit + 'static>(mut api: ScribeApi<T>, pdf: &Path) -> Result<()> {
    print_messages(&api.open(pdf)?.messages);
    if let Some((file, dir)) = api.display_title() {
        println!("{} {}", file.bold(), format!("({})", dir).dimmed());
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        print_thumbnail_events(&api.poll_thumbnails());
        print!("{}", PROMPT);
        io::stdout().flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            println!();
            if api.has_unsaved_changes() {
                print_messages(&[CmdMessage::warning(
                    "End of input with unsaved annotations",
                )]);
            }
            print_messages(&api.close(true)?.messages);
            return Ok(());
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                print_messages(&[CmdMessage::error(message)]);
                continue;
            }
        };

        match execute(&mut api, command) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => return Ok(()),
            Err(ScribeError::UnsavedChanges) => print_messages(&[CmdMessage::warning(
                "There are unsaved annotations. Save them first, or use 'quit!' to discard them.",
            )]),
            Err(e) => print_messages(&[CmdMessage::error(e.to_string())]),
        }
    }
}
