use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pagescribe", bin_name = "pagescribe", version)]
#[command(about = "Draw on PDF pages with an external vector editor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (debug logging to stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the number of pages in a PDF
    Pages {
        /// The PDF document
        pdf: PathBuf,
    },

    /// Render a thumbnail of every page into a directory
    Thumbs {
        /// The PDF document
        pdf: PathBuf,

        /// Directory receiving page-N.png files
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Annotate pages in the editor, then save the result
    #[command(alias = "a")]
    Annotate {
        /// The PDF document
        pdf: PathBuf,

        /// Pages to annotate, 1-based, in the order given
        #[arg(short, long = "page", required = true, num_args = 1..)]
        pages: Vec<usize>,

        /// Output file (defaults to <name>-annotated.pdf next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Open a PDF in an interactive session
    Shell {
        /// The PDF document
        pdf: PathBuf,
    },
}
