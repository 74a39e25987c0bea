use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The step of the save pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    ReadAnnotation,
    WriteCleaned,
    ConvertPage,
    Merge,
    Overlay,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SaveStage::ReadAnnotation => "read back annotation",
            SaveStage::WriteCleaned => "write cleaned annotation",
            SaveStage::ConvertPage => "convert annotation to PDF",
            SaveStage::Merge => "merge annotated pages",
            SaveStage::Overlay => "overlay annotated pages",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Cannot read document '{path}': {reason}")]
    DocumentRead { path: PathBuf, reason: String },

    #[error("Staging error at '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An external program exited with failure. The message is its stderr.
    #[error("{stderr}")]
    ExternalTool { tool: String, stderr: String },

    #[error("Failed to launch '{tool}': {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to export page {page} to SVG: {source}")]
    Export {
        page: usize,
        #[source]
        source: Box<ScribeError>,
    },

    #[error("Failed to generate thumbnail for page {page}: {source}")]
    Thumbnail {
        page: usize,
        #[source]
        source: Box<ScribeError>,
    },

    #[error("Editor exited with error while editing '{path}': {source}")]
    Editor {
        path: PathBuf,
        #[source]
        source: Box<ScribeError>,
    },

    #[error("Failed to {stage}: {source}")]
    Save {
        stage: SaveStage,
        #[source]
        source: Box<ScribeError>,
    },

    #[error("Cannot parse page geometry in '{path}': {reason}")]
    Geometry { path: PathBuf, reason: String },

    #[error("Cannot write '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Session is closed")]
    Closed,

    /// `page` is the 1-based number a user would type.
    #[error("Page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("There are unsaved annotations")]
    UnsavedChanges,

    #[error("No document is open")]
    NoDocument,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl ScribeError {
    pub(crate) fn staging(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScribeError::Staging {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn save(stage: SaveStage, source: ScribeError) -> Self {
        ScribeError::Save {
            stage,
            source: Box::new(source),
        }
    }

    /// The diagnostic text of the external tool behind this error, if any.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            ScribeError::ExternalTool { stderr, .. } => Some(stderr),
            ScribeError::Export { source, .. }
            | ScribeError::Thumbnail { source, .. }
            | ScribeError::Editor { source, .. }
            | ScribeError::Save { source, .. } => source.tool_output(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
