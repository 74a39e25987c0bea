//! # Staging Directory Manager
//!
//! Every session owns one private scratch directory. Nothing else reads it and
//! it does not outlive the session: [`StagingDir::close`] removes it, and
//! dropping the `StagingDir` does the same through [`tempfile::TempDir`].
//!
//! ## Layout
//!
//! ```text
//! pagescribe-XXXXXX/
//! ├── source.pdf                 # private copy of the user's document
//! ├── page-{n}.source.svg        # vector export of page n (immutable once written)
//! ├── page-{n}.annotation.svg    # locked background + user drawing (user-editable)
//! ├── page-{n}.thumb.png         # preview raster, deleted when the annotation changes
//! ├── page-{n}.cleaned.svg       # annotation without its background (save only)
//! ├── page-{n}.annotation.pdf    # cleaned annotation as a one-page PDF (save only)
//! ├── overlay.pdf                # all annotation PDFs merged (save only)
//! └── composed.pdf               # source.pdf with the overlay applied (save only)
//! ```
//!
//! `n` is the zero-based page index.
//!
//! Artifacts are written under a unique temporary sibling name and renamed into
//! place, so a reader never observes a partially written file.

use crate::error::{Result, ScribeError};
use log::{debug, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;
use uuid::Uuid;

const DIR_PREFIX: &str = "pagescribe-";
const SOURCE_PDF: &str = "source.pdf";
const OVERLAY_PDF: &str = "overlay.pdf";
const COMPOSED_PDF: &str = "composed.pdf";

/// Per-page staged artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    SourceSvg,
    AnnotationSvg,
    Thumbnail,
    CleanedSvg,
    AnnotationPdf,
}

impl Artifact {
    fn suffix(self) -> &'static str {
        match self {
            Artifact::SourceSvg => "source.svg",
            Artifact::AnnotationSvg => "annotation.svg",
            Artifact::Thumbnail => "thumb.png",
            Artifact::CleanedSvg => "cleaned.svg",
            Artifact::AnnotationPdf => "annotation.pdf",
        }
    }
}

pub struct StagingDir {
    root: PathBuf,
    dir: Mutex<Option<TempDir>>,
}

impl StagingDir {
    /// Creates a fresh staging directory under `parent`, or under the system
    /// temp directory when `parent` is `None`.
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);

        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| ScribeError::staging(parent, e))?;
                builder
                    .tempdir_in(parent)
                    .map_err(|e| ScribeError::staging(parent, e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| ScribeError::staging(std::env::temp_dir(), e))?,
        };

        let root = dir.path().to_path_buf();
        debug!("created staging directory {}", root.display());

        Ok(Self {
            root,
            dir: Mutex::new(Some(dir)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_pdf(&self) -> PathBuf {
        self.root.join(SOURCE_PDF)
    }

    pub fn overlay_pdf(&self) -> PathBuf {
        self.root.join(OVERLAY_PDF)
    }

    pub fn composed_pdf(&self) -> PathBuf {
        self.root.join(COMPOSED_PDF)
    }

    pub fn artifact(&self, page: usize, kind: Artifact) -> PathBuf {
        self.root.join(format!("page-{}.{}", page, kind.suffix()))
    }

    /// A unique, hidden sibling of `target` for write-then-rename. The
    /// extension is kept last so tools that infer formats from names still
    /// work.
    pub fn temp_path(&self, target: &Path) -> PathBuf {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match target.extension() {
            Some(ext) => format!(".{}.{}.tmp.{}", stem, Uuid::new_v4(), ext.to_string_lossy()),
            None => format!(".{}.{}.tmp", stem, Uuid::new_v4()),
        };
        target.with_file_name(name)
    }

    /// Copies `src` byte-for-byte into the staging directory as the session's
    /// private document.
    pub fn import(&self, src: &Path) -> Result<PathBuf> {
        let target = self.source_pdf();
        let tmp = self.temp_path(&target);

        let mut reader = File::open(src).map_err(|e| ScribeError::staging(src, e))?;
        let mut writer = File::create(&tmp).map_err(|e| ScribeError::staging(&tmp, e))?;
        if let Err(e) = io::copy(&mut reader, &mut writer) {
            drop(writer);
            let _ = fs::remove_file(&tmp);
            return Err(ScribeError::staging(&tmp, e));
        }
        drop(writer);

        self.promote(&tmp, &target)?;
        Ok(target)
    }

    /// Writes `contents` to `target` atomically.
    pub fn write_atomic(&self, target: &Path, contents: &[u8]) -> Result<()> {
        let tmp = self.temp_path(target);
        fs::write(&tmp, contents).map_err(|e| ScribeError::staging(&tmp, e))?;
        self.promote(&tmp, target)
    }

    /// Renames a finished temporary file into its final place.
    pub fn promote(&self, tmp: &Path, target: &Path) -> Result<()> {
        fs::rename(tmp, target).map_err(|e| {
            let _ = fs::remove_file(tmp);
            ScribeError::staging(target, e)
        })
    }

    /// Best-effort removal. Returns true if a file was deleted.
    pub fn remove(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("failed to remove {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Recursively deletes the directory. Failures are logged, never returned.
    /// Returns false if the directory had already been closed.
    pub fn close(&self) -> bool {
        let dir = self
            .dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match dir {
            Some(dir) => {
                if let Err(e) = dir.close() {
                    warn!(
                        "failed to clean up staging directory {}: {}",
                        self.root.display(),
                        e
                    );
                } else {
                    debug!("removed staging directory {}", self.root.display());
                }
                true
            }
            None => false,
        }
    }
}
