//! # Session
//!
//! One open annotation workflow over one PDF document.
//!
//! ## Ownership
//!
//! `open` copies the user's file into a private staging directory and every
//! later operation works on that copy. The original is never touched, and a
//! save without edits is a plain copy of the private file, byte-identical to
//! the input.
//!
//! ## Annotating a page
//!
//! [`Session::annotate`] is a blocking state machine:
//!
//! 1. export the page to SVG, once (`page-{n}.source.svg`)
//! 2. compose the annotation document around it, once (`page-{n}.annotation.svg`)
//! 3. record the annotation's modification time and run the editor on it
//! 4. compare modification times; a change marks the page annotated and drops
//!    its cached thumbnail
//!
//! The editor is never asked whether the user saved. Closing without saving
//! and saving without any visible change are indistinguishable, and both leave
//! the page unannotated.
//!
//! ## Concurrency
//!
//! `Session` is `Sync` and meant to be shared behind an `Arc`: the thumbnail
//! loader works through the pages on a background thread while the
//! foreground flow annotates. Only the annotated-page set is shared mutable
//! state and it is guarded by [`AnnotationTracker`]. Callers must not run two
//! operations on the *same* page at once.
//!
//! Page indices are zero-based. Passing an index outside
//! `0..page_count()` is a caller bug and panics.

use crate::composer::{compose_annotation, strip_background, PageGeometry};
use crate::config::ScribeConfig;
use crate::error::{Result, SaveStage, ScribeError};
use crate::staging::{Artifact, StagingDir};
use crate::tools::Toolkit;
use crate::tracker::AnnotationTracker;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Settings applied when opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub thumbnail_size: u32,
    pub staging_root: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ScribeConfig::default())
    }
}

impl From<&ScribeConfig> for SessionOptions {
    fn from(config: &ScribeConfig) -> Self {
        Self {
            thumbnail_size: config.thumbnail_size,
            staging_root: config.staging_root.clone(),
        }
    }
}

pub struct Session<T: Toolkit> {
    toolkit: Arc<T>,
    staging: StagingDir,
    source: PathBuf,
    page_count: usize,
    thumbnail_size: u32,
    annotated: AnnotationTracker,
    closed: AtomicBool,
}

/// Formats zero-based page indices as the one-based, comma-joined list the
/// overlay step expects.
pub fn overlay_page_list(pages: &[usize]) -> String {
    pages
        .iter()
        .map(|p| (p + 1).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| ScribeError::staging(path, e))
}

impl<T: Toolkit> Session<T> {
    /// Opens `path` and stages a private copy of it.
    pub fn open(toolkit: Arc<T>, path: &Path, options: &SessionOptions) -> Result<Self> {
        let page_count = toolkit.page_count(path).map_err(|e| match e {
            e @ ScribeError::DocumentRead { .. } => e,
            other => ScribeError::DocumentRead {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        let staging = StagingDir::create(options.staging_root.as_deref())?;
        let source = staging.import(path)?;

        info!(
            "opened {} ({} pages) in {}",
            path.display(),
            page_count,
            staging.root().display()
        );

        Ok(Self {
            toolkit,
            staging,
            source,
            page_count,
            thumbnail_size: options.thumbnail_size,
            annotated: AnnotationTracker::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// The session's private copy of the document.
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.root()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_page(&self, page: usize) {
        assert!(
            page < self.page_count,
            "invalid page number {} (document has {} pages)",
            page,
            self.page_count
        );
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ScribeError::Closed);
        }
        Ok(())
    }

    /// Path to the page's thumbnail, rendering it on first request.
    pub fn thumbnail(&self, page: usize) -> Result<PathBuf> {
        self.check_page(page);
        self.ensure_open()?;

        let thumb = self.staging.artifact(page, Artifact::Thumbnail);
        if thumb.exists() {
            return Ok(thumb);
        }

        let tmp = self.staging.temp_path(&thumb);
        self.toolkit
            .render_thumbnail(&self.source, page + 1, self.thumbnail_size, &tmp)
            .map_err(|e| {
                self.staging.remove(&tmp);
                ScribeError::Thumbnail {
                    page,
                    source: Box::new(e),
                }
            })?;
        self.staging.promote(&tmp, &thumb)?;

        debug!("rendered thumbnail for page {}", page);
        Ok(thumb)
    }

    /// The thumbnail path if it has already been rendered.
    pub fn cached_thumbnail(&self, page: usize) -> Option<PathBuf> {
        self.check_page(page);
        let thumb = self.staging.artifact(page, Artifact::Thumbnail);
        thumb.exists().then_some(thumb)
    }

    /// Runs the editor on the page and blocks until it exits.
    ///
    /// Returns true if the user changed the page this time around.
    pub fn annotate(&self, page: usize) -> Result<bool> {
        self.check_page(page);
        self.ensure_open()?;

        let source = self.ensure_source(page)?;
        let annotation = self.ensure_annotation(page, &source)?;

        let before = modified_time(&annotation)?;
        info!("editing page {} ({})", page, annotation.display());
        self.toolkit
            .edit(&annotation)
            .map_err(|e| ScribeError::Editor {
                path: annotation.clone(),
                source: Box::new(e),
            })?;
        let after = modified_time(&annotation)?;

        let modified = before != after;
        if modified {
            self.staging
                .remove(&self.staging.artifact(page, Artifact::Thumbnail));
            self.annotated.mark(page);
            info!("page {} annotated", page);
        } else {
            debug!("page {} left unchanged", page);
        }
        Ok(modified)
    }

    fn ensure_source(&self, page: usize) -> Result<PathBuf> {
        let source = self.staging.artifact(page, Artifact::SourceSvg);
        if source.exists() {
            return Ok(source);
        }

        let tmp = self.staging.temp_path(&source);
        self.toolkit
            .export_page_svg(&self.source, page + 1, &tmp)
            .map_err(|e| {
                self.staging.remove(&tmp);
                ScribeError::Export {
                    page,
                    source: Box::new(e),
                }
            })?;
        self.staging.promote(&tmp, &source)?;

        debug!("exported page {} to {}", page, source.display());
        Ok(source)
    }

    fn ensure_annotation(&self, page: usize, source: &Path) -> Result<PathBuf> {
        let annotation = self.staging.artifact(page, Artifact::AnnotationSvg);
        if annotation.exists() {
            return Ok(annotation);
        }

        let doc = fs::read_to_string(source).map_err(|e| ScribeError::staging(source, e))?;
        let geometry = PageGeometry::from_svg(&doc).map_err(|reason| ScribeError::Geometry {
            path: source.to_path_buf(),
            reason,
        })?;

        let composed = compose_annotation(&geometry, &source.to_string_lossy());
        self.staging
            .write_atomic(&annotation, composed.as_bytes())?;

        debug!("composed annotation document for page {}", page);
        Ok(annotation)
    }

    /// Discards the page's annotation. Clearing an unannotated page is a no-op.
    pub fn clear(&self, page: usize) -> Result<()> {
        self.check_page(page);
        self.ensure_open()?;

        self.staging
            .remove(&self.staging.artifact(page, Artifact::AnnotationSvg));
        self.staging
            .remove(&self.staging.artifact(page, Artifact::Thumbnail));
        if self.annotated.unmark(page) {
            info!("cleared annotation on page {}", page);
        }
        Ok(())
    }

    pub fn is_annotated(&self, page: usize) -> bool {
        self.check_page(page);
        self.annotated.contains(page)
    }

    pub fn has_annotations(&self) -> bool {
        !self.annotated.is_empty()
    }

    /// Annotated pages, ascending.
    pub fn annotated_pages(&self) -> Vec<usize> {
        self.annotated.snapshot()
    }

    /// Writes the annotated document to `dest`.
    ///
    /// `dest` is only written after every intermediate step has succeeded.
    pub fn save(&self, dest: &Path) -> Result<()> {
        self.ensure_open()?;

        let pages = self.annotated.snapshot();
        if pages.is_empty() {
            fs::copy(&self.source, dest).map_err(|e| ScribeError::Output {
                path: dest.to_path_buf(),
                source: e,
            })?;
            info!("saved unmodified copy to {}", dest.display());
            return Ok(());
        }

        let mut page_pdfs = Vec::with_capacity(pages.len());
        for &page in &pages {
            page_pdfs.push(self.convert_annotation(page)?);
        }

        let overlay = self.staging.overlay_pdf();
        self.toolkit
            .merge_pages(&page_pdfs, &overlay)
            .map_err(|e| ScribeError::save(SaveStage::Merge, e))?;

        let composed = self.staging.composed_pdf();
        let page_list = overlay_page_list(&pages);
        self.toolkit
            .overlay(&self.source, &overlay, &page_list, &composed)
            .map_err(|e| ScribeError::save(SaveStage::Overlay, e))?;

        fs::copy(&composed, dest).map_err(|e| ScribeError::Output {
            path: dest.to_path_buf(),
            source: e,
        })?;

        info!(
            "saved {} with annotations on pages {}",
            dest.display(),
            page_list
        );
        Ok(())
    }

    /// Strips the background from the page's annotation and converts it to a
    /// single-page PDF.
    fn convert_annotation(&self, page: usize) -> Result<PathBuf> {
        let annotation = self.staging.artifact(page, Artifact::AnnotationSvg);
        let doc = fs::read_to_string(&annotation).map_err(|e| {
            ScribeError::save(
                SaveStage::ReadAnnotation,
                ScribeError::staging(&annotation, e),
            )
        })?;

        let cleaned = self.staging.artifact(page, Artifact::CleanedSvg);
        fs::write(&cleaned, strip_background(&doc)).map_err(|e| {
            ScribeError::save(SaveStage::WriteCleaned, ScribeError::staging(&cleaned, e))
        })?;

        let pdf = self.staging.artifact(page, Artifact::AnnotationPdf);
        self.toolkit
            .export_pdf(&cleaned, &pdf)
            .map_err(|e| ScribeError::save(SaveStage::ConvertPage, e))?;
        Ok(pdf)
    }

    /// Deletes the staging directory. Later operations fail with
    /// [`ScribeError::Closed`]. Cleanup problems are logged, not returned.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.annotated.clear();
        self.staging.close();
        info!("closed session");
    }
}
