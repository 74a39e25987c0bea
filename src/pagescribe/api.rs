//! # API Facade
//!
//! The single entry point for front-ends. A GUI, the bundled terminal client,
//! or anything else drives pagescribe through [`ScribeApi`] and renders what
//! it returns.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Owns the current document**: at most one [`Session`] is open, together
//!   with its background [`ThumbnailLoader`]
//! - **Normalizes inputs**: page indices typed by a user are validated here and
//!   turned into [`ScribeError::PageOutOfRange`]; the session itself treats a
//!   bad index as a programming error
//! - **Tracks unsaved work**: closing or replacing a document with annotations
//!   made since the last save needs `force`
//! - **Returns structured types**: [`CmdResult`] with leveled messages, never
//!   strings printed to a terminal
//!
//! ## Generic Over Toolkit
//!
//! `ScribeApi<T: Toolkit>` works with any [`Toolkit`]:
//! - Production: `ScribeApi<ProcessToolkit>`
//! - Testing: `ScribeApi<StubToolkit>`

use crate::error::{Result, ScribeError};
use crate::loader::{spawn_thumbnail_loader, CancellationToken, ThumbnailEvent, ThumbnailLoader};
use crate::session::{Session, SessionOptions};
use crate::tools::Toolkit;
use directories::BaseDirs;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub messages: Vec<CmdMessage>,
    /// Whether the operation changed the document's annotations.
    pub changed: bool,
    /// The file written by a save.
    pub saved_to: Option<PathBuf>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_message(mut self, message: CmdMessage) -> Self {
        self.messages.push(message);
        self
    }
}

/// Annotation and thumbnail state of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStatus {
    pub page: usize,
    pub annotated: bool,
    pub thumbnail: Option<PathBuf>,
}

struct OpenDocument<T: Toolkit> {
    origin: PathBuf,
    session: Arc<Session<T>>,
    loader: Option<ThumbnailLoader>,
    unsaved: bool,
}

pub struct ScribeApi<T: Toolkit> {
    toolkit: Arc<T>,
    options: SessionOptions,
    background_thumbnails: bool,
    current: Option<OpenDocument<T>>,
}

/// Shortens a path inside the user's home directory to `~/...`.
pub fn shrink_home(path: &Path) -> String {
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    shrink_home_with(path, home.as_deref())
}

fn shrink_home_with(path: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| path.strip_prefix(home).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

/// Appends `.pdf` unless the path already ends with it (any case).
pub fn with_pdf_extension(path: &Path) -> PathBuf {
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".pdf");
    PathBuf::from(name)
}

impl<T: Toolkit + 'static> ScribeApi<T> {
    pub fn new(toolkit: Arc<T>, options: SessionOptions) -> Self {
        Self {
            toolkit,
            options,
            background_thumbnails: true,
            current: None,
        }
    }

    /// Whether `open` starts loading every thumbnail in the background.
    /// On by default.
    pub fn with_background_thumbnails(mut self, enabled: bool) -> Self {
        self.background_thumbnails = enabled;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn document(&self) -> Result<&OpenDocument<T>> {
        self.current.as_ref().ok_or(ScribeError::NoDocument)
    }

    fn document_mut(&mut self) -> Result<&mut OpenDocument<T>> {
        self.current.as_mut().ok_or(ScribeError::NoDocument)
    }

    fn page_index(&self, page: usize) -> Result<usize> {
        let count = self.document()?.session.page_count();
        if page >= count {
            return Err(ScribeError::PageOutOfRange {
                page: page + 1,
                count,
            });
        }
        Ok(page)
    }

    /// Opens `path`, replacing the current document, and starts loading
    /// thumbnails in the background.
    ///
    /// The current document is only closed once `path` has opened, so a
    /// failed open leaves it untouched.
    pub fn open(&mut self, path: &Path) -> Result<CmdResult> {
        if self.has_unsaved_changes() {
            return Err(ScribeError::UnsavedChanges);
        }

        let session = Arc::new(Session::open(
            Arc::clone(&self.toolkit),
            path,
            &self.options,
        )?);
        self.close(false)?;
        let loader = self
            .background_thumbnails
            .then(|| spawn_thumbnail_loader(Arc::clone(&session), CancellationToken::new()));
        let pages = session.page_count();

        self.current = Some(OpenDocument {
            origin: path.to_path_buf(),
            session,
            loader,
            unsaved: false,
        });

        Ok(CmdResult::default().with_message(CmdMessage::info(format!(
            "Opened {} ({} pages)",
            shrink_home(path),
            pages
        ))))
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn page_count(&self) -> Result<usize> {
        Ok(self.document()?.session.page_count())
    }

    /// The path the current document was opened from.
    pub fn document_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|doc| doc.origin.as_path())
    }

    /// File name and shortened parent directory, for window titles.
    pub fn display_title(&self) -> Option<(String, String)> {
        let origin = self.document_path()?;
        let file = origin
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = origin
            .parent()
            .map(shrink_home)
            .unwrap_or_default();
        Some((file, dir))
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.current.as_ref().map_or(false, |doc| doc.unsaved)
    }

    /// Renders (or returns the cached) thumbnail of `page` on the calling
    /// thread.
    pub fn thumbnail(&self, page: usize) -> Result<PathBuf> {
        let page = self.page_index(page)?;
        self.document()?.session.thumbnail(page)
    }

    /// Opens the editor on `page` and blocks until it exits.
    pub fn annotate(&mut self, page: usize) -> Result<CmdResult> {
        let page = self.page_index(page)?;
        let doc = self.document_mut()?;

        let changed = doc.session.annotate(page)?;
        let mut result = CmdResult {
            changed,
            ..CmdResult::default()
        };
        if changed {
            doc.unsaved = true;
            result.add_message(CmdMessage::success(format!("Page {} annotated", page + 1)));
        } else {
            result.add_message(CmdMessage::info(format!(
                "Page {} unchanged",
                page + 1
            )));
        }
        Ok(result)
    }

    pub fn clear(&mut self, page: usize) -> Result<CmdResult> {
        let page = self.page_index(page)?;
        let doc = self.document_mut()?;

        if !doc.session.is_annotated(page) {
            doc.session.clear(page)?;
            return Ok(CmdResult::default().with_message(CmdMessage::info(format!(
                "Page {} has no annotations",
                page + 1
            ))));
        }

        doc.session.clear(page)?;
        doc.unsaved = true;
        Ok(CmdResult {
            changed: true,
            ..CmdResult::default()
        }
        .with_message(CmdMessage::success(format!(
            "Cleared annotations on page {}",
            page + 1
        ))))
    }

    pub fn is_annotated(&self, page: usize) -> Result<bool> {
        let page = self.page_index(page)?;
        Ok(self.document()?.session.is_annotated(page))
    }

    pub fn has_annotations(&self) -> bool {
        self.current
            .as_ref()
            .map_or(false, |doc| doc.session.has_annotations())
    }

    /// Saves to `path`, adding a `.pdf` extension if it is missing.
    pub fn save(&mut self, path: &Path) -> Result<CmdResult> {
        let dest = with_pdf_extension(path);
        let doc = self.document_mut()?;

        doc.session.save(&dest)?;
        doc.unsaved = false;

        let annotated = doc.session.annotated_pages().len();
        let mut result = CmdResult {
            saved_to: Some(dest.clone()),
            ..CmdResult::default()
        };
        let summary = if annotated == 0 {
            format!("Saved unchanged copy to {}", shrink_home(&dest))
        } else {
            format!(
                "Saved {} annotated page(s) to {}",
                annotated,
                shrink_home(&dest)
            )
        };
        result.add_message(CmdMessage::success(summary));
        Ok(result)
    }

    /// Closes the current document. Refuses with
    /// [`ScribeError::UnsavedChanges`] if there are unsaved annotations and
    /// `force` is false.
    pub fn close(&mut self, force: bool) -> Result<CmdResult> {
        let Some(doc) = self.current.as_ref() else {
            return Ok(CmdResult::default());
        };
        if doc.unsaved && !force {
            return Err(ScribeError::UnsavedChanges);
        }

        let mut result = CmdResult::default();
        if let Some(mut doc) = self.current.take() {
            if let Some(loader) = doc.loader.take() {
                loader.cancel_and_join();
            }
            doc.session.close();
            info!("closed {}", doc.origin.display());
            if doc.unsaved {
                result.add_message(CmdMessage::warning("Discarded unsaved annotations"));
            }
            result.add_message(CmdMessage::info(format!(
                "Closed {}",
                shrink_home(&doc.origin)
            )));
        }
        Ok(result)
    }

    /// Thumbnail events produced since the last poll. Never blocks.
    pub fn poll_thumbnails(&self) -> Vec<ThumbnailEvent> {
        self.current
            .as_ref()
            .and_then(|doc| doc.loader.as_ref())
            .map(|loader| loader.drain())
            .unwrap_or_default()
    }

    /// Blocks until background thumbnail loading has finished and returns
    /// every event not yet polled.
    pub fn wait_for_thumbnails(&mut self) -> Result<Vec<ThumbnailEvent>> {
        let doc = self.document_mut()?;
        let mut events = Vec::new();
        if let Some(loader) = doc.loader.take() {
            while let Some(event) = loader.next_event() {
                events.push(event);
            }
            loader.join();
        }
        Ok(events)
    }

    pub fn status(&self) -> Result<Vec<PageStatus>> {
        let session = &self.document()?.session;
        Ok((0..session.page_count())
            .map(|page| PageStatus {
                page,
                annotated: session.is_annotated(page),
                thumbnail: session.cached_thumbnail(page),
            })
            .collect())
    }
}

impl<T: Toolkit> Drop for ScribeApi<T> {
    fn drop(&mut self) {
        if let Some(mut doc) = self.current.take() {
            if let Some(loader) = doc.loader.take() {
                loader.cancel_and_join();
            }
            doc.session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CallKind, EditBehavior, StubToolkit, TestEnv, INPUT_BYTES};
    use std::fs;

    fn api(env: &TestEnv, pages: usize) -> (Arc<StubToolkit>, ScribeApi<StubToolkit>) {
        let toolkit = Arc::new(StubToolkit::new(pages));
        let options = SessionOptions {
            staging_root: Some(env.staging_root()),
            ..SessionOptions::default()
        };
        (Arc::clone(&toolkit), ScribeApi::new(toolkit, options))
    }

    #[test]
    fn shrink_home_replaces_prefix() {
        let home = Path::new("/home/ada");
        assert_eq!(
            shrink_home_with(Path::new("/home/ada/docs/a.pdf"), Some(home)),
            "~/docs/a.pdf"
        );
        assert_eq!(shrink_home_with(home, Some(home)), "~");
        assert_eq!(
            shrink_home_with(Path::new("/srv/a.pdf"), Some(home)),
            "/srv/a.pdf"
        );
        assert_eq!(shrink_home_with(Path::new("/srv/a.pdf"), None), "/srv/a.pdf");
    }

    #[test]
    fn pdf_extension_is_appended_when_missing() {
        assert_eq!(with_pdf_extension(Path::new("out")), PathBuf::from("out.pdf"));
        assert_eq!(
            with_pdf_extension(Path::new("out.PDF")),
            PathBuf::from("out.PDF")
        );
        assert_eq!(
            with_pdf_extension(Path::new("notes.txt")),
            PathBuf::from("notes.txt.pdf")
        );
    }

    #[test]
    fn operations_require_open_document() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 2);

        assert!(matches!(api.annotate(0), Err(ScribeError::NoDocument)));
        assert!(matches!(api.page_count(), Err(ScribeError::NoDocument)));
        assert!(api.poll_thumbnails().is_empty());
        assert!(api.close(false).unwrap().messages.is_empty());
    }

    #[test]
    fn out_of_range_page_is_a_recoverable_error() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 2);
        api.open(&env.input).unwrap();

        let err = api.annotate(2).unwrap_err();
        assert!(matches!(
            err,
            ScribeError::PageOutOfRange { page: 3, count: 2 }
        ));
        assert!(api.clear(9).is_err());
    }

    #[test]
    fn open_loads_thumbnails_in_background() {
        let env = TestEnv::new();
        let (toolkit, mut api) = api(&env, 3);
        api.open(&env.input).unwrap();

        let events = api.wait_for_thumbnails().unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(toolkit.count(CallKind::Thumbnail), 3);
        let status = api.status().unwrap();
        assert!(status.iter().all(|s| s.thumbnail.is_some() && !s.annotated));
    }

    #[test]
    fn foreground_mode_renders_on_demand() {
        let env = TestEnv::new();
        let toolkit = Arc::new(StubToolkit::new(3));
        let options = SessionOptions {
            staging_root: Some(env.staging_root()),
            ..SessionOptions::default()
        };
        let mut api =
            ScribeApi::new(Arc::clone(&toolkit), options).with_background_thumbnails(false);
        api.open(&env.input).unwrap();

        assert!(api.wait_for_thumbnails().unwrap().is_empty());
        assert_eq!(toolkit.count(CallKind::Thumbnail), 0);

        let first = api.thumbnail(1).unwrap();
        let again = api.thumbnail(1).unwrap();
        assert_eq!(first, again);
        assert_eq!(toolkit.count(CallKind::Thumbnail), 1);
    }

    #[test]
    fn replacing_dirty_document_is_refused() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 2);
        api.open(&env.input).unwrap();
        api.annotate(0).unwrap();

        assert!(matches!(
            api.open(&env.input),
            Err(ScribeError::UnsavedChanges)
        ));
        assert!(api.is_annotated(0).unwrap());
    }

    #[test]
    fn failed_open_keeps_current_document() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 2);
        api.open(&env.input).unwrap();

        let err = api.open(&env.root.join("typo.pdf")).unwrap_err();

        match err {
            ScribeError::Staging { path, .. } => assert_eq!(path, env.root.join("typo.pdf")),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(api.is_open());
        assert_eq!(api.document_path(), Some(env.input.as_path()));
        assert!(api.annotate(1).unwrap().changed);
        // only the surviving session's staging directory is left
        assert_eq!(fs::read_dir(env.staging_root()).unwrap().count(), 1);
    }

    #[test]
    fn unsaved_annotations_block_close() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 2);
        api.open(&env.input).unwrap();

        assert!(api.annotate(1).unwrap().changed);
        assert!(api.has_unsaved_changes());
        assert!(matches!(api.close(false), Err(ScribeError::UnsavedChanges)));
        assert!(api.is_open());

        let out = api.save(&env.root.join("result")).unwrap();
        assert_eq!(out.saved_to, Some(env.root.join("result.pdf")));
        assert!(!api.has_unsaved_changes());
        api.close(false).unwrap();
        assert!(!api.is_open());
    }

    #[test]
    fn forced_close_discards_annotations() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 1);
        api.open(&env.input).unwrap();
        api.annotate(0).unwrap();

        let result = api.close(true).unwrap();

        assert!(result
            .messages
            .iter()
            .any(|m| m.level == MessageLevel::Warning));
        assert!(!api.is_open());
    }

    #[test]
    fn unchanged_edit_does_not_dirty_document() {
        let env = TestEnv::new();
        let (toolkit, mut api) = api(&env, 1);
        toolkit.set_edit_behavior(EditBehavior::Untouched);
        api.open(&env.input).unwrap();

        let result = api.annotate(0).unwrap();

        assert!(!result.changed);
        assert!(!api.has_unsaved_changes());
        assert!(!api.is_annotated(0).unwrap());
    }

    #[test]
    fn clearing_annotated_page_dirties_document() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 2);
        api.open(&env.input).unwrap();
        api.annotate(0).unwrap();
        api.save(&env.root.join("first.pdf")).unwrap();

        let noop = api.clear(1).unwrap();
        assert!(!noop.changed);
        assert!(!api.has_unsaved_changes());

        let cleared = api.clear(0).unwrap();
        assert!(cleared.changed);
        assert!(api.has_unsaved_changes());
        assert!(!api.has_annotations());

        api.save(&env.root.join("second.pdf")).unwrap();
        assert_eq!(fs::read(env.root.join("second.pdf")).unwrap(), INPUT_BYTES);
    }

    #[test]
    fn reopening_replaces_clean_document() {
        let env = TestEnv::new();
        let (_toolkit, mut api) = api(&env, 2);
        api.open(&env.input).unwrap();
        let first_dir = env.staging_root();

        api.open(&env.input).unwrap();

        assert!(api.is_open());
        // exactly one staging directory remains
        assert_eq!(fs::read_dir(first_dir).unwrap().count(), 1);
        let (file, _dir) = api.display_title().unwrap();
        assert_eq!(file, "input.pdf");
    }
}
