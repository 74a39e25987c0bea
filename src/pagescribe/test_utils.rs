use crate::error::{Result, ScribeError};
use crate::tools::Toolkit;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    PageCount,
    Thumbnail,
    ExportSvg,
    Edit,
    ExportPdf,
    Merge,
    Overlay,
}

/// One recorded toolkit invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    PageCount(PathBuf),
    Thumbnail { page: usize, size: u32 },
    ExportSvg { page: usize },
    Edit(PathBuf),
    ExportPdf(PathBuf),
    Merge(Vec<PathBuf>),
    Overlay { pages: String },
}

impl ToolCall {
    pub fn kind(&self) -> CallKind {
        match self {
            ToolCall::PageCount(_) => CallKind::PageCount,
            ToolCall::Thumbnail { .. } => CallKind::Thumbnail,
            ToolCall::ExportSvg { .. } => CallKind::ExportSvg,
            ToolCall::Edit(_) => CallKind::Edit,
            ToolCall::ExportPdf(_) => CallKind::ExportPdf,
            ToolCall::Merge(_) => CallKind::Merge,
            ToolCall::Overlay { .. } => CallKind::Overlay,
        }
    }
}

/// What the simulated editor does to the annotation document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditBehavior {
    /// Adds a stroke and saves, moving the modification time forward.
    Draw,
    /// Closes without saving.
    Untouched,
    /// Rewrites the file but leaves the modification time as it was.
    RewriteKeepingMtime,
}

pub const STROKE: &str = r#"<path id="user-stroke" d="M 10,10 L 90,90" />"#;

/// Holds thumbnail renders until the test releases them.
///
/// `started` yields the (one-based) page of each render as it begins; the
/// render then blocks until [`RenderGate::release`] is called. Dropping the
/// gate lets every pending and later render through.
pub struct RenderGate {
    pub started: Receiver<usize>,
    release: Sender<()>,
}

impl RenderGate {
    /// Lets one blocked render finish.
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

/// Toolkit double that records every call and fabricates tool outputs.
pub struct StubToolkit {
    page_count: usize,
    calls: Mutex<Vec<ToolCall>>,
    edit: Mutex<EditBehavior>,
    failures: Mutex<HashMap<CallKind, String>>,
    gate: Mutex<Option<(Sender<usize>, Receiver<()>)>>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StubToolkit {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            calls: Mutex::new(Vec::new()),
            edit: Mutex::new(EditBehavior::Draw),
            failures: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
        }
    }

    /// Makes every later thumbnail render wait on the returned gate.
    pub fn gate_thumbnails(&self) -> RenderGate {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *guard(&self.gate) = Some((started_tx, release_rx));
        RenderGate {
            started: started_rx,
            release: release_tx,
        }
    }

    pub fn set_edit_behavior(&self, behavior: EditBehavior) {
        *guard(&self.edit) = behavior;
    }

    /// Makes every call of `kind` fail with `stderr`.
    pub fn fail_on(&self, kind: CallKind, stderr: &str) {
        guard(&self.failures).insert(kind, stderr.to_string());
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        guard(&self.calls).clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        guard(&self.calls)
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    fn record(&self, call: ToolCall) -> Result<()> {
        let kind = call.kind();
        guard(&self.calls).push(call);
        match guard(&self.failures).get(&kind) {
            Some(stderr) => Err(ScribeError::ExternalTool {
                tool: "stub".to_string(),
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Toolkit for StubToolkit {
    fn page_count(&self, pdf: &Path) -> Result<usize> {
        self.record(ToolCall::PageCount(pdf.to_path_buf()))?;
        Ok(self.page_count)
    }

    fn render_thumbnail(&self, _pdf: &Path, page: usize, size: u32, out: &Path) -> Result<()> {
        self.record(ToolCall::Thumbnail { page, size })?;
        if let Some((started, release)) = guard(&self.gate).as_ref() {
            let _ = started.send(page);
            let _ = release.recv();
        }
        fs::write(out, format!("\u{89}PNG stub page {}", page))?;
        Ok(())
    }

    fn export_page_svg(&self, _pdf: &Path, page: usize, out: &Path) -> Result<()> {
        self.record(ToolCall::ExportSvg { page })?;
        fs::write(
            out,
            format!(
                r#"<svg width="612pt" height="792pt" viewBox="0 0 612 792" xmlns="http://www.w3.org/2000/svg"><text>page {}</text></svg>"#,
                page
            ),
        )?;
        Ok(())
    }

    fn edit(&self, svg: &Path) -> Result<()> {
        self.record(ToolCall::Edit(svg.to_path_buf()))?;
        let behavior = *guard(&self.edit);
        if behavior == EditBehavior::Untouched {
            return Ok(());
        }

        let before = fs::metadata(svg)?.modified()?;
        let doc = fs::read_to_string(svg)?;
        let drawn = match doc.rfind("</g>") {
            Some(at) => format!("{}{}\n{}", &doc[..at], STROKE, &doc[at..]),
            None => doc,
        };
        fs::write(svg, drawn)?;

        let mtime = match behavior {
            EditBehavior::Draw => before + Duration::from_secs(2),
            _ => before,
        };
        File::options().write(true).open(svg)?.set_modified(mtime)?;
        Ok(())
    }

    fn export_pdf(&self, svg: &Path, out: &Path) -> Result<()> {
        self.record(ToolCall::ExportPdf(svg.to_path_buf()))?;
        fs::write(out, format!("%PDF-stub {}\n", svg.display()))?;
        Ok(())
    }

    fn merge_pages(&self, inputs: &[PathBuf], out: &Path) -> Result<()> {
        self.record(ToolCall::Merge(inputs.to_vec()))?;
        let mut merged = Vec::new();
        for input in inputs {
            merged.extend(fs::read(input)?);
        }
        fs::write(out, merged)?;
        Ok(())
    }

    fn overlay(&self, base: &Path, overlay: &Path, pages: &str, out: &Path) -> Result<()> {
        self.record(ToolCall::Overlay {
            pages: pages.to_string(),
        })?;
        let mut composed = fs::read(base)?;
        composed.extend(format!("\n%overlay {}\n", pages).into_bytes());
        composed.extend(fs::read(overlay)?);
        fs::write(out, composed)?;
        Ok(())
    }
}

/// A temp directory holding a fake input document.
pub struct TestEnv {
    // keeps the directory alive for the duration of the test
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub input: PathBuf,
}

pub const INPUT_BYTES: &[u8] = b"%PDF-1.7\n% pagescribe test input\n%%EOF\n";

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let input = root.join("input.pdf");
        fs::write(&input, INPUT_BYTES).expect("failed to write input");
        Self {
            _temp_dir: temp_dir,
            root,
            input,
        }
    }

    pub fn staging_root(&self) -> PathBuf {
        self.root.join("staging")
    }
}
