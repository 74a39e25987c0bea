//! # External Process Adapter
//!
//! Everything pagescribe knows about the outside world goes through the
//! [`Toolkit`] trait: counting pages, rasterizing thumbnails, exporting pages to
//! SVG, launching the interactive editor, converting annotations back to PDF,
//! and the merge/overlay steps of saving.
//!
//! [`ProcessToolkit`] is the production implementation. It shells out to
//! `qpdf`, `pdftocairo` and `inkscape` with fixed argument lists. Failures are
//! classified in one place ([`run`]):
//!
//! - a program that cannot be spawned becomes [`ScribeError::ToolLaunch`]
//! - a program that exits non-zero becomes [`ScribeError::ExternalTool`],
//!   whose message is the program's stderr, untouched
//!
//! No invocation carries a timeout. The editor in particular may legitimately
//! stay open for hours; the user closing it is the only termination signal.

use crate::config::ToolPaths;
use crate::error::{Result, ScribeError};
use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Abstract interface over the PDF toolkit and the vector editor.
///
/// Page numbers passed to a `Toolkit` are one-based, matching the external
/// programs. Implementations must be shareable across the background
/// thumbnail loader and the foreground edit flow.
pub trait Toolkit: Send + Sync {
    /// Number of pages in the PDF at `pdf`.
    fn page_count(&self, pdf: &Path) -> Result<usize>;

    /// Rasterize page `page` of `pdf` into a PNG at exactly `out`, scaled so
    /// its longest side is `size` pixels.
    fn render_thumbnail(&self, pdf: &Path, page: usize, size: u32, out: &Path) -> Result<()>;

    /// Export page `page` of `pdf` as an SVG document at `out`.
    fn export_page_svg(&self, pdf: &Path, page: usize, out: &Path) -> Result<()>;

    /// Open `svg` in the interactive editor and block until it exits.
    fn edit(&self, svg: &Path) -> Result<()>;

    /// Convert an SVG document into a single-page PDF at `out`.
    fn export_pdf(&self, svg: &Path, out: &Path) -> Result<()>;

    /// Concatenate `inputs`, in order, into one PDF at `out`.
    fn merge_pages(&self, inputs: &[PathBuf], out: &Path) -> Result<()>;

    /// Overlay the pages of `overlay` onto the pages of `base` listed in
    /// `pages` (comma-separated, one-based, positional), writing `out`.
    fn overlay(&self, base: &Path, overlay: &Path, pages: &str, out: &Path) -> Result<()>;
}

/// Production toolkit invoking the configured programs.
#[derive(Debug, Clone)]
pub struct ProcessToolkit {
    paths: ToolPaths,
}

impl ProcessToolkit {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }
}

impl Default for ProcessToolkit {
    fn default() -> Self {
        Self::new(ToolPaths::default())
    }
}

fn path_arg(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path.as_os_str());
    arg
}

/// Runs `program` with `args` to completion and classifies the outcome.
fn run(program: &str, args: Vec<OsString>) -> Result<Output> {
    debug!("running {} {:?}", program, args);

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|e| ScribeError::ToolLaunch {
            tool: program.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if stderr.is_empty() {
            stderr = format!("{} exited with {}", program, output.status);
        }
        return Err(ScribeError::ExternalTool {
            tool: program.to_string(),
            stderr,
        });
    }

    Ok(output)
}

/// Parses the output of the page-count query.
pub fn parse_page_count(pdf: &Path, stdout: &[u8]) -> Result<usize> {
    let text = String::from_utf8_lossy(stdout);
    let count: usize = text.trim().parse().map_err(|e| ScribeError::DocumentRead {
        path: pdf.to_path_buf(),
        reason: format!("cannot convert page count '{}': {}", text.trim(), e),
    })?;
    if count == 0 {
        return Err(ScribeError::DocumentRead {
            path: pdf.to_path_buf(),
            reason: "document has no pages".to_string(),
        });
    }
    Ok(count)
}

impl Toolkit for ProcessToolkit {
    fn page_count(&self, pdf: &Path) -> Result<usize> {
        let output = run(
            &self.paths.qpdf,
            vec![
                "--warning-exit-0".into(),
                "--show-npages".into(),
                pdf.into(),
            ],
        )?;
        parse_page_count(pdf, &output.stdout)
    }

    fn render_thumbnail(&self, pdf: &Path, page: usize, size: u32, out: &Path) -> Result<()> {
        // pdftocairo appends ".png" to the output base itself
        let base = out.with_extension("");
        let page = page.to_string();
        run(
            &self.paths.pdftocairo,
            vec![
                "-f".into(),
                page.clone().into(),
                "-l".into(),
                page.into(),
                "-png".into(),
                "-singlefile".into(),
                "-cropbox".into(),
                "-scale-to".into(),
                size.to_string().into(),
                pdf.into(),
                base.into(),
            ],
        )?;
        Ok(())
    }

    fn export_page_svg(&self, pdf: &Path, page: usize, out: &Path) -> Result<()> {
        run(
            &self.paths.inkscape,
            vec![
                format!("--pages={}", page).into(),
                "--export-type=svg".into(),
                "--pdf-poppler".into(),
                path_arg("--export-filename=", out),
                pdf.into(),
            ],
        )?;
        Ok(())
    }

    fn edit(&self, svg: &Path) -> Result<()> {
        run(&self.paths.inkscape, vec![svg.into()])?;
        Ok(())
    }

    fn export_pdf(&self, svg: &Path, out: &Path) -> Result<()> {
        run(
            &self.paths.inkscape,
            vec![
                "--export-type=pdf".into(),
                path_arg("--export-filename=", out),
                svg.into(),
            ],
        )?;
        Ok(())
    }

    fn merge_pages(&self, inputs: &[PathBuf], out: &Path) -> Result<()> {
        let mut args: Vec<OsString> = vec![
            "--warning-exit-0".into(),
            "--empty".into(),
            "--pages".into(),
        ];
        args.extend(inputs.iter().map(|p| p.as_os_str().to_owned()));
        args.push("--".into());
        args.push(out.into());
        run(&self.paths.qpdf, args)?;
        Ok(())
    }

    fn overlay(&self, base: &Path, overlay: &Path, pages: &str, out: &Path) -> Result<()> {
        run(
            &self.paths.qpdf,
            vec![
                "--warning-exit-0".into(),
                base.into(),
                "--overlay".into(),
                overlay.into(),
                format!("--to={}", pages).into(),
                "--".into(),
                out.into(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_count_with_whitespace() {
        let count = parse_page_count(Path::new("a.pdf"), b" 12\n").unwrap();
        assert_eq!(count, 12);
    }

    #[test]
    fn rejects_non_numeric_page_count() {
        let err = parse_page_count(Path::new("a.pdf"), b"WARNING: junk").unwrap_err();
        assert!(matches!(err, ScribeError::DocumentRead { .. }));
        assert!(err.to_string().contains("cannot convert page count"));
    }

    #[test]
    fn rejects_zero_pages() {
        let err = parse_page_count(Path::new("a.pdf"), b"0").unwrap_err();
        assert!(err.to_string().contains("no pages"));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let toolkit = ProcessToolkit::new(ToolPaths {
            qpdf: "pagescribe-no-such-program".to_string(),
            ..ToolPaths::default()
        });
        let err = toolkit.page_count(Path::new("a.pdf")).unwrap_err();
        assert!(matches!(err, ScribeError::ToolLaunch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_reports_stderr_verbatim() {
        let err = run(
            "sh",
            vec!["-c".into(), "echo 'broken xref table' >&2; exit 3".into()],
        )
        .unwrap_err();
        assert_eq!(err.tool_output(), Some("broken xref table\n"));
    }

    #[cfg(unix)]
    #[test]
    fn silent_failure_mentions_exit_status() {
        let err = run("sh", vec!["-c".into(), "exit 4".into()]).unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    /// A program that writes its arguments, one per line, to `args.log`.
    #[cfg(unix)]
    fn recorder(dir: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("record");
        let log = dir.join("args.log");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    fn recorded(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("args.log"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn thumbnail_passes_output_base_without_png() {
        let temp = tempfile::tempdir().unwrap();
        let program = recorder(temp.path());
        let toolkit = ProcessToolkit::new(ToolPaths {
            pdftocairo: program,
            ..ToolPaths::default()
        });

        toolkit
            .render_thumbnail(Path::new("/s/source.pdf"), 3, 200, Path::new("/s/page-2.thumb.png"))
            .unwrap();

        assert_eq!(
            recorded(temp.path()),
            vec![
                "-f", "3", "-l", "3", "-png", "-singlefile", "-cropbox", "-scale-to", "200",
                "/s/source.pdf", "/s/page-2.thumb",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn page_export_and_pdf_conversion_arguments() {
        let temp = tempfile::tempdir().unwrap();
        let program = recorder(temp.path());
        let toolkit = ProcessToolkit::new(ToolPaths {
            inkscape: program,
            ..ToolPaths::default()
        });

        toolkit
            .export_page_svg(Path::new("/s/source.pdf"), 2, Path::new("/s/page-1.source.svg"))
            .unwrap();
        assert_eq!(
            recorded(temp.path()),
            vec![
                "--pages=2",
                "--export-type=svg",
                "--pdf-poppler",
                "--export-filename=/s/page-1.source.svg",
                "/s/source.pdf",
            ]
        );

        toolkit
            .export_pdf(Path::new("/s/page-1.cleaned.svg"), Path::new("/s/page-1.annotation.pdf"))
            .unwrap();
        assert_eq!(
            recorded(temp.path()),
            vec![
                "--export-type=pdf",
                "--export-filename=/s/page-1.annotation.pdf",
                "/s/page-1.cleaned.svg",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn merge_and_overlay_arguments() {
        let temp = tempfile::tempdir().unwrap();
        let program = recorder(temp.path());
        let toolkit = ProcessToolkit::new(ToolPaths {
            qpdf: program,
            ..ToolPaths::default()
        });

        toolkit
            .merge_pages(
                &[PathBuf::from("/s/a.pdf"), PathBuf::from("/s/b.pdf")],
                Path::new("/s/overlay.pdf"),
            )
            .unwrap();
        assert_eq!(
            recorded(temp.path()),
            vec![
                "--warning-exit-0",
                "--empty",
                "--pages",
                "/s/a.pdf",
                "/s/b.pdf",
                "--",
                "/s/overlay.pdf",
            ]
        );

        toolkit
            .overlay(
                Path::new("/s/source.pdf"),
                Path::new("/s/overlay.pdf"),
                "1,3",
                Path::new("/s/composed.pdf"),
            )
            .unwrap();
        assert_eq!(
            recorded(temp.path()),
            vec![
                "--warning-exit-0",
                "/s/source.pdf",
                "--overlay",
                "/s/overlay.pdf",
                "--to=1,3",
                "--",
                "/s/composed.pdf",
            ]
        );
    }
}
