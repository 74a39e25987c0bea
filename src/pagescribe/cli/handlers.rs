use super::print::{print_messages, print_thumbnail_events};
use colored::Colorize;
use pagescribe::api::{CmdMessage, ScribeApi};
use pagescribe::error::{Result, ScribeError};
use pagescribe::loader::ThumbnailEvent;
use pagescribe::tools::Toolkit;
use std::fs;
use std::path::{Path, PathBuf};

/// Converts a 1-based page number typed by the user into a page index.
pub(super) fn page_index<T: Toolkit + 'static>(api: &ScribeApi<T>, page: usize) -> Result<usize> {
    match page.checked_sub(1) {
        Some(index) => Ok(index),
        None => Err(ScribeError::PageOutOfRange {
            page,
            count: api.page_count()?,
        }),
    }
}

/// `<dir>/<stem>-annotated.pdf` for an input `<dir>/<stem>.pdf`.
pub(super) fn default_output(pdf: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    pdf.with_file_name(format!("{}-annotated.pdf", stem))
}

pub(super) fn handle_pages<T: Toolkit + 'static>(api: ScribeApi<T>, pdf: &Path) -> Result<()> {
    let mut api = api.with_background_thumbnails(false);
    api.open(pdf)?;
    println!("{}", api.page_count()?);
    api.close(true)?;
    Ok(())
}

pub(super) fn handle_thumbs<T: Toolkit + 'static>(
    mut api: ScribeApi<T>,
    pdf: &Path,
    out: &Path,
) -> Result<()> {
    api.open(pdf)?;
    fs::create_dir_all(out).map_err(|source| ScribeError::Output {
        path: out.to_path_buf(),
        source,
    })?;

    let events = api.wait_for_thumbnails()?;
    let mut written = 0;
    for event in &events {
        if let ThumbnailEvent::Ready { page, path } = event {
            let target = out.join(format!("page-{}.png", page + 1));
            fs::copy(path, &target).map_err(|source| ScribeError::Output {
                path: target.clone(),
                source,
            })?;
            written += 1;
        }
    }

    print_thumbnail_events(&events);
    let summary = format!(
        "Wrote {} of {} thumbnails to {}",
        written,
        api.page_count()?,
        out.display()
    );
    if written == events.len() {
        print_messages(&[CmdMessage::success(summary)]);
    } else {
        print_messages(&[CmdMessage::warning(summary)]);
    }
    api.close(true)?;
    Ok(())
}

pub(super) fn handle_annotate<T: Toolkit + 'static>(
    api: ScribeApi<T>,
    pdf: &Path,
    pages: &[usize],
    output: Option<PathBuf>,
) -> Result<()> {
    let mut api = api.with_background_thumbnails(false);
    api.open(pdf)?;

    for &page in pages {
        let index = page_index(&api, page)?;
        println!("{}", format!("Opening page {} in the editor...", page).dimmed());
        print_messages(&api.annotate(index)?.messages);
    }

    let output = output.unwrap_or_else(|| default_output(pdf));
    print_messages(&api.save(&output)?.messages);
    api.close(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output(Path::new("/docs/report.pdf")),
            PathBuf::from("/docs/report-annotated.pdf")
        );
        assert_eq!(
            default_output(Path::new("scan")),
            PathBuf::from("scan-annotated.pdf")
        );
    }
}
