use colored::Colorize;
use pagescribe::api::{CmdMessage, MessageLevel, PageStatus};
use pagescribe::loader::ThumbnailEvent;

pub(super) fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

pub(super) fn format_status_line(status: &PageStatus) -> String {
    let marker = if status.annotated { "*" } else { " " };
    let thumb = match &status.thumbnail {
        Some(_) => "thumbnail ready",
        None => "no thumbnail",
    };
    format!("{:>4} {} {}", status.page + 1, marker, thumb)
}

pub(super) fn print_status(pages: &[PageStatus]) {
    for status in pages {
        let line = format_status_line(status);
        if status.annotated {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
}

pub(super) fn print_thumbnail_events(events: &[ThumbnailEvent]) {
    for event in events {
        if let ThumbnailEvent::Failed { page, message } = event {
            println!(
                "{}",
                format!("Page {}: thumbnail unavailable ({})", page + 1, message).red()
            );
        }
    }
}
