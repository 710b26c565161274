// src/attach.rs
use std::path::{Path, PathBuf};

use url::Url;

use crate::seed::{files_summary, images_summary};
use crate::session::Message;

/// Turns locally selected files into transcript messages: one message holding
/// every image as a `file://` URL, one naming the remaining files.
pub fn messages_for_files(paths: &[PathBuf]) -> Vec<Message> {
    let mut image_urls = Vec::new();
    let mut other_names = Vec::new();

    for path in paths {
        if !path.is_file() {
            log::warn!("Skipping attachment, not a file: {}", path.display());
            continue;
        }
        if is_image(path) {
            match file_url(path) {
                Some(url) => image_urls.push(url),
                None => log::warn!("Could not build a URL for {}", path.display()),
            }
        } else {
            other_names.push(display_name(path));
        }
    }

    let mut messages = Vec::new();
    if !image_urls.is_empty() {
        messages.push(Message::user(images_summary(image_urls.len())).with_images(image_urls));
    }
    if !other_names.is_empty() {
        let names: Vec<&str> = other_names.iter().map(String::as_str).collect();
        messages.push(Message::user(files_summary(&names)));
    }
    messages
}

/// Splits the argument of `/attach` into paths with shell quoting rules.
/// Returns `None` when a quote is left open.
pub fn parse_paths(args: &str) -> Option<Vec<PathBuf>> {
    shlex::split(args).map(|words| words.into_iter().map(PathBuf::from).collect())
}

fn is_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_some_and(|m| m.type_() == mime_guess::mime::IMAGE)
}

fn file_url(path: &Path) -> Option<String> {
    let absolute = std::fs::canonicalize(path).ok()?;
    Url::from_file_path(absolute).ok().map(String::from)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
