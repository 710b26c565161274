// src/seed.rs
use serde::Deserialize;

use crate::session::Message;

pub const DEFAULT_SEED_TEXT: &str = "I Want door";

/// File metadata handed over by the search page. Only metadata travels, never content.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime: String,
}

impl FileDescriptor {
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seed {
    None,
    Text(String),
    Files { images: Vec<FileDescriptor>, others: Vec<FileDescriptor> },
    Combined { text: String, images: Vec<FileDescriptor>, others: Vec<FileDescriptor> },
}

impl Seed {
    /// Validates raw `query`/`files` parameters. A `files` value that is not a
    /// JSON array of descriptors is logged and dropped.
    pub fn parse(query: Option<&str>, files: Option<&str>) -> Self {
        let text = query.map(str::trim).filter(|q| !q.is_empty()).map(String::from);
        let descriptors = files.map(parse_files).unwrap_or_default();
        let (images, others): (Vec<_>, Vec<_>) = descriptors.into_iter().partition(FileDescriptor::is_image);

        match (text, images.is_empty() && others.is_empty()) {
            (None, true) => Seed::None,
            (Some(text), true) => Seed::Text(text),
            (None, false) => Seed::Files { images, others },
            (Some(text), false) => Seed::Combined { text, images, others },
        }
    }

    /// Parses a URL-encoded parameter string such as
    /// `query=radiator&files=%5B...%5D`. A leading `?` or path is tolerated.
    pub fn from_query_string(raw: &str) -> Self {
        let params = raw.split_once('?').map_or(raw, |(_, qs)| qs);
        let mut query = None;
        let mut files = None;
        for (key, value) in form_urlencoded::parse(params.as_bytes()) {
            match key.as_ref() {
                "query" => query = Some(value.into_owned()),
                "files" => files = Some(value.into_owned()),
                other => log::debug!("Ignoring unknown seed parameter: {}", other),
            }
        }
        Seed::parse(query.as_deref(), files.as_deref())
    }

    /// Initial user messages for a session built from this seed.
    pub fn into_messages(self) -> Vec<Message> {
        let (text, images, others) = match self {
            Seed::None => return vec![Message::user(DEFAULT_SEED_TEXT)],
            Seed::Text(text) => (Some(text), Vec::new(), Vec::new()),
            Seed::Files { images, others } => (None, images, others),
            Seed::Combined { text, images, others } => (Some(text), images, others),
        };

        let mut messages = Vec::new();
        if let Some(text) = text {
            messages.push(Message::user(text));
        }
        if !images.is_empty() {
            // Descriptors carry no content, so there is nothing to display yet.
            messages.push(Message::user(images_summary(images.len())));
        }
        if !others.is_empty() {
            let names: Vec<&str> = others.iter().map(|f| f.name.as_str()).collect();
            messages.push(Message::user(files_summary(&names)));
        }
        messages
    }
}

fn parse_files(raw: &str) -> Vec<FileDescriptor> {
    match serde_json::from_str::<Vec<FileDescriptor>>(raw) {
        Ok(files) => files,
        Err(e) => {
            log::warn!("Error parsing files parameter: {}", e);
            Vec::new()
        }
    }
}

pub fn images_summary(count: usize) -> String {
    if count == 1 {
        "Uploaded an image:".to_string()
    } else {
        format!("Uploaded {} images:", count)
    }
}

pub fn files_summary(names: &[&str]) -> String {
    let plural = if names.len() > 1 { "s" } else { "" };
    format!("Uploaded file{}: {}", plural, names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn no_parameters_fall_back_to_default() {
        let seed = Seed::parse(None, None);
        assert_eq!(seed, Seed::None);
        assert_eq!(texts(&seed.into_messages()), vec![DEFAULT_SEED_TEXT]);
        assert_eq!(Seed::parse(Some("   "), None), Seed::None);
    }

    #[test]
    fn text_only() {
        let seed = Seed::parse(Some(" I want a radiator "), None);
        assert_eq!(seed, Seed::Text("I want a radiator".into()));
        assert_eq!(texts(&seed.into_messages()), vec!["I want a radiator"]);
    }

    #[test]
    fn files_are_split_by_type() {
        let files = r#"[
            {"name":"front.jpg","size":2048,"type":"image/jpeg"},
            {"name":"side.png","size":1024,"type":"image/png"},
            {"name":"invoice.pdf","size":512,"type":"application/pdf"},
            {"name":"notes","size":10}
        ]"#;
        let seed = Seed::parse(Some("bumper"), Some(files));
        let Seed::Combined { ref images, ref others, .. } = seed else {
            panic!("expected combined seed, got {:?}", seed);
        };
        assert_eq!(images.len(), 2);
        assert_eq!(others.len(), 2);
        assert_eq!(
            texts(&seed.into_messages()),
            vec!["bumper", "Uploaded 2 images:", "Uploaded files: invoice.pdf, notes"]
        );
    }

    #[test]
    fn single_image_and_single_file_wording() {
        let files = r#"[{"name":"a.gif","size":1,"type":"image/gif"},{"name":"b.txt","size":1,"type":"text/plain"}]"#;
        let seed = Seed::parse(None, Some(files));
        assert!(matches!(seed, Seed::Files { .. }));
        let messages = seed.into_messages();
        assert_eq!(texts(&messages), vec!["Uploaded an image:", "Uploaded file: b.txt"]);
        assert!(messages[0].attachment_image_urls.is_empty());
    }

    #[test]
    fn malformed_files_are_dropped() {
        assert_eq!(Seed::parse(None, Some("not json")), Seed::None);
        assert_eq!(Seed::parse(Some("door"), Some("{\"name\":1}")), Seed::Text("door".into()));
    }

    #[test]
    fn url_encoded_parameters() {
        let raw = "/chatpage?query=I+want+a+radiator&files=%5B%7B%22name%22%3A%22r.jpg%22%2C%22size%22%3A3%2C%22type%22%3A%22image%2Fjpeg%22%7D%5D";
        let seed = Seed::from_query_string(raw);
        assert_eq!(
            texts(&seed.into_messages()),
            vec!["I want a radiator", "Uploaded an image:"]
        );
        assert_eq!(Seed::from_query_string("foo=bar"), Seed::None);
    }
}
