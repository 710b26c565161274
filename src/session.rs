use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const NEW_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

/// `id` is a UUIDv7, so ids sort in creation order.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub attachment_image_urls: Vec<String>,
    pub is_prompt_with_choices: bool,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Message {
            id: Uuid::now_v7(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            attachment_image_urls: Vec::new(),
            is_prompt_with_choices: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Message::new(Sender::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Message::new(Sender::Bot, text)
    }

    pub fn with_images(mut self, urls: Vec<String>) -> Self {
        self.attachment_image_urls = urls;
        self
    }

    pub fn with_choices(mut self) -> Self {
        self.is_prompt_with_choices = true;
        self
    }

    pub fn contains_ignore_case(&self, needle_lower: &str) -> bool {
        self.text.to_lowercase().contains(needle_lower)
    }
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_activity_at: DateTime<Utc>,
}

impl ChatSession {
    /// Builds a session around its seed. The title is the first user message,
    /// which is also what the sidebar shows.
    pub fn new(messages: Vec<Message>) -> Self {
        let now = Utc::now();
        let title = messages
            .iter()
            .find(|m| m.sender == Sender::User)
            .map(|m| m.text.clone())
            .unwrap_or_else(|| NEW_CHAT_TITLE.to_string());
        ChatSession {
            id: Uuid::new_v4(),
            title,
            messages,
            last_activity_at: now,
        }
    }

    pub fn add_message(&mut self, message: Message) {
        if self.title == NEW_CHAT_TITLE && message.sender == Sender::User {
            self.title = message.text.clone();
        }
        self.messages.push(message);
        self.last_activity_at = Utc::now();
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.sender == Sender::User)
    }
}
