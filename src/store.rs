// src/store.rs
use crate::session::{ChatSession, Message};
use uuid::Uuid;

pub const NEW_CHAT_GREETING: &str = "Hello! How can I help you find automotive parts today?";

/// In-memory set of chat sessions in sidebar order, plus the active one.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Vec<ChatSession>,
    active_session_id: Option<Uuid>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&mut self, initial_messages: Vec<Message>) -> Uuid {
        let session = ChatSession::new(initial_messages);
        let session_id = session.id;
        log::info!("Created session {} ({:?})", session_id, session.title);
        self.sessions.push(session);
        self.active_session_id = Some(session_id);
        session_id
    }

    pub fn new_chat(&mut self) -> Uuid {
        self.create_session(vec![Message::bot(NEW_CHAT_GREETING)])
    }

    pub fn select_session(&mut self, session_id: Uuid) -> bool {
        if self.position(session_id).is_some() {
            self.active_session_id = Some(session_id);
            log::info!("Switched to session ID: {}", session_id);
            true
        } else {
            log::warn!("Attempted to switch to non-existent session ID: {}", session_id);
            false
        }
    }

    pub fn append_message(&mut self, session_id: Uuid, message: Message) -> bool {
        match self.get_mut(session_id) {
            Some(session) => {
                log::debug!("Appending message {} to session {}", message.id, session_id);
                session.add_message(message);
                true
            }
            None => {
                log::warn!("Dropping message for unknown session {}", session_id);
                false
            }
        }
    }

    /// Moves `from_id` into the slot currently held by `to_id`, shifting the
    /// sessions in between by one.
    pub fn reorder(&mut self, from_id: Uuid, to_id: Uuid) -> bool {
        if from_id == to_id {
            return false;
        }
        let (Some(from), Some(to)) = (self.position(from_id), self.position(to_id)) else {
            log::warn!("Reorder ignored: unknown session ({} -> {})", from_id, to_id);
            return false;
        };
        let moved = self.sessions.remove(from);
        self.sessions.insert(to, moved);
        log::debug!("Moved session {} from position {} to {}", from_id, from, to);
        true
    }

    pub fn delete_session(&mut self, session_id: Uuid) -> bool {
        let Some(idx) = self.position(session_id) else {
            log::warn!("Attempted to delete non-existent session ID: {}", session_id);
            return false;
        };
        self.sessions.remove(idx);
        if self.active_session_id == Some(session_id) {
            self.active_session_id = self.sessions.first().map(|s| s.id);
        }
        log::info!("Deleted session {}", session_id);
        true
    }

    pub fn filter_by_text(&self, query: &str) -> Vec<&ChatSession> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.sessions.iter().collect();
        }
        self.sessions
            .iter()
            .filter(|s| {
                s.first_user_message().is_some_and(|m| m.contains_ignore_case(&needle))
                    || s.messages.iter().any(|m| m.contains_ignore_case(&needle))
            })
            .collect()
    }

    pub fn get(&self, session_id: Uuid) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    fn get_mut(&mut self, session_id: Uuid) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }

    fn position(&self, session_id: Uuid) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == session_id)
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.active_session_id
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active_session_id.and_then(|id| self.get(id))
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
