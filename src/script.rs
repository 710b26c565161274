// src/script.rs
//! Scripted conversation driver.
//!
//! Each session walks the same fixed list of bot replies, one per user
//! submission. A reply is not appended right away: it is parked as a pending
//! entry keyed by session id and lands once the host loop calls [`ScriptDirector::tick`]
//! with an instant past its due time. While an entry is parked the session is
//! "typing" and further submissions are refused.
//!
//! All timing is driven by the `now` the caller hands in, so the director
//! never reads the clock itself.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use uuid::Uuid;

use crate::session::{Message, Sender};
use crate::store::SessionStore;

pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_FINAL_IMAGE_URL: &str = "/placeholder-image.jpg";

pub const REJECT_REPLY: &str = "No, that's not the right part";
pub const CONFIRM_REPLY: &str = "Yes, that's the correct part";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptLine {
    pub text: String,
    /// Attach the yes/no prompt to the bot message carrying this line.
    #[serde(default)]
    pub choices: bool,
}

impl ScriptLine {
    pub fn new(text: &str) -> Self {
        ScriptLine { text: text.to_string(), choices: false }
    }
}

#[derive(Debug, Clone)]
pub struct Script {
    lines: Vec<ScriptLine>,
    final_image_url: String,
}

impl Script {
    pub fn new(lines: Vec<ScriptLine>, final_image_url: impl Into<String>) -> Self {
        Script { lines, final_image_url: final_image_url.into() }
    }

    /// The six-step radiator walkthrough used when no script is configured.
    pub fn reference() -> Self {
        let mut lines: Vec<ScriptLine> = [
            "Thanks! Which vehicle is this part for? Please share the make, model and year.",
            "Got it. Do you know the engine size or trim level?",
            "Great. Is this a replacement for a damaged part, or an upgrade?",
            "Understood. Let me search our catalogue for parts that fit your vehicle.",
            "I found a few candidates and I'm narrowing it down to the best match now.",
            "Is this the correct part?",
        ]
        .iter()
        .map(|t| ScriptLine::new(t))
        .collect();
        if let Some(last) = lines.last_mut() {
            last.choices = true;
        }
        Script::new(lines, DEFAULT_FINAL_IMAGE_URL)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    #[cfg(test)]
    pub fn final_image_url(&self) -> &str {
        &self.final_image_url
    }

    /// Bot message for step `cursor`; the last step carries the designated image.
    fn reply_at(&self, cursor: usize) -> Option<Message> {
        let line = self.lines.get(cursor)?;
        let mut message = Message::bot(line.text.clone());
        if cursor + 1 == self.lines.len() {
            message = message.with_images(vec![self.final_image_url.clone()]);
        }
        if line.choices {
            message = message.with_choices();
        }
        Some(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    AwaitingUser(usize),
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty or whitespace-only input; nothing changed.
    Rejected,
    /// A reply is already pending for this session; nothing changed.
    Busy,
    /// The session does not exist.
    UnknownSession,
    /// User message appended, script already exhausted so no reply follows.
    Exhausted,
    /// User message appended, bot reply due at the given instant.
    Scheduled(Instant),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Reject,
    Confirm,
}

impl Choice {
    pub fn reply_text(self) -> &'static str {
        match self {
            Choice::Reject => REJECT_REPLY,
            Choice::Confirm => CONFIRM_REPLY,
        }
    }
}

#[derive(Debug)]
pub struct ScriptDirector {
    script: Script,
    delay: Duration,
    cursors: HashMap<Uuid, usize>,
    pending: HashMap<Uuid, Instant>,
}

impl ScriptDirector {
    pub fn new(script: Script, delay: Duration) -> Self {
        ScriptDirector { script, delay, cursors: HashMap::new(), pending: HashMap::new() }
    }

    pub fn cursor(&self, session_id: Uuid) -> usize {
        self.cursors.get(&session_id).copied().unwrap_or(0)
    }

    pub fn state(&self, session_id: Uuid) -> ScriptState {
        let cursor = self.cursor(session_id);
        if cursor >= self.script.len() {
            ScriptState::Exhausted
        } else {
            ScriptState::AwaitingUser(cursor)
        }
    }

    pub fn is_typing(&self, session_id: Uuid) -> bool {
        self.pending.contains_key(&session_id)
    }

    pub fn order_available(&self, session_id: Uuid) -> bool {
        self.state(session_id) == ScriptState::Exhausted
    }

    /// Earliest pending due time, if any reply is parked.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub fn submit(
        &mut self,
        store: &mut SessionStore,
        session_id: Uuid,
        text: &str,
        now: Instant,
    ) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            log::debug!("Ignoring empty submission for session {}", session_id);
            return SubmitOutcome::Rejected;
        }
        if self.is_typing(session_id) {
            log::debug!("Session {} is still waiting on a reply; submission refused", session_id);
            return SubmitOutcome::Busy;
        }
        if !store.append_message(session_id, Message::user(text)) {
            return SubmitOutcome::UnknownSession;
        }
        if self.state(session_id) == ScriptState::Exhausted {
            log::debug!("Script exhausted for session {}; no reply", session_id);
            return SubmitOutcome::Exhausted;
        }
        SubmitOutcome::Scheduled(self.schedule(session_id, now))
    }

    /// Kicks off the first scripted reply for a session that was seeded with
    /// user input and has not heard from the bot yet.
    pub fn first_contact(&mut self, store: &SessionStore, session_id: Uuid, now: Instant) -> bool {
        let Some(session) = store.get(session_id) else {
            log::warn!("First contact requested for unknown session {}", session_id);
            return false;
        };
        let has_user = session.messages.iter().any(|m| m.sender == Sender::User);
        let has_bot = session.messages.iter().any(|m| m.sender == Sender::Bot);
        if !has_user || has_bot || self.cursor(session_id) != 0 || self.is_typing(session_id) {
            return false;
        }
        if self.script.is_empty() {
            return false;
        }
        self.schedule(session_id, now);
        true
    }

    fn schedule(&mut self, session_id: Uuid, now: Instant) -> Instant {
        let due = now + self.delay;
        self.pending.insert(session_id, due);
        log::debug!("Reply for session {} due in {:?}", session_id, self.delay);
        due
    }

    /// Lands every reply whose due time has passed. Returns how many landed.
    pub fn tick(&mut self, store: &mut SessionStore, now: Instant) -> usize {
        let mut due: Vec<(Uuid, Instant)> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, at)| (*id, *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);

        let mut landed = 0;
        for (session_id, _) in due {
            self.pending.remove(&session_id);
            let cursor = self.cursor(session_id);
            let Some(reply) = self.script.reply_at(cursor) else {
                continue;
            };
            if !store.append_message(session_id, reply) {
                continue;
            }
            let next = (cursor + 1).min(self.script.len());
            self.cursors.insert(session_id, next);
            landed += 1;
            log::info!("Session {} advanced to step {}/{}", session_id, next, self.script.len());
        }
        landed
    }

    /// Cancels whatever is pending for a session and forgets its progress.
    pub fn on_session_deleted(&mut self, session_id: Uuid) {
        if self.pending.remove(&session_id).is_some() {
            log::debug!("Cancelled pending reply for deleted session {}", session_id);
        }
        self.cursors.remove(&session_id);
    }

    pub fn answer_choice(&self, store: &mut SessionStore, session_id: Uuid, choice: Choice) -> bool {
        store.append_message(session_id, Message::user(choice.reply_text()))
    }
}
