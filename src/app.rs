// src/app.rs
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::attach;
use crate::config::Config;
use crate::delivery::{Ack, DeliveryCapability, DeliveryError};
use crate::order::{FormOutcome, OrderForm, PartDescriptor, PendingSend, SubmissionAdapter};
use crate::script::{Choice, ScriptDirector, SubmitOutcome};
use crate::seed::Seed;
use crate::session::{ChatSession, Sender};
use crate::store::SessionStore;

const ATTACH_COMMAND: &str = "/attach";

/// Arguments of an `/attach` command. The command word must stand alone.
fn attach_args(input: &str) -> Option<&str> {
    let rest = input.strip_prefix(ATTACH_COMMAND)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Search,
}

pub struct App {
    pub store: SessionStore,
    pub director: ScriptDirector,
    pub part: PartDescriptor,
    pub input: String,
    pub search: String,
    pub focus: Focus,
    pub order_form: Option<OrderForm>,
    pub notice: Option<String>,
    submission: SubmissionAdapter,
    pending_delivery: Option<PendingSend>,
}

impl App {
    pub fn new(config: &Config, seed: Seed, delivery: Arc<dyn DeliveryCapability>, now: Instant) -> Self {
        let mut app = App {
            store: SessionStore::new(),
            director: ScriptDirector::new(config.script(), config.reply_delay()),
            part: config.part(),
            input: String::new(),
            search: String::new(),
            focus: Focus::Input,
            order_form: None,
            notice: None,
            submission: SubmissionAdapter::new(delivery),
            pending_delivery: None,
        };
        let session_id = app.store.create_session(seed.into_messages());
        if app.director.first_contact(&app.store, session_id, now) {
            log::info!("Seeded session {} is waiting on its first reply", session_id);
        }
        app
    }

    pub fn get_active_session(&self) -> Option<&ChatSession> {
        self.store.active()
    }

    pub fn visible_sessions(&self) -> Vec<&ChatSession> {
        self.store.filter_by_text(&self.search)
    }

    pub fn is_typing(&self) -> bool {
        self.store.active_session_id().is_some_and(|id| self.director.is_typing(id))
    }

    pub fn order_available(&self) -> bool {
        self.store.active_session_id().is_some_and(|id| self.director.order_available(id))
    }

    /// True when the newest bot message in the active session offers the yes/no prompt.
    pub fn choices_offered(&self) -> bool {
        self.get_active_session()
            .and_then(|s| s.messages.iter().rev().find(|m| m.sender == Sender::Bot))
            .is_some_and(|m| m.is_prompt_with_choices)
    }

    /// Lands due bot replies and collects a finished order send, if any.
    pub fn tick(&mut self, now: Instant) {
        self.director.tick(&mut self.store, now);
        self.poll_delivery();
    }

    pub fn send_input(&mut self, now: Instant) {
        let Some(session_id) = self.store.active_session_id() else {
            self.notice = Some("No active chat. Press Ctrl+N to start one.".to_string());
            return;
        };
        let input = self.input.trim().to_string();
        if let Some(args) = attach_args(&input) {
            self.input.clear();
            self.attach_files(session_id, args);
            return;
        }
        match self.director.submit(&mut self.store, session_id, &input, now) {
            SubmitOutcome::Rejected => {}
            SubmitOutcome::Busy => {
                self.notice = Some("Auto-mate is still typing...".to_string());
            }
            SubmitOutcome::UnknownSession => self.input.clear(),
            SubmitOutcome::Exhausted | SubmitOutcome::Scheduled(_) => {
                self.input.clear();
                self.notice = None;
            }
        }
    }

    fn attach_files(&mut self, session_id: Uuid, args: &str) {
        let Some(paths) = attach::parse_paths(args).filter(|p| !p.is_empty()) else {
            self.notice = Some("Usage: /attach <file> [file...]".to_string());
            return;
        };
        let messages = attach::messages_for_files(&paths);
        if messages.is_empty() {
            self.notice = Some("None of those files could be attached.".to_string());
            return;
        }
        for message in messages {
            self.store.append_message(session_id, message);
        }
    }

    pub fn answer_choice(&mut self, choice: Choice) {
        if let Some(session_id) = self.store.active_session_id() {
            self.director.answer_choice(&mut self.store, session_id, choice);
        }
    }

    pub fn new_chat(&mut self) {
        self.store.new_chat();
        self.search.clear();
    }

    /// Moves the selection up or down the visible (filtered) sidebar list.
    pub fn select_relative(&mut self, delta: isize) {
        let Some(target) = self.neighbour(delta) else { return };
        self.store.select_session(target);
    }

    /// Swaps the active session with its visible neighbour, the keyboard
    /// equivalent of dragging it in the sidebar.
    pub fn move_active(&mut self, delta: isize) {
        let (Some(active), Some(target)) = (self.store.active_session_id(), self.neighbour(delta)) else {
            return;
        };
        self.store.reorder(active, target);
    }

    fn neighbour(&self, delta: isize) -> Option<Uuid> {
        let visible: Vec<Uuid> = self.visible_sessions().iter().map(|s| s.id).collect();
        if visible.is_empty() {
            return None;
        }
        let current = self
            .store
            .active_session_id()
            .and_then(|id| visible.iter().position(|v| *v == id));
        let idx = match current {
            Some(i) => (i as isize + delta).clamp(0, visible.len() as isize - 1) as usize,
            None => 0,
        };
        visible.get(idx).copied()
    }

    pub fn delete_active(&mut self) {
        let Some(session_id) = self.store.active_session_id() else { return };
        if self.store.delete_session(session_id) {
            self.director.on_session_deleted(session_id);
            if self.order_form.as_ref().is_some_and(|f| !f.is_sending()) {
                self.order_form = None;
            }
        }
    }

    pub fn open_order_form(&mut self) {
        if !self.order_available() {
            log::debug!("Order form requested before the script finished");
            return;
        }
        if self.order_form.is_none() {
            self.order_form = Some(OrderForm::new(self.part.clone()));
        }
    }

    pub fn close_order_form(&mut self) {
        if self.order_form.as_ref().is_some_and(OrderForm::is_sending) {
            return;
        }
        self.order_form = None;
    }

    /// Validates the open form and starts the send in the background. The
    /// result is picked up by [`App::tick`].
    pub fn submit_order(&mut self) {
        let Some(form) = self.order_form.as_mut() else { return };
        match self.submission.dispatch(form) {
            Ok(pending) => self.pending_delivery = Some(pending),
            Err(e) => log::debug!("Order submission refused: {}", e),
        }
    }

    pub fn order_in_flight(&self) -> bool {
        self.pending_delivery.is_some()
    }

    fn poll_delivery(&mut self) {
        let Some(pending) = self.pending_delivery.as_mut() else { return };
        let Some(result) = pending.try_take() else { return };
        self.pending_delivery = None;
        self.finish_delivery(result);
    }

    /// Waits for an order that is still being sent, so quitting never drops it.
    pub async fn drain_delivery(&mut self) {
        let Some(pending) = self.pending_delivery.take() else { return };
        log::info!("Waiting for the order email to finish sending");
        let result = pending.wait().await;
        self.finish_delivery(result);
    }

    fn finish_delivery(&mut self, result: Result<Ack, DeliveryError>) {
        let Some(form) = self.order_form.as_mut() else { return };
        let notice = &mut self.notice;
        let outcome = SubmissionAdapter::complete(form, result, |receipt| {
            *notice = Some(format!("Thanks {}! Order sent, we'll be in touch at {}.", receipt.name, receipt.email));
        });
        match outcome {
            FormOutcome::Accepted(_) => self.order_form = None,
            FormOutcome::Failed(message) => log::debug!("Order form kept open after failure: {}", message),
        }
    }
}
