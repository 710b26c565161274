// src/order.rs
//! Order confirmation form and the adapter that emails it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::delivery::{Ack, DeliveryCapability, DeliveryError, DeliveryPayload};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PartDescriptor {
    pub name: String,
    pub license: String,
    pub code: String,
    pub image_url: String,
}

impl Default for PartDescriptor {
    fn default() -> Self {
        PartDescriptor {
            name: "Wheel".to_string(),
            license: "ABC123".to_string(),
            code: "12345".to_string(),
            image_url: crate::script::DEFAULT_FINAL_IMAGE_URL.to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Please enter your name.")]
    MissingName,
    #[error("Please enter your email address.")]
    MissingEmail,
    #[error("Your order is already being sent.")]
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormStatus {
    Editing,
    Sending,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Email,
    Message,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            FormField::Name => FormField::Email,
            FormField::Email => FormField::Message,
            FormField::Message => FormField::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub name: String,
    pub email: String,
    pub part: PartDescriptor,
    pub ack: Ack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Accepted(OrderReceipt),
    Failed(String),
}

/// Ephemeral state of the order modal. The part is copied in by value when
/// the modal opens.
#[derive(Debug, Clone)]
pub struct OrderForm {
    pub name: String,
    pub email: String,
    pub message: String,
    pub part: PartDescriptor,
    pub focus: FormField,
    status: FormStatus,
}

impl OrderForm {
    pub fn new(part: PartDescriptor) -> Self {
        OrderForm {
            name: String::new(),
            email: String::new(),
            message: String::new(),
            part,
            focus: FormField::Name,
            status: FormStatus::Editing,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.status == FormStatus::Sending
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            FormStatus::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Name => &mut self.name,
            FormField::Email => &mut self.email,
            FormField::Message => &mut self.message,
        }
    }

    pub fn focused_mut(&mut self) -> &mut String {
        self.field_mut(self.focus)
    }

    /// Validates the form and locks it until [`OrderForm::settle`] is called.
    /// Validation failures are reported on the form as well as returned.
    pub fn begin_submit(&mut self) -> Result<DeliveryPayload, SubmitError> {
        if self.is_sending() {
            return Err(SubmitError::InFlight);
        }
        let check = if self.name.trim().is_empty() {
            Err(SubmitError::MissingName)
        } else if self.email.trim().is_empty() {
            Err(SubmitError::MissingEmail)
        } else {
            Ok(())
        };
        if let Err(e) = check {
            self.status = FormStatus::Failed(e.to_string());
            return Err(e);
        }
        self.status = FormStatus::Sending;
        Ok(self.payload())
    }

    fn payload(&self) -> DeliveryPayload {
        let mut params = BTreeMap::new();
        params.insert("name".to_string(), self.name.trim().to_string());
        params.insert("email".to_string(), self.email.trim().to_string());
        params.insert("message".to_string(), self.message.clone());
        params.insert("part_name".to_string(), self.part.name.clone());
        params.insert("part_license".to_string(), self.part.license.clone());
        params.insert("part_code".to_string(), self.part.code.clone());
        params.insert("part_image".to_string(), self.part.image_url.clone());
        DeliveryPayload { template_params: params }
    }

    pub fn settle(&mut self, result: Result<Ack, DeliveryError>) -> FormOutcome {
        match result {
            Ok(ack) => {
                self.status = FormStatus::Editing;
                FormOutcome::Accepted(OrderReceipt {
                    name: self.name.trim().to_string(),
                    email: self.email.trim().to_string(),
                    part: self.part.clone(),
                    ack,
                })
            }
            Err(e) => {
                log::warn!("Order delivery failed: {}", e);
                let message = e.to_string();
                self.status = FormStatus::Failed(message.clone());
                FormOutcome::Failed(message)
            }
        }
    }
}

/// Result of a send that was handed to a background task.
pub struct PendingSend {
    rx: oneshot::Receiver<Result<Ack, DeliveryError>>,
}

impl PendingSend {
    /// Non-blocking check; `None` while the send is still running.
    pub fn try_take(&mut self) -> Option<Result<Ack, DeliveryError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(task_lost())),
        }
    }

    pub async fn wait(self) -> Result<Ack, DeliveryError> {
        self.rx.await.unwrap_or_else(|_| Err(task_lost()))
    }
}

fn task_lost() -> DeliveryError {
    DeliveryError::message("delivery task ended unexpectedly")
}

#[derive(Clone)]
pub struct SubmissionAdapter {
    delivery: Arc<dyn DeliveryCapability>,
}

impl SubmissionAdapter {
    pub fn new(delivery: Arc<dyn DeliveryCapability>) -> Self {
        SubmissionAdapter { delivery }
    }

    /// Validates the form and starts the send on a background task. The form
    /// stays locked until the result is passed to [`SubmissionAdapter::complete`].
    pub fn dispatch(&self, form: &mut OrderForm) -> Result<PendingSend, SubmitError> {
        let payload = form.begin_submit()?;
        let (tx, rx) = oneshot::channel();
        let delivery = Arc::clone(&self.delivery);
        tokio::spawn(async move {
            let result = delivery.send(&payload).await;
            let _ = tx.send(result);
        });
        Ok(PendingSend { rx })
    }

    /// Settles the form; `on_accepted` runs only when delivery succeeded.
    /// Closing the form is left to the caller.
    pub fn complete<F>(form: &mut OrderForm, result: Result<Ack, DeliveryError>, on_accepted: F) -> FormOutcome
    where
        F: FnOnce(&OrderReceipt),
    {
        let outcome = form.settle(result);
        if let FormOutcome::Accepted(receipt) = &outcome {
            log::info!(
                "Order for part {} accepted for {} (delivery status {}: {})",
                receipt.part.code, receipt.email, receipt.ack.status, receipt.ack.text
            );
            on_accepted(receipt);
        }
        outcome
    }

    #[cfg(test)]
    pub async fn submit<F>(&self, form: &mut OrderForm, on_accepted: F) -> Result<FormOutcome, SubmitError>
    where
        F: FnOnce(&OrderReceipt),
    {
        let pending = self.dispatch(form)?;
        let result = pending.wait().await;
        Ok(Self::complete(form, result, on_accepted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeDelivery {
        calls: AtomicUsize,
        last: Mutex<Option<DeliveryPayload>>,
        fail: bool,
    }

    impl FakeDelivery {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(FakeDelivery { calls: AtomicUsize::new(0), last: Mutex::new(None), fail })
        }
    }

    #[async_trait]
    impl DeliveryCapability for FakeDelivery {
        async fn send(&self, payload: &DeliveryPayload) -> Result<Ack, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(payload.clone());
            if self.fail {
                Err(DeliveryError::rejected(500, "mailbox unavailable"))
            } else {
                Ok(Ack { status: 200, text: "OK".into() })
            }
        }
    }

    fn filled_form() -> OrderForm {
        let mut form = OrderForm::new(PartDescriptor::default());
        form.name = "Dana".into();
        form.email = "dana@example.com".into();
        form.message = "Please ship to the garage".into();
        form
    }

    #[tokio::test]
    async fn empty_email_never_reaches_delivery() {
        let fake = FakeDelivery::new(false);
        let adapter = SubmissionAdapter::new(fake.clone());
        let mut form = filled_form();
        form.email = "  ".into();

        let mut accepted = false;
        let result = adapter.submit(&mut form, |_| accepted = true).await;
        assert_eq!(result, Err(SubmitError::MissingEmail));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert!(!accepted);
        assert_eq!(form.error(), Some("Please enter your email address."));
    }

    #[test]
    fn validation_is_synchronous() {
        let mut form = OrderForm::new(PartDescriptor::default());
        assert_eq!(form.begin_submit(), Err(SubmitError::MissingName));
        form.name = "Dana".into();
        assert_eq!(form.begin_submit(), Err(SubmitError::MissingEmail));
        assert!(!form.is_sending());
    }

    #[tokio::test]
    async fn successful_send_invokes_callback_once() {
        let fake = FakeDelivery::new(false);
        let adapter = SubmissionAdapter::new(fake.clone());
        let mut form = filled_form();

        let mut accepted = Vec::new();
        let outcome = adapter.submit(&mut form, |r| accepted.push(r.clone())).await.unwrap();
        assert!(matches!(outcome, FormOutcome::Accepted(_)));
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].part.code, "12345");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);

        let sent = fake.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.template_params["email"], "dana@example.com");
        assert_eq!(sent.template_params["part_name"], "Wheel");
        assert_eq!(sent.template_params["message"], "Please ship to the garage");
    }

    #[tokio::test]
    async fn failed_send_keeps_form_intact() {
        let fake = FakeDelivery::new(true);
        let adapter = SubmissionAdapter::new(fake.clone());
        let mut form = filled_form();

        let mut accepted = false;
        let outcome = adapter.submit(&mut form, |_| accepted = true).await.unwrap();
        assert_eq!(
            outcome,
            FormOutcome::Failed("Failed to send order (status 500): mailbox unavailable".into())
        );
        assert!(!accepted);
        assert_eq!(form.name, "Dana");
        assert_eq!(form.email, "dana@example.com");
        assert_eq!(form.message, "Please ship to the garage");
        assert_eq!(form.error(), Some("Failed to send order (status 500): mailbox unavailable"));
        assert!(!form.is_sending());
    }

    #[test]
    fn second_submit_while_sending_is_refused() {
        let mut form = filled_form();
        assert!(form.begin_submit().is_ok());
        assert!(form.is_sending());
        assert_eq!(form.begin_submit(), Err(SubmitError::InFlight));

        form.settle(Err(DeliveryError::message("timeout")));
        assert!(form.begin_submit().is_ok());
    }

    #[test]
    fn focus_cycles_through_fields() {
        let mut form = OrderForm::new(PartDescriptor::default());
        form.focused_mut().push_str("Dana");
        form.focus = form.focus.next();
        form.focused_mut().push_str("d@x.io");
        form.focus = form.focus.next().next();
        assert_eq!(form.focus, FormField::Name);
        assert_eq!(form.name, "Dana");
        assert_eq!(form.email, "d@x.io");
    }
}
