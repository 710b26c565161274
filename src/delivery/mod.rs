// src/delivery/mod.rs
pub mod emailjs;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

/// Template parameters for one outgoing email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryPayload {
    pub template_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub status: u16,
    pub text: String,
}

/// Failure reported by a delivery capability. Any of the fields may be absent
/// depending on where the failure happened.
#[derive(Debug, Clone, Default, Error, PartialEq, Eq)]
#[error("{}", describe(.status, .text, .message))]
pub struct DeliveryError {
    pub status: Option<u16>,
    pub text: Option<String>,
    pub message: Option<String>,
}

impl DeliveryError {
    pub fn rejected(status: u16, text: impl Into<String>) -> Self {
        DeliveryError { status: Some(status), text: Some(text.into()), message: None }
    }

    pub fn message(message: impl Into<String>) -> Self {
        DeliveryError { message: Some(message.into()), ..Default::default() }
    }
}

fn describe(status: &Option<u16>, text: &Option<String>, message: &Option<String>) -> String {
    let detail = text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or(message.as_deref())
        .unwrap_or("unknown error");
    match status {
        Some(code) => format!("Failed to send order (status {}): {}", code, detail),
        None => format!("Failed to send order: {}", detail),
    }
}

#[async_trait]
pub trait DeliveryCapability: Send + Sync {
    async fn send(&self, payload: &DeliveryPayload) -> Result<Ack, DeliveryError>;
}
