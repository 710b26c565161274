// src/delivery/emailjs.rs
use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Ack, DeliveryCapability, DeliveryError, DeliveryPayload};
use crate::config::EmailJsConfig;

pub const EMAILJS_API_URL: &str = "https://api.emailjs.com";
const SEND_PATH: &str = "/api/v1.0/email/send";

#[derive(Serialize, Debug)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: &'a BTreeMap<String, String>,
}

pub struct EmailJsClient {
    client: Client,
    base_url: String,
    service_id: String,
    template_id: String,
    public_key: String,
    private_key: Option<String>,
}

impl EmailJsClient {
    pub fn new(config: &EmailJsConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| EMAILJS_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            service_id: config.service_id.clone().unwrap_or_default(),
            template_id: config.template_id.clone().unwrap_or_default(),
            public_key: config.public_key.clone().unwrap_or_default(),
            private_key: config.private_key.clone().filter(|k| !k.is_empty()),
        }
    }

    fn missing_setting(&self) -> Option<&'static str> {
        if self.service_id.is_empty() {
            Some("serviceId")
        } else if self.template_id.is_empty() {
            Some("templateId")
        } else if self.public_key.is_empty() {
            Some("publicKey")
        } else {
            None
        }
    }
}

#[async_trait]
impl DeliveryCapability for EmailJsClient {
    async fn send(&self, payload: &DeliveryPayload) -> Result<Ack, DeliveryError> {
        if let Some(setting) = self.missing_setting() {
            log::error!("EmailJS is not configured: missing {}", setting);
            return Err(DeliveryError::message(format!("email delivery is not configured (missing {})", setting)));
        }

        let request = SendRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            access_token: self.private_key.as_deref(),
            template_params: &payload.template_params,
        };
        log::debug!("Sending EmailJS request for template {}", self.template_id);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, SEND_PATH))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                log::error!("EmailJS request failed: {}", e);
                DeliveryError::message(e.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            log::info!("EmailJS accepted order email ({})", status);
            Ok(Ack { status: status.as_u16(), text })
        } else {
            log::error!("EmailJS API Error: {} - {}", status, text);
            Err(DeliveryError::rejected(status.as_u16(), text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> EmailJsConfig {
        EmailJsConfig {
            service_id: Some("service_parts".into()),
            template_id: Some("template_order".into()),
            public_key: Some("pk_123".into()),
            private_key: None,
            base_url: Some(base_url),
        }
    }

    fn payload() -> DeliveryPayload {
        let mut params = BTreeMap::new();
        params.insert("name".to_string(), "Dana".to_string());
        params.insert("email".to_string(), "dana@example.com".to_string());
        DeliveryPayload { template_params: params }
    }

    #[tokio::test]
    async fn test_send_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEND_PATH))
            .and(body_partial_json(json!({
                "service_id": "service_parts",
                "template_id": "template_order",
                "user_id": "pk_123",
                "template_params": {"name": "Dana", "email": "dana@example.com"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&server)
            .await;

        let client = EmailJsClient::new(&config(server.uri()));
        let ack = client.send(&payload()).await.unwrap();
        assert_eq!(ack, Ack { status: 200, text: "OK".into() });
    }

    #[tokio::test]
    async fn test_send_includes_access_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEND_PATH))
            .and(body_partial_json(json!({"accessToken": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(server.uri());
        cfg.private_key = Some("secret".into());
        assert!(EmailJsClient::new(&cfg).send(&payload()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEND_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("The Public Key is invalid"))
            .mount(&server)
            .await;

        let client = EmailJsClient::new(&config(server.uri()));
        let err = client.send(&payload()).await.unwrap_err();
        assert_eq!(err.status, Some(400));
        assert_eq!(err.text.as_deref(), Some("The Public Key is invalid"));
    }

    #[tokio::test]
    async fn test_unconfigured_client_does_not_call_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = config(server.uri());
        cfg.template_id = None;
        let err = EmailJsClient::new(&cfg).send(&payload()).await.unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.message.unwrap().contains("templateId"));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let client = EmailJsClient::new(&config("http://127.0.0.1:1".into()));
        let err = client.send(&payload()).await.unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.message.is_some());
    }
}
