//! Outbound messaging-channel client (conversational commerce replies).
//!
//! Injected as a trait object so tests can substitute a recording fake and
//! deployments without a configured provider fall back to a no-op sender.

use crate::config::MessagingConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// One tappable option in an interactive menu message.
#[derive(Debug, Clone, Serialize)]
pub struct MenuOption {
    pub id: String,
    pub title: String,
}

/// Provider-assigned id of a successfully sent message.
pub type ProviderMessageId = String;

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> Result<ProviderMessageId, ServiceError>;

    async fn send_menu(
        &self,
        to: &str,
        body: &str,
        options: &[MenuOption],
    ) -> Result<ProviderMessageId, ServiceError>;
}

pub struct HttpMessageSender {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

impl HttpMessageSender {
    pub fn new(config: &MessagingConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::MessagingError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
        })
    }

    async fn post_message(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProviderMessageId, ServiceError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::MessagingError(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            return Err(ServiceError::MessagingError(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let message_id = body
            .pointer("/messages/0/id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        debug!(%message_id, "message dispatched");
        Ok(message_id)
    }
}

#[async_trait]
impl MessageSender for HttpMessageSender {
    async fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> Result<ProviderMessageId, ServiceError> {
        self.post_message(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }))
        .await
    }

    async fn send_menu(
        &self,
        to: &str,
        body: &str,
        options: &[MenuOption],
    ) -> Result<ProviderMessageId, ServiceError> {
        let buttons: Vec<serde_json::Value> = options
            .iter()
            .map(|o| {
                serde_json::json!({
                    "type": "reply",
                    "reply": { "id": o.id, "title": o.title },
                })
            })
            .collect();
        self.post_message(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": { "buttons": buttons },
            },
        }))
        .await
    }
}

/// Sender used when no messaging provider is configured. Logs and drops.
pub struct NoopMessageSender;

#[async_trait]
impl MessageSender for NoopMessageSender {
    async fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> Result<ProviderMessageId, ServiceError> {
        info!(%to, %body, "messaging disabled; dropping text reply");
        Ok(String::new())
    }

    async fn send_menu(
        &self,
        to: &str,
        body: &str,
        _options: &[MenuOption],
    ) -> Result<ProviderMessageId, ServiceError> {
        info!(%to, %body, "messaging disabled; dropping menu reply");
        Ok(String::new())
    }
}
