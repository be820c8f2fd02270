//! Messaging-provider webhook: signature verification, envelope parsing,
//! dispatch into the conversation engine.

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::conversation::InboundMessage;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Inbound message webhook for a store's messaging channel
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/messages/:store_id",
    params(
        ("store_id" = Uuid, Path, description = "Store ID the channel belongs to")
    ),
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn message_webhook(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = state.config.messaging.webhook_secret.as_deref() {
        if !verify_signature(&headers, &body, secret) {
            warn!(%store_id, "webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let json: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid json: {}", e)))?;

    let messages = extract_messages(&json);
    if messages.is_empty() {
        info!(%store_id, "webhook carried no text messages (status update or unsupported type)");
        return Ok((axum::http::StatusCode::OK, "ok"));
    }

    for message in messages {
        // Each message is deduplicated and answered independently; one bad
        // message must not block the rest of the batch.
        if let Err(e) = state
            .services
            .conversation
            .handle_inbound(store_id, message)
            .await
        {
            warn!(%store_id, error = %e, "failed to process inbound message");
        }
    }

    Ok((axum::http::StatusCode::OK, "ok"))
}

/// Provider signs the raw body with HMAC-SHA256 and sends
/// `x-hub-signature-256: sha256=<hex>`.
fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str) -> bool {
    let Some(header) = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(hex_sig) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Pull text messages out of the provider envelope
/// (`entry[].changes[].value.messages[]`).
fn extract_messages(json: &Value) -> Vec<InboundMessage> {
    let mut out = Vec::new();
    let entries = json.get("entry").and_then(|v| v.as_array());
    for entry in entries.into_iter().flatten() {
        let changes = entry.get("changes").and_then(|v| v.as_array());
        for change in changes.into_iter().flatten() {
            let messages = change
                .pointer("/value/messages")
                .and_then(|v| v.as_array());
            for message in messages.into_iter().flatten() {
                let (Some(id), Some(from)) = (
                    message.get("id").and_then(|v| v.as_str()),
                    message.get("from").and_then(|v| v.as_str()),
                ) else {
                    continue;
                };
                // Interactive button replies carry their id as the command.
                let text = message
                    .pointer("/text/body")
                    .or_else(|| message.pointer("/interactive/button_reply/id"))
                    .and_then(|v| v.as_str());
                let Some(text) = text else { continue };
                out.push(InboundMessage {
                    provider_message_id: id.to_string(),
                    from_phone: from.to_string(),
                    text: text.to_string(),
                });
            }
        }
    }
    out
}

/// Webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/messages/:store_id", post(message_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_passes() {
        let body = Bytes::from_static(b"{\"entry\":[]}");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-hub-signature-256",
            signed(&body, "topsecret").parse().unwrap(),
        );
        assert!(verify_signature(&headers, &body, "topsecret"));
        assert!(!verify_signature(&headers, &body, "wrongsecret"));
    }

    #[test]
    fn missing_or_malformed_signature_fails() {
        let body = Bytes::from_static(b"{}");
        assert!(!verify_signature(&HeaderMap::new(), &body, "s"));

        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", "md5=abcd".parse().unwrap());
        assert!(!verify_signature(&headers, &body, "s"));
    }

    #[test]
    fn envelope_parsing_extracts_text_and_button_replies() {
        let json: Value = serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [
                            { "id": "wamid.1", "from": "254700000001", "text": { "body": "add 2 coffee" } },
                            { "id": "wamid.2", "from": "254700000001", "interactive": { "button_reply": { "id": "checkout" } } },
                            { "id": "wamid.3", "from": "254700000001", "image": { "id": "media" } }
                        ]
                    }
                }]
            }]
        });
        let messages = extract_messages(&json);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "add 2 coffee");
        assert_eq!(messages[1].text, "checkout");
    }

    #[test]
    fn status_only_envelope_yields_nothing() {
        let json: Value = serde_json::json!({
            "entry": [{ "changes": [{ "value": { "statuses": [{ "id": "wamid.9" }] } }] }]
        });
        assert!(extract_messages(&json).is_empty());
    }
}
