//! `POST /api/webhook`: quote submissions from the platform, guarded by a shared secret.

use hyper::{Method, StatusCode};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::reply::{Inbound, Reply};

pub const SECRET_HEADER: &str = "x-base44-secret";

const QUOTE_ID_KEYS: &[&str] = &["quoteId", "quote_id", "id"];

pub async fn handle(state: &AppState, inbound: Inbound) -> Reply {
    let request_id = Uuid::new_v4().to_string();

    if inbound.method != Method::POST {
        warn!(%request_id, method = %inbound.method, "webhook called with wrong method");
        return Reply::method_not_allowed("POST");
    }

    let expected = match state.config.require_webhook_secret() {
        Ok(secret) => secret,
        Err(missing) => {
            warn!(%request_id, "webhook secret not configured");
            return Reply::from(missing);
        }
    };
    let provided = inbound.header(SECRET_HEADER).unwrap_or_default();
    if !secrets_match(provided, expected) {
        warn!(%request_id, header_present = !provided.is_empty(), "webhook secret mismatch");
        return Reply::error(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let payload: Value = if inbound.body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice(&inbound.body) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%request_id, %error, "webhook body is not json");
                return Reply::json(
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "invalid_json", "message": error.to_string() }),
                );
            }
        }
    };

    let quote_id = quote_id(&payload);
    info!(%request_id, quote_id = %quote_id, bytes = inbound.body.len(), "webhook received");

    Reply::json(
        StatusCode::OK,
        json!({ "ok": true, "message": "Webhook received successfully", "quoteId": quote_id }),
    )
}

/// Compares digests so the check does not short-circuit on the first differing byte.
fn secrets_match(provided: &str, expected: &str) -> bool {
    !provided.is_empty() && Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

fn quote_id(payload: &Value) -> String {
    QUOTE_ID_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(|value| match value {
            Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "unknown".to_string())
}
