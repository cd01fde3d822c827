//! Accept/decline links from the public quote page, relayed to the platform.

use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use urlencoding::encode;

use super::{AppState, RATE_LIMIT_MESSAGE};
use crate::rate_limit::{Decision, client_key};
use crate::reply::{Inbound, Reply, decode_component};
use crate::token::is_action_token;

fn failure(status: StatusCode, error: &str) -> Reply {
    Reply::json(status, json!({ "ok": false, "error": error }))
}

/// Shared gatekeeping: token shape, rate limit, configured base.
fn admit<'s>(state: &'s AppState, inbound: &Inbound, token: &str) -> Result<&'s str, Reply> {
    if !is_action_token(token) {
        warn!(token = %token, "rejected malformed action token");
        return Err(failure(StatusCode::BAD_REQUEST, "invalid_token"));
    }
    if let Decision::Limited { retry_after } = state.action_limiter.check(&client_key(&inbound.headers)) {
        warn!(token = %token, "action rate limit hit");
        return Err(Reply::rate_limited(
            json!({ "ok": false, "error": "rate_limited", "message": RATE_LIMIT_MESSAGE }),
            retry_after.as_secs(),
        ));
    }
    state.config.require_functions_base().map_err(|missing| {
        error!(%missing, "action relay not configured");
        Reply::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "ok": false, "error": "missing_config", "message": missing.to_string() }),
        )
    })
}

/// `GET /api/publicAccept?token=…`, answered with a redirect to the status page.
pub async fn accept(state: &AppState, inbound: Inbound) -> Reply {
    if inbound.method != Method::GET {
        return failure(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed").header(ALLOW, "GET");
    }

    let token = inbound.query("token").unwrap_or_default();
    let base = match admit(state, &inbound, &token) {
        Ok(base) => base,
        Err(reply) => return reply,
    };

    let url = format!("{base}/publicAccept?token={}", encode(&token));
    let status = match state.upstream.post(&url, None).await {
        Ok(response) if response.is_success() => {
            info!(%token, "quote accepted");
            "accepted"
        }
        Ok(response) => {
            warn!(%token, status = response.status, body = %response.preview(), "platform refused accept");
            "error"
        }
        Err(transport) => {
            error!(%token, error = %transport, "accept relay failed");
            "error"
        }
    };

    Reply::redirect(
        StatusCode::FOUND,
        &format!("/accept/?status={status}&token={}", encode(&token)),
    )
}

/// `POST /api/publicDecline` with the token in a JSON or form body; the
/// platform's JSON answer is passed through.
pub async fn decline(state: &AppState, inbound: Inbound) -> Reply {
    if inbound.method != Method::POST {
        return failure(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed").header(ALLOW, "POST");
    }

    let token = body_token(&inbound).unwrap_or_default();
    let base = match admit(state, &inbound, &token) {
        Ok(base) => base,
        Err(reply) => return reply,
    };

    let url = format!("{base}/publicDecline");
    let response = match state.upstream.post(&url, Some(&json!({ "token": token }))).await {
        Ok(response) => response,
        Err(transport) => {
            error!(%token, error = %transport, "decline relay failed");
            return Reply::json(
                StatusCode::BAD_GATEWAY,
                json!({ "ok": false, "error": "upstream_unreachable", "message": transport.to_string() }),
            );
        }
    };

    match serde_json::from_str::<Value>(&response.body) {
        Ok(body) => {
            info!(%token, status = response.status, "decline relayed");
            Reply::json(StatusCode::OK, body)
        }
        Err(_) => {
            warn!(%token, status = response.status, "platform decline answer is not json");
            Reply::json(
                StatusCode::BAD_GATEWAY,
                json!({ "ok": false, "error": "upstream_not_json", "text": response.preview() }),
            )
        }
    }
}

fn body_token(inbound: &Inbound) -> Option<String> {
    let is_form = inbound
        .header(CONTENT_TYPE.as_str())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let body = std::str::from_utf8(&inbound.body).ok()?;
        return body.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "token").then(|| decode_component(value))
        });
    }

    let body: Value = serde_json::from_slice(&inbound.body).ok()?;
    match body.get("token")? {
        Value::String(token) => Some(token.clone()),
        _ => None,
    }
}
