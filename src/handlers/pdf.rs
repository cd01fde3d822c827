//! `GET /pdf/{token}`: resolve the quote upstream and answer with a PDF.

use hyper::header::{CACHE_CONTROL, CONTENT_DISPOSITION, HeaderName};
use hyper::{Method, StatusCode};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{AppState, RATE_LIMIT_MESSAGE};
use crate::config::ConfigError;
use crate::normalize::normalize;
use crate::rate_limit::{Decision, client_key};
use crate::render::render;
use crate::reply::{Inbound, Reply};
use crate::token::is_document_token;

pub const UPSTREAM_STATUS: HeaderName = HeaderName::from_static("x-upstream-status");

pub async fn handle(state: &AppState, inbound: Inbound) -> Reply {
    let request_id = Uuid::new_v4().to_string();

    if inbound.method != Method::GET {
        return Reply::method_not_allowed("GET");
    }

    let token = inbound
        .query("token")
        .or_else(|| inbound.path_param("pdf"))
        .unwrap_or_default();
    if !is_document_token(&token) {
        warn!(%request_id, token = %token, "rejected malformed token");
        return Reply::error(StatusCode::BAD_REQUEST, "invalid_token");
    }

    if let Decision::Limited { retry_after } = state.document_limiter.check(&client_key(&inbound.headers)) {
        warn!(%request_id, %token, "document rate limit hit");
        return Reply::rate_limited(
            json!({ "error": "rate_limited", "message": RATE_LIMIT_MESSAGE }),
            retry_after.as_secs(),
        );
    }

    let resolver = state.resolver();
    let candidates = resolver.candidates(&token);
    if candidates.is_empty() {
        error!(%request_id, "no upstream base configured");
        return Reply::from(ConfigError::Missing("BASE44_FUNCTIONS_BASE"));
    }

    if inbound.query("debug").as_deref() == Some("1") {
        let resolution = resolver.probe_all(&token).await;
        let normalized = normalize(resolution.matched.as_ref(), &state.aliases);
        info!(%request_id, %token, picked = resolution.matched.is_some(), "diagnostic probe finished");
        return Reply::json(
            StatusCode::OK,
            json!({
                "ok": true,
                "requestId": request_id,
                "token": token,
                "candidates": candidates.len(),
                "picked": resolution.matched.is_some(),
                "pickedUrl": resolution.matched.as_ref().map(|m| m.url.clone()),
                "tried": resolution.tried,
                "normalized": normalized,
            }),
        )
        .header(CACHE_CONTROL, "no-store");
    }

    let resolution = resolver.resolve(&token).await;
    let quote = normalize(resolution.matched.as_ref(), &state.aliases);

    let bytes = match render(&quote, &token, &state.money) {
        Ok(bytes) => bytes,
        Err(render_error) => {
            error!(%request_id, %token, error = %format!("{render_error:#}"), "pdf rendering failed");
            return Reply::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "render_failed", "message": format!("{render_error:#}"), "requestId": request_id }),
            );
        }
    };

    let name = if quote.has_number() { quote.number.as_str() } else { token.as_str() };
    let mut reply = Reply::pdf(bytes)
        .header(CONTENT_DISPOSITION, &format!("inline; filename=\"offer-{}.pdf\"", file_safe(name)))
        .header(CACHE_CONTROL, "no-store");

    if resolution.unreachable() {
        error!(%request_id, %token, tried = resolution.tried.len(), "upstream unreachable on every candidate, serving fallback document");
        reply = reply.header(UPSTREAM_STATUS, "unreachable");
    }

    info!(
        %request_id,
        %token,
        found = quote.found,
        items = quote.items.len(),
        matched_url = ?resolution.matched.as_ref().map(|m| m.url.as_str()),
        "pdf served"
    );
    reply
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '-' })
        .collect()
}
