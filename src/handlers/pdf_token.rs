//! `GET /pdf-token/{token}`: hand the browser straight to the platform's own PDF function.

use hyper::header::CACHE_CONTROL;
use hyper::{Method, StatusCode};
use serde_json::json;
use tracing::{info, warn};
use urlencoding::encode;

use super::AppState;
use crate::reply::{Inbound, Reply};
use crate::token::{clean_token, is_document_token};

pub async fn handle(state: &AppState, inbound: Inbound) -> Reply {
    if inbound.method != Method::GET {
        return Reply::method_not_allowed("GET");
    }

    let raw = inbound
        .query("token")
        .or_else(|| inbound.path_param("pdf-token"))
        .unwrap_or_default();
    if raw.is_empty() {
        return Reply::error(StatusCode::BAD_REQUEST, "missing_token");
    }
    if !is_document_token(&raw) {
        warn!(token = %raw, "rejected malformed token");
        return Reply::error(StatusCode::BAD_REQUEST, "invalid_token");
    }

    let base = match state.config.require_pdf_base() {
        Ok(base) => base,
        Err(missing) => return Reply::from(missing),
    };
    let clean = clean_token(&raw);
    let separator = if base.contains('?') { '&' } else { '?' };
    let url = format!("{base}{separator}token={}", encode(clean));

    if inbound.query("debug").as_deref() == Some("1") {
        return Reply::json(
            StatusCode::OK,
            json!({ "ok": true, "redirectTo": url, "rawToken": raw, "cleanToken": clean }),
        );
    }

    info!(token = %raw, redirect_to = %url, "redirecting to platform pdf");
    Reply::redirect(StatusCode::TEMPORARY_REDIRECT, &url).header(CACHE_CONTROL, "no-store")
}
