mod support;

use hyper::header::{CACHE_CONTROL, CONTENT_DISPOSITION};
use hyper::{Method, StatusCode};
use quote_relay::handlers::pdf::{self, UPSTREAM_STATUS};
use quote_relay::money::Money;
use quote_relay::normalize::normalize;
use quote_relay::render::{Section, layout};
use quote_relay::{Inbound, ReplyBody};
use serde_json::json;

use support::{FakePlatform, QUOTE_BASE, config, state};

fn paint_quote() -> serde_json::Value {
    json!({
        "quote": {
            "number": "Q-1",
            "items": [{"name": "Paint", "quantity": 2, "unitPrice": 150}],
            "vat": 30
        }
    })
}

#[tokio::test]
async fn resolved_quote_renders_computed_totals() {
    let platform = FakePlatform::new().json(&format!("{QUOTE_BASE}?token=quote_XYZ789"), 200, paint_quote());
    let state = state(&platform, config(&[]));

    let resolution = state.resolver().resolve("quote_XYZ789").await;
    let quote = normalize(resolution.matched.as_ref(), &state.aliases);
    let page = layout(&quote, "quote_XYZ789", &Money::swedish());

    assert_eq!(quote.subtotal, 300.0);
    assert_eq!(quote.vat, 30.0);
    assert_eq!(quote.total, 330.0);
    assert_eq!(
        page.texts(Section::Totals),
        vec!["Delsumma", "300,00 kr", "Moms", "30,00 kr", "Totalt", "330,00 kr"]
    );
    assert_eq!(page.texts(Section::ItemRow), vec!["Paint", "x2", "150,00 kr", "300,00 kr"]);
    assert!(page.texts(Section::Fallback).is_empty());
}

#[tokio::test]
async fn pdf_endpoint_serves_inline_document() {
    let platform = FakePlatform::new().json(&format!("{QUOTE_BASE}?token=quote_XYZ789"), 200, paint_quote());
    let state = state(&platform, config(&[]));

    let reply = pdf::handle(&state, Inbound::get("/api/pdf?token=quote_XYZ789")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.header_value(&CONTENT_DISPOSITION),
        Some("inline; filename=\"offer-Q-1.pdf\"")
    );
    assert_eq!(reply.header_value(&CACHE_CONTROL), Some("no-store"));
    assert_eq!(reply.header_value(&UPSTREAM_STATUS), None);
    match &reply.body {
        ReplyBody::Pdf(bytes) => assert!(bytes.starts_with(b"%PDF")),
        other => panic!("expected a pdf, got {other:?}"),
    }
    assert_eq!(platform.calls().len(), 1);
}

#[tokio::test]
async fn misses_everywhere_still_serve_a_fallback_document() {
    let platform = FakePlatform::new();
    let state = state(&platform, config(&[]));

    let reply = pdf::handle(&state, Inbound::get("/pdf/abc123")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.header_value(&CONTENT_DISPOSITION),
        Some("inline; filename=\"offer-abc123.pdf\"")
    );
    assert!(matches!(reply.body, ReplyBody::Pdf(_)));
    assert_eq!(platform.calls().len(), state.resolver().candidates("abc123").len());

    let resolution = state.resolver().resolve("abc123").await;
    let quote = normalize(resolution.matched.as_ref(), &state.aliases);
    let page = layout(&quote, "abc123", &Money::swedish());
    assert!(page.texts(Section::Fallback)[0].contains("abc123"));
    assert_eq!(
        page.texts(Section::Totals),
        vec!["Delsumma", "0,00 kr", "Moms", "0,00 kr", "Totalt", "0,00 kr"]
    );
}

#[tokio::test]
async fn unreachable_platform_is_flagged() {
    let mut platform = FakePlatform::new();
    let state_for_candidates = state(&platform, config(&[]));
    for url in state_for_candidates.resolver().candidates("abc123") {
        platform = platform.down(&url);
    }
    let state = state(&platform, config(&[]));

    let reply = pdf::handle(&state, Inbound::get("/api/pdf?token=abc123")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header_value(&UPSTREAM_STATUS), Some("unreachable"));
}

#[tokio::test]
async fn debug_mode_lists_every_candidate() {
    let platform = FakePlatform::new().json(&format!("{QUOTE_BASE}/abc123"), 200, json!({"total": 100, "items": []}));
    let state = state(&platform, config(&[]));
    let expected = state.resolver().candidates("abc123");

    let reply = pdf::handle(&state, Inbound::get("/api/pdf?token=abc123&debug=1")).await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json_body().expect("json body");
    assert_eq!(body["tried"].as_array().unwrap().len(), expected.len());
    assert_eq!(body["candidates"], expected.len());
    assert_eq!(body["picked"], true);
    assert_eq!(body["pickedUrl"], format!("{QUOTE_BASE}/abc123"));
    assert_eq!(body["tried"][0]["url"], format!("{QUOTE_BASE}?token=abc123"));
    assert_eq!(body["tried"][0]["status"], 404);
    assert_eq!(body["normalized"]["total"], 100.0);
}

#[tokio::test]
async fn debug_mode_reports_no_pick() {
    let platform = FakePlatform::new();
    let state = state(&platform, config(&[]));

    let reply = pdf::handle(&state, Inbound::get("/pdf/quote_XYZ789?debug=1")).await;

    let body = reply.json_body().expect("json body");
    assert_eq!(body["picked"], false);
    assert!(body["pickedUrl"].is_null());
    assert_eq!(
        body["tried"].as_array().unwrap().len(),
        state.resolver().candidates("quote_XYZ789").len()
    );
}

#[tokio::test]
async fn malformed_tokens_never_reach_the_platform() {
    let platform = FakePlatform::new();
    let state = state(&platform, config(&[]));

    for uri in ["/api/pdf", "/api/pdf?token=", "/api/pdf?token=a%2Fb", "/pdf/has%20space"] {
        let reply = pdf::handle(&state, Inbound::get(uri)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(reply.json_body().unwrap()["error"], "invalid_token");
    }
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn only_get_is_allowed() {
    let platform = FakePlatform::new();
    let state = state(&platform, config(&[]));

    let reply = pdf::handle(&state, Inbound::new(Method::POST, "/api/pdf?token=abc123", "")).await;

    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.header_value(&hyper::header::ALLOW), Some("GET"));
}

#[tokio::test]
async fn missing_upstream_configuration_is_a_500() {
    let platform = FakePlatform::new();
    let state = state(&platform, config(&[("BASE44_FUNCTIONS_BASE", "")]));

    let reply = pdf::handle(&state, Inbound::get("/api/pdf?token=abc123")).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json_body().unwrap()["error"], "missing_config");
}

#[tokio::test]
async fn pdf_base_alone_is_enough() {
    let pdf_base = "https://up.example/functions/quotePdf";
    let platform = FakePlatform::new().json(&format!("{pdf_base}?token=abc123"), 200, json!({"items": []}));
    let state = state(
        &platform,
        config(&[("BASE44_FUNCTIONS_BASE", ""), ("BASE44_PDF_URL", pdf_base)]),
    );

    let reply = pdf::handle(&state, Inbound::get("/api/pdf?token=abc123")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(platform.calls()[0].url, format!("{pdf_base}?token=abc123"));
}

#[tokio::test]
async fn documents_are_rate_limited_per_client() {
    let platform = FakePlatform::new().json(&format!("{QUOTE_BASE}?token=abc123"), 200, json!({"total": 1}));
    let state = state(&platform, config(&[]));
    let request = || Inbound::get("/api/pdf?token=abc123").with_header("x-forwarded-for", "198.51.100.7");

    for _ in 0..10 {
        assert_eq!(pdf::handle(&state, request()).await.status, StatusCode::OK);
    }
    let limited = pdf::handle(&state, request()).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json_body().unwrap()["error"], "rate_limited");

    let other = Inbound::get("/api/pdf?token=abc123").with_header("x-forwarded-for", "198.51.100.8");
    assert_eq!(pdf::handle(&state, other).await.status, StatusCode::OK);
}
