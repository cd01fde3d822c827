#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quote_relay::upstream::{Upstream, UpstreamError, UpstreamResponse};
use quote_relay::{AppState, Config};
use serde_json::Value;

pub const FUNCTIONS: &str = "https://up.example/functions";
pub const QUOTE_BASE: &str = "https://up.example/functions/getPublicQuote";

#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// Canned platform answers keyed by URL; unknown URLs get an HTML 404.
#[derive(Clone, Default)]
pub struct FakePlatform {
    routes: Arc<HashMap<String, Result<UpstreamResponse, String>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(mut self, url: &str, answer: Result<UpstreamResponse, String>) -> Self {
        Arc::make_mut(&mut self.routes).insert(url.to_string(), answer);
        self
    }

    pub fn json(self, url: &str, status: u16, body: Value) -> Self {
        self.route(
            url,
            Ok(UpstreamResponse {
                status,
                content_type: Some("application/json".to_string()),
                body: body.to_string(),
            }),
        )
    }

    pub fn text(self, url: &str, status: u16, body: &str) -> Self {
        self.route(
            url,
            Ok(UpstreamResponse {
                status,
                content_type: Some("text/plain".to_string()),
                body: body.to_string(),
            }),
        )
    }

    pub fn down(self, url: &str) -> Self {
        self.route(url, Err("connection refused".to_string()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, method: &'static str, url: &str, body: Option<&Value>) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.lock().unwrap().push(Call { method, url: url.to_string(), body: body.cloned() });
        match self.routes.get(url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(UpstreamError::Transport(message.clone())),
            None => Ok(UpstreamResponse {
                status: 404,
                content_type: Some("text/html".to_string()),
                body: "<!doctype html><title>404</title>".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Upstream for FakePlatform {
    async fn get(&self, url: &str) -> Result<UpstreamResponse, UpstreamError> {
        self.answer("GET", url, None)
    }

    async fn post(&self, url: &str, body: Option<&Value>) -> Result<UpstreamResponse, UpstreamError> {
        self.answer("POST", url, body)
    }
}

pub fn config(pairs: &[(&str, &str)]) -> Config {
    let mut map: HashMap<String, String> = HashMap::from([
        ("BASE44_FUNCTIONS_BASE".to_string(), FUNCTIONS.to_string()),
        ("QUOTE_ENDPOINTS".to_string(), "getPublicQuote".to_string()),
        ("WEBHOOK_SECRET".to_string(), "hemligt".to_string()),
    ]);
    for (key, value) in pairs {
        map.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| map.get(key).cloned())
}

pub fn state(platform: &FakePlatform, config: Config) -> AppState {
    AppState::new(config, Box::new(platform.clone()))
}
