//! Finds quote JSON on the platform by probing candidate URLs in a fixed order.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};
use urlencoding::encode;

use crate::config::Config;
use crate::normalize::{Aliases, pick, pick_array};
use crate::token::token_variants;
use crate::upstream::{Upstream, UpstreamResponse};

const ENVELOPE_KEYS: &[&str] = &["quote", "data", "result"];
const MAX_SEARCH_DEPTH: usize = 4;

/// Bases and format hints from which candidate URLs are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePlan {
    pub bases: Vec<String>,
    pub format_hints: Vec<String>,
}

impl CandidatePlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bases: config.quote_bases(),
            format_hints: config.format_hints.clone(),
        }
    }

    /// Query form before path form, raw token before the cleaned one,
    /// plain URLs before hinted ones.
    pub fn candidates(&self, token: &str) -> Vec<String> {
        let variants: Vec<String> = token_variants(token)
            .into_iter()
            .map(|variant| encode(variant).into_owned())
            .collect();

        let mut urls = Vec::new();
        for base in &self.bases {
            for variant in &variants {
                urls.push(with_query(base, &format!("token={variant}")));
                urls.push(format!("{base}/{variant}"));
            }
        }
        for hint in &self.format_hints {
            for base in &self.bases {
                for variant in &variants {
                    urls.push(with_query(&with_query(base, &format!("token={variant}")), hint));
                    urls.push(with_query(&format!("{base}/{variant}"), hint));
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        urls.retain(|url| seen.insert(url.clone()));
        urls
    }
}

fn with_query(url: &str, pair: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{pair}")
}

/// One probed candidate, kept verbatim for the diagnostic view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub url: String,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub json: bool,
    pub matched: bool,
    pub preview: Option<String>,
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

impl Attempt {
    fn failed(url: String, error: String, elapsed_ms: u128) -> Self {
        Self {
            url,
            status: None,
            content_type: None,
            json: false,
            matched: false,
            preview: None,
            error: Some(error),
            elapsed_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteMatch {
    pub url: String,
    pub quote: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub matched: Option<QuoteMatch>,
    pub tried: Vec<Attempt>,
}

impl Resolution {
    /// True when no candidate produced an HTTP response at all.
    pub fn unreachable(&self) -> bool {
        !self.tried.is_empty() && self.tried.iter().all(|attempt| attempt.status.is_none())
    }
}

pub struct Resolver<'a> {
    upstream: &'a dyn Upstream,
    plan: CandidatePlan,
    aliases: &'a Aliases,
    deadline: Duration,
}

impl<'a> Resolver<'a> {
    pub fn new(upstream: &'a dyn Upstream, plan: CandidatePlan, aliases: &'a Aliases, deadline: Duration) -> Self {
        Self { upstream, plan, aliases, deadline }
    }

    pub fn candidates(&self, token: &str) -> Vec<String> {
        self.plan.candidates(token)
    }

    /// Stops at the first candidate holding something quote-shaped.
    pub async fn resolve(&self, token: &str) -> Resolution {
        self.run(token, true).await
    }

    /// Tries every candidate; used by the diagnostic view.
    pub async fn probe_all(&self, token: &str) -> Resolution {
        self.run(token, false).await
    }

    async fn run(&self, token: &str, stop_on_match: bool) -> Resolution {
        let deadline = Instant::now() + self.deadline;
        let mut resolution = Resolution::default();

        for url in self.plan.candidates(token) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                resolution.tried.push(Attempt::failed(url, "deadline_exceeded".to_string(), 0));
                continue;
            }

            let started = Instant::now();
            let (attempt, found) = match timeout(remaining, self.upstream.get(&url)).await {
                Ok(Ok(response)) => self.inspect(url, response, started),
                Ok(Err(error)) => {
                    let elapsed = started.elapsed().as_millis();
                    (Attempt::failed(url, error.to_string(), elapsed), None)
                }
                Err(_) => {
                    let elapsed = started.elapsed().as_millis();
                    (Attempt::failed(url, "deadline_exceeded".to_string(), elapsed), None)
                }
            };

            debug!(
                url = %attempt.url,
                status = ?attempt.status,
                json = attempt.json,
                matched = attempt.matched,
                error = ?attempt.error,
                "upstream candidate tried"
            );

            let url = attempt.url.clone();
            resolution.tried.push(attempt);
            if let Some(quote) = found {
                if resolution.matched.is_none() {
                    info!(%url, tried = resolution.tried.len(), "quote resolved");
                    resolution.matched = Some(QuoteMatch { url, quote });
                }
                if stop_on_match {
                    break;
                }
            }
        }

        if resolution.matched.is_none() {
            warn!(token, tried = resolution.tried.len(), "no candidate returned a quote");
        }
        resolution
    }

    fn inspect(&self, url: String, response: UpstreamResponse, started: Instant) -> (Attempt, Option<Value>) {
        let mut attempt = Attempt {
            url,
            status: Some(response.status),
            content_type: response.content_type.clone(),
            json: false,
            matched: false,
            preview: Some(response.preview()),
            error: None,
            elapsed_ms: started.elapsed().as_millis(),
        };
        if !response.declares_json() {
            return (attempt, None);
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(value) => {
                attempt.json = true;
                let found = find_quote(&value, self.aliases).cloned();
                attempt.matched = found.is_some();
                (attempt, found)
            }
            Err(error) => {
                attempt.error = Some(format!("invalid_json: {error}"));
                (attempt, None)
            }
        }
    }
}

/// An object holding an item list or a total.
pub fn looks_like_quote(object: &Map<String, Value>, aliases: &Aliases) -> bool {
    pick_array(object, &aliases.items).is_some() || pick(object, &aliases.total).is_some()
}

/// The root, then the usual envelope keys, then any nested object.
pub fn find_quote<'v>(value: &'v Value, aliases: &Aliases) -> Option<&'v Value> {
    find_at(value, aliases, 0)
}

fn find_at<'v>(value: &'v Value, aliases: &Aliases, depth: usize) -> Option<&'v Value> {
    let object = value.as_object()?;
    if looks_like_quote(object, aliases) {
        return Some(value);
    }
    for key in ENVELOPE_KEYS {
        if let Some(inner) = object.get(*key) {
            if inner.as_object().is_some_and(|o| looks_like_quote(o, aliases)) {
                return Some(inner);
            }
        }
    }
    if depth >= MAX_SEARCH_DEPTH {
        return None;
    }
    object
        .values()
        .filter(|inner| inner.is_object())
        .find_map(|inner| find_at(inner, aliases, depth + 1))
}
