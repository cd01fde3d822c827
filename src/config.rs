use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_QUOTE_ENDPOINTS: &[&str] = &["getPublicQuote", "publicQuote"];
pub const DEFAULT_FORMAT_HINTS: &[&str] = &["format=json"];

const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 4_000;
const DEFAULT_RESOLVE_DEADLINE_MS: u64 = 9_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing env {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Settings for one function instance, read from the environment once.
#[derive(Debug, Clone)]
pub struct Config {
    pub functions_base: Option<String>,
    pub pdf_base: Option<String>,
    pub webhook_secret: Option<String>,
    pub quote_endpoints: Vec<String>,
    pub format_hints: Vec<String>,
    pub upstream_timeout: Duration,
    pub resolve_deadline: Duration,
    pub item_keys: Vec<String>,
    pub price_keys: Vec<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            functions_base: None,
            pdf_base: None,
            webhook_secret: None,
            quote_endpoints: DEFAULT_QUOTE_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            format_hints: DEFAULT_FORMAT_HINTS.iter().map(|s| s.to_string()).collect(),
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            resolve_deadline: Duration::from_millis(DEFAULT_RESOLVE_DEADLINE_MS),
            item_keys: Vec::new(),
            price_keys: Vec::new(),
            log_format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            functions_base: get("BASE44_FUNCTIONS_BASE").map(|base| trim_base(&base)),
            pdf_base: get("BASE44_PDF_URL").map(|base| trim_base(&base)),
            webhook_secret: get("WEBHOOK_SECRET"),
            quote_endpoints: get("QUOTE_ENDPOINTS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.quote_endpoints),
            format_hints: get("QUOTE_FORMAT_HINTS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.format_hints),
            upstream_timeout: millis(get("UPSTREAM_TIMEOUT_MS"), "UPSTREAM_TIMEOUT_MS")
                .unwrap_or(defaults.upstream_timeout),
            resolve_deadline: millis(get("RESOLVE_DEADLINE_MS"), "RESOLVE_DEADLINE_MS")
                .unwrap_or(defaults.resolve_deadline),
            item_keys: get("QUOTE_ITEM_KEYS").map(|raw| split_list(&raw)).unwrap_or_default(),
            price_keys: get("QUOTE_PRICE_KEYS").map(|raw| split_list(&raw)).unwrap_or_default(),
            log_format: match get("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Compact,
            },
        }
    }

    pub fn require_functions_base(&self) -> Result<&str, ConfigError> {
        self.functions_base
            .as_deref()
            .ok_or(ConfigError::Missing("BASE44_FUNCTIONS_BASE"))
    }

    pub fn require_pdf_base(&self) -> Result<&str, ConfigError> {
        self.pdf_base.as_deref().ok_or(ConfigError::Missing("BASE44_PDF_URL"))
    }

    pub fn require_webhook_secret(&self) -> Result<&str, ConfigError> {
        self.webhook_secret
            .as_deref()
            .ok_or(ConfigError::Missing("WEBHOOK_SECRET"))
    }

    /// Upstream bases the resolver probes, most specific first.
    pub fn quote_bases(&self) -> Vec<String> {
        let mut bases: Vec<String> = match &self.functions_base {
            Some(base) => self
                .quote_endpoints
                .iter()
                .map(|endpoint| format!("{base}/{}", endpoint.trim_matches('/')))
                .collect(),
            None => Vec::new(),
        };
        if let Some(pdf_base) = &self.pdf_base {
            if !bases.contains(pdf_base) {
                bases.push(pdf_base.clone());
            }
        }
        bases
    }
}

fn trim_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn millis(value: Option<String>, key: &str) -> Option<Duration> {
    let value = value?;
    match value.parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!(key, value = %value, "ignoring unparseable duration, using default");
            None
        }
    }
}
