use std::sync::LazyLock;

use regex::Regex;

pub const QUOTE_PREFIX: &str = "quote_";

static DOCUMENT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(quote_)?[A-Za-z0-9_-]{1,128}$").expect("document token pattern")
});

static ACTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^quote_[A-Za-z0-9_-]{6,}$").expect("action token pattern"));

/// Tokens accepted by the document endpoints.
pub fn is_document_token(token: &str) -> bool {
    DOCUMENT_TOKEN.is_match(token)
}

/// Accept/decline links always carry the `quote_` prefix.
pub fn is_action_token(token: &str) -> bool {
    ACTION_TOKEN.is_match(token)
}

/// Drops the `quote_` prefix and anything after the next `_`.
pub fn clean_token(raw: &str) -> &str {
    let stripped = raw.strip_prefix(QUOTE_PREFIX).unwrap_or(raw);
    stripped.split('_').next().unwrap_or(stripped)
}

/// Raw token first, then the cleaned form when it differs.
pub fn token_variants(raw: &str) -> Vec<&str> {
    let clean = clean_token(raw);
    if clean.is_empty() || clean == raw {
        vec![raw]
    } else {
        vec![raw, clean]
    }
}
