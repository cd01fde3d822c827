use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use hyper::header::HeaderMap;

const PRUNE_THRESHOLD: usize = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request counter per client, local to one function instance.
#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self { max, window, clients: Mutex::new(HashMap::new()) }
    }

    /// 10 requests per 10 seconds.
    pub fn for_documents() -> Self {
        Self::new(10, Duration::from_secs(10))
    }

    /// 5 requests per minute.
    pub fn for_actions() -> Self {
        Self::new(5, Duration::from_secs(60))
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if clients.len() > PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, entry| now.saturating_duration_since(entry.started) < window);
        }

        let entry = clients
            .entry(key.to_string())
            .or_insert(Window { started: now, hits: 0 });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window { started: now, hits: 0 };
        }

        if entry.hits >= self.max {
            let elapsed = now.saturating_duration_since(entry.started);
            return Decision::Limited { retry_after: self.window.saturating_sub(elapsed) };
        }
        entry.hits += 1;
        Decision::Allowed { remaining: self.max - entry.hits }
    }
}

/// First forwarded address, then the real-ip header.
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| header("x-real-ip"))
        .unwrap_or("anonymous")
        .to_string()
}

#[cfg(test)]
mod tests {
    use hyper::header::HeaderValue;

    use super::*;

    #[test]
    fn limits_within_a_window_and_resets_after() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        assert_eq!(limiter.check_at("a", start), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at("a", start), Decision::Allowed { remaining: 0 });
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(4)),
            Decision::Limited { retry_after: Duration::from_secs(6) }
        );
        assert!(limiter.check_at("b", start).is_allowed());
        assert!(limiter.check_at("a", start + Duration::from_secs(10)).is_allowed());
    }

    #[test]
    fn action_limits_match_the_published_policy() {
        let limiter = RateLimiter::for_actions();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_at("ip", now).is_allowed());
        }
        assert!(!limiter.check_at("ip", now).is_allowed());
    }

    #[test]
    fn client_keys_prefer_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "anonymous");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_key(&headers), "10.0.0.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"));
        assert_eq!(client_key(&headers), "203.0.113.9");
    }
}
