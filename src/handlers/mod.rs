pub mod actions;
pub mod pdf;
pub mod pdf_token;
pub mod webhook;

use crate::config::Config;
use crate::error::AppError;
use crate::money::Money;
use crate::normalize::Aliases;
use crate::rate_limit::RateLimiter;
use crate::resolver::{CandidatePlan, Resolver};
use crate::upstream::{HttpUpstream, Upstream};

pub const RATE_LIMIT_MESSAGE: &str = "För många förfrågningar. Var vänlig vänta.";

/// Everything a function instance keeps between invocations.
pub struct AppState {
    pub config: Config,
    pub upstream: Box<dyn Upstream>,
    pub aliases: Aliases,
    pub money: Money,
    pub document_limiter: RateLimiter,
    pub action_limiter: RateLimiter,
}

impl AppState {
    pub fn from_env() -> Result<Self, AppError> {
        let config = Config::from_env();
        let upstream = HttpUpstream::new(config.upstream_timeout)?;
        Ok(Self::new(config, Box::new(upstream)))
    }

    pub fn new(config: Config, upstream: Box<dyn Upstream>) -> Self {
        let aliases = Aliases::default().with_overrides(&config.item_keys, &config.price_keys);
        Self {
            config,
            upstream,
            aliases,
            money: Money::swedish(),
            document_limiter: RateLimiter::for_documents(),
            action_limiter: RateLimiter::for_actions(),
        }
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            self.upstream.as_ref(),
            CandidatePlan::from_config(&self.config),
            &self.aliases,
            self.config.resolve_deadline,
        )
    }
}
