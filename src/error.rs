use thiserror::Error;

use crate::upstream::UpstreamError;

/// Failures that stop a function instance from serving at all.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("upstream client: {0}")]
    Upstream(#[from] UpstreamError),
}
