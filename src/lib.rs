//! Serverless handlers relaying quotes between a public quote page and the
//! quoting platform: PDF rendering by token, the platform webhook, and
//! accept/decline actions.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod money;
pub mod normalize;
pub mod rate_limit;
pub mod render;
pub mod reply;
pub mod resolver;
pub mod token;
pub mod upstream;

pub use config::Config;
pub use error::AppError;
pub use handlers::AppState;
pub use reply::{Inbound, Reply, ReplyBody};
