//! idsfeed-config: Feed client configuration loaded from YAML

pub mod error;
pub mod feed;

pub use error::ConfigError;
pub use feed::{BackoffConfig, FeedConfig};
