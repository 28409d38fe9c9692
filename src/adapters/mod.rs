//! Outbound API adapters.
//!
//! Every adapter wraps one external surface with the same contract:
//! typed request in, `Result<T, AdapterError>` out, validation at the
//! boundary. Pacing between calls and the fixed 429 cooldown live in
//! `Throttle` so item-level retry accounting never sees a rate limit.

mod generation;
mod imagestore;
mod marketplace;
mod social;
mod throttle;

pub use generation::{GenerationClient, GenerationConfig};
pub use imagestore::{ImageStoreClient, ImageStoreConfig};
pub use marketplace::{MarketplaceClient, MarketplaceConfig, MarketplaceMatch};
pub use social::{SocialClient, SocialConfig};
pub use throttle::Throttle;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("rate limited, gave up after {0} cooldowns")]
    RateLimited(u32),
}

impl AdapterError {
    /// Whether retrying later could help. Client-side errors mean the
    /// request itself is wrong and will fail again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::RateLimited(_) => true,
            Self::Parse(_) => false,
            Self::Api { status, .. } => !(400..500).contains(status) || *status == 429,
        }
    }
}
