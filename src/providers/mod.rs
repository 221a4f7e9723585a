//! Live per-item price providers
//!
//! Each adapter performs one rate-limited lookup per call and reports
//! failures through a shared taxonomy. Hard failures mean the
//! provider itself is malfunctioning or blocking us and feed the
//! cooldown state machine; a missing price for one item does not.

pub mod csfloat;
pub mod state;
pub mod steam;

pub use csfloat::CsfloatProvider;
pub use state::{epoch_now, ProviderState};
pub use steam::SteamProvider;

use crate::catalog::Bucket;

/// Provider failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP 429 from the provider.
    RateLimited,
    /// Any other HTTP error status.
    HttpError,
    /// Transport-level failure (DNS, connect, timeout).
    NetworkError,
    /// Missing or rejected credentials.
    Unauthorized,
    /// The provider answered but has no price for this item.
    NoPrice,
}

impl FetchError {
    /// Hard failures drive the cooldown state machine.
    pub fn is_hard(&self) -> bool {
        !matches!(self, FetchError::NoPrice)
    }

    /// Transient failures are worth retrying against the same
    /// provider; NoPrice and Unauthorized will not change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited | FetchError::HttpError | FetchError::NetworkError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchError::RateLimited => "rate_limited",
            FetchError::HttpError => "http_error",
            FetchError::NetworkError => "network_error",
            FetchError::Unauthorized => "unauthorized",
            FetchError::NoPrice => "no_price",
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currency a provider quotes in. USD quotes need the daily FX rate
/// and are disabled for the run when it is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteCurrency {
    Settlement,
    Usd,
}

/// A live per-item marketplace lookup. One network attempt per call;
/// the fallback orchestrator owns retries, backoff and failure
/// accounting.
pub trait LiveProvider {
    fn name(&self) -> &'static str;

    fn currency(&self) -> QuoteCurrency;

    /// Whether this provider is configured for the given bucket.
    fn supports(&self, bucket: Bucket) -> bool;

    /// Fetch the price for one market hash name, in the provider's
    /// quote currency. Blocks for rate limiting.
    fn fetch_once(&mut self, market_hash_name: &str) -> Result<f64, FetchError>;
}
