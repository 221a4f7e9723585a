//! Price Refresher - Collectible Catalog Pricing
//!
//! Keeps a priced catalog of collectible cases, keys and item variants
//! current by reconciling bulk marketplace price dumps against live
//! per-item lookups, with per-provider cooldown and retry handling.

pub mod bulk;
pub mod catalog;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod fx;
pub mod gitops;
pub mod ledger;
pub mod lock;
pub mod names;
pub mod providers;
pub mod ratelimit;

pub use catalog::{Bucket, PriceCatalog};
pub use config::Config;
pub use engine::{EngineOptions, RefreshEngine, RefreshStats};
pub use error::{RefreshError, Result};
pub use fallback::Orchestrator;
pub use ledger::{SkipLedger, SkipReason};
