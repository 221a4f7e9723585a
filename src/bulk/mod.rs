//! Bulk price dumps and cross-source consensus
//!
//! Bulk dumps answer most lookups without a single per-item request.
//! Each source is cached on disk and refreshed on its own age policy;
//! the board aggregates whatever sources hold a given name and only
//! reports a price when enough of them agree one exists.

mod aggregator;
mod source;

pub use aggregator::aggregate;
pub use source::{load_all_sources, BulkSnapshot};

use crate::config::AggregatorConfig;

pub struct BulkBoard {
    snapshots: Vec<BulkSnapshot>,
    aggregator: AggregatorConfig,
}

impl BulkBoard {
    pub fn new(snapshots: Vec<BulkSnapshot>, aggregator: AggregatorConfig) -> Self {
        Self {
            snapshots,
            aggregator,
        }
    }

    pub fn source_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Consensus price for a market hash name, or `None` when fewer
    /// than `minSources` dumps carry it.
    pub fn lookup(&self, market_hash_name: &str) -> Option<f64> {
        let quotes: Vec<f64> = self
            .snapshots
            .iter()
            .filter_map(|s| s.price(market_hash_name))
            .collect();
        aggregate(&quotes, &self.aggregator)
    }
}
