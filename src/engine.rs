//! The refresh engine: staleness gating, name resolution, two-pass
//! price lookup and catalog mutation
//!
//! Buckets are processed independently: cases, then keys, then items.
//! Within a bucket every stale entry is first checked against the
//! bulk board; only entries the dumps cannot answer go through the
//! live provider chain, paced by a randomized per-item delay.

use crate::bulk::BulkBoard;
use crate::catalog::{money_round, parse_iso_utc, utc_now_iso, Bucket, PriceCatalog};
use crate::config::Config;
use crate::fallback::Orchestrator;
use crate::ledger::{SkipLedger, SkipReason};
use crate::names::{build_market_hash, CaseIndex, ItemKey, Overrides};
use crate::ratelimit::{random_delay, sleep_seconds};
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-run flags from the CLI.
#[derive(Debug, Default, Clone)]
pub struct EngineOptions {
    pub dry_run: bool,
    pub force: bool,
    pub max_items: Option<usize>,
    pub retry_skipped: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BucketStats {
    /// Entries examined (truncation stops the count early).
    pub total: usize,
    /// Still within the staleness horizon; not looked up.
    pub fresh: usize,
    /// Price changed by at least one cent.
    pub updated: usize,
    /// Resolved to (effectively) the same price; timestamp bumped.
    pub unchanged: usize,
    /// Left untouched and recorded in the skip ledger.
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshStats {
    pub cases: BucketStats,
    pub keys: BucketStats,
    pub items: BucketStats,
}

impl RefreshStats {
    pub fn bucket(&self, bucket: Bucket) -> &BucketStats {
        match bucket {
            Bucket::Cases => &self.cases,
            Bucket::Keys => &self.keys,
            Bucket::Items => &self.items,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut BucketStats {
        match bucket {
            Bucket::Cases => &mut self.cases,
            Bucket::Keys => &mut self.keys,
            Bucket::Items => &mut self.items,
        }
    }

    pub fn total_updated(&self) -> usize {
        self.cases.updated + self.keys.updated + self.items.updated
    }

    pub fn total_skipped(&self) -> usize {
        self.cases.skipped + self.keys.skipped + self.items.skipped
    }
}

pub struct RefreshEngine {
    pub overrides: Overrides,
    pub case_index: CaseIndex,
    /// Key entry ids have no synthesizable market names; this table
    /// is the only source besides overrides.
    pub key_names: HashMap<String, String>,
    /// Variants that may be auto-prefixed without a manual override.
    pub auto_prefix: Vec<String>,
    pub preferred_order: Vec<String>,
    pub max_age_hours: f64,
    pub force_refresh: bool,
    pub always_refresh_at_or_below: f64,
    pub checkpoint_every_items: usize,
    pub item_delay_min: f64,
    pub item_delay_max: f64,
    pub prices_path: PathBuf,
    pub opts: EngineOptions,
}

impl RefreshEngine {
    pub fn new(
        config: &Config,
        overrides: Overrides,
        case_index: CaseIndex,
        opts: EngineOptions,
    ) -> Self {
        Self {
            overrides,
            case_index,
            key_names: config.providers.steam.key_market_hash_names.clone(),
            auto_prefix: config.providers.variant_handling.auto_prefix.clone(),
            preferred_order: config.providers.failover.preferred_order.clone(),
            max_age_hours: config.cache.effective_max_age_hours(),
            force_refresh: config.cache.force_refresh,
            always_refresh_at_or_below: config.cache.always_refresh_price_at_or_below,
            checkpoint_every_items: config.cache.checkpoint_every_items,
            item_delay_min: config.providers.item_delay_seconds_min,
            item_delay_max: config.providers.item_delay_seconds_max,
            prices_path: config.resolve(&config.paths.prices_json),
            opts,
        }
    }

    /// Refresh all three buckets. The catalog and ledger are mutated
    /// in memory; persisting them is the caller's business.
    pub fn run(
        &self,
        catalog: &mut PriceCatalog,
        ledger: &mut SkipLedger,
        bulk: &BulkBoard,
        orchestrator: &mut Orchestrator,
    ) -> RefreshStats {
        let mut stats = RefreshStats::default();

        if self.opts.retry_skipped && ledger.is_empty() {
            log::info!("Skip ledger is empty; nothing to retry");
            return stats;
        }

        let mut budget = self.opts.max_items;
        for bucket in Bucket::ALL {
            self.refresh_bucket(
                bucket,
                catalog,
                ledger,
                bulk,
                orchestrator,
                stats.bucket_mut(bucket),
                &mut budget,
            );
        }

        self.log_summary(&stats, orchestrator);
        stats
    }

    fn refresh_bucket(
        &self,
        bucket: Bucket,
        catalog: &mut PriceCatalog,
        ledger: &mut SkipLedger,
        bulk: &BulkBoard,
        orchestrator: &mut Orchestrator,
        stats: &mut BucketStats,
        budget: &mut Option<usize>,
    ) {
        let ids: Vec<String> = if self.opts.retry_skipped {
            ledger
                .ids(bucket)
                .into_iter()
                .filter(|id| catalog.price(bucket, id).is_some())
                .collect()
        } else {
            catalog.entry_ids(bucket)
        };

        log::info!("Refreshing {} ({} entries)", bucket, ids.len());

        // Pass 1: staleness gate, name resolution, bulk board.
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut processed = 0usize;
        for id in ids {
            stats.total += 1;
            if !self.opts.retry_skipped && !self.needs_refresh(catalog, bucket, &id) {
                stats.fresh += 1;
                continue;
            }
            if let Some(remaining) = budget {
                if *remaining == 0 {
                    log::info!("Item budget exhausted; stopping in {}", bucket);
                    break;
                }
                *remaining -= 1;
            }

            match self.market_name(bucket, &id) {
                Err(reason) => {
                    log::debug!("Skipping {} {}: {}", bucket, id, reason);
                    ledger.record_skip(bucket, &id, reason);
                    stats.skipped += 1;
                    processed += 1;
                    self.maybe_checkpoint(bucket, catalog, processed);
                }
                Ok(name) => match bulk.lookup(&name) {
                    Some(price) => {
                        self.apply(catalog, ledger, bucket, &id, price, "bulk", stats);
                        processed += 1;
                        self.maybe_checkpoint(bucket, catalog, processed);
                    }
                    None => pending.push((id, name)),
                },
            }
        }

        // Pass 2: whatever the dumps could not answer goes live.
        for (i, (id, name)) in pending.iter().enumerate() {
            if i > 0 {
                sleep_seconds(random_delay(self.item_delay_min, self.item_delay_max));
            }
            match orchestrator.resolve(name, bucket, Some(&self.preferred_order)) {
                Ok(resolved) => {
                    self.apply(
                        catalog,
                        ledger,
                        bucket,
                        id,
                        resolved.price,
                        &resolved.provider,
                        stats,
                    );
                }
                Err(e) => {
                    log::warn!("No price for {} {} ({:?}): {}", bucket, id, name, e);
                    ledger.record_skip(bucket, id, e.into());
                    stats.skipped += 1;
                }
            }
            processed += 1;
            self.maybe_checkpoint(bucket, catalog, processed);
        }
    }

    /// Whether this entry is due for a lookup.
    fn needs_refresh(&self, catalog: &PriceCatalog, bucket: Bucket, id: &str) -> bool {
        if self.opts.force || self.force_refresh {
            return true;
        }
        if let Some(price) = catalog.price(bucket, id) {
            if price <= self.always_refresh_at_or_below {
                return true;
            }
        }
        match catalog.updated_at(bucket, id).and_then(parse_iso_utc) {
            // Missing or unparseable timestamp means stale.
            None => true,
            Some(ts) => {
                let age_hours = (chrono::Utc::now() - ts).num_seconds() as f64 / 3600.0;
                age_hours >= self.max_age_hours
            }
        }
    }

    /// Resolve the marketplace-facing name for one entry.
    fn market_name(&self, bucket: Bucket, id: &str) -> Result<String, SkipReason> {
        if let Some(name) = self.overrides.get(bucket, id) {
            return Ok(name.to_string());
        }
        match bucket {
            Bucket::Cases => self
                .case_index
                .case_name(id)
                .map(str::to_string)
                .ok_or(SkipReason::MarketHashMissing),
            Bucket::Keys => self
                .key_names
                .get(id)
                .cloned()
                .ok_or(SkipReason::MarketHashMissing),
            Bucket::Items => {
                let key = ItemKey::parse(id).ok_or(SkipReason::InvalidItemKey)?;
                let display = self
                    .case_index
                    .display_name(&key.item_id)
                    .ok_or(SkipReason::UnknownItemId)?;
                let prefix = if key.has_real_variant() {
                    let allowed = self
                        .auto_prefix
                        .iter()
                        .any(|v| v.eq_ignore_ascii_case(&key.variant));
                    if !allowed {
                        return Err(SkipReason::VariantRequiresOverride);
                    }
                    Some(format!("{} ", key.variant))
                } else {
                    None
                };
                Ok(build_market_hash(
                    display,
                    &key.wear,
                    key.stattrak,
                    prefix.as_deref(),
                ))
            }
        }
    }

    /// Record a resolved price: a change of at least one cent updates
    /// the price, anything smaller only bumps the timestamp. Either
    /// way the skip ledger entry is cleared.
    fn apply(
        &self,
        catalog: &mut PriceCatalog,
        ledger: &mut SkipLedger,
        bucket: Bucket,
        id: &str,
        price: f64,
        source: &str,
        stats: &mut BucketStats,
    ) {
        let price = money_round(price);
        let old = catalog.price(bucket, id);
        let changed = match old {
            Some(old) => ((price - old).abs() * 100.0).round() >= 1.0,
            None => true,
        };
        if changed {
            log::info!(
                "{} {}: {} -> {} (via {})",
                bucket,
                id,
                old.map_or("none".to_string(), |p| format!("{:.2}", p)),
                price,
                source
            );
            catalog.set_price(bucket, id, price);
            stats.updated += 1;
        } else {
            stats.unchanged += 1;
        }
        catalog.set_updated_at(bucket, id, &utc_now_iso());
        ledger.clear_skip(bucket, id);
    }

    fn maybe_checkpoint(&self, bucket: Bucket, catalog: &PriceCatalog, processed: usize) {
        if bucket == Bucket::Items
            && !self.opts.dry_run
            && self.checkpoint_every_items > 0
            && processed % self.checkpoint_every_items == 0
        {
            catalog.checkpoint(&self.prices_path);
        }
    }

    fn log_summary(&self, stats: &RefreshStats, orchestrator: &Orchestrator) {
        for bucket in Bucket::ALL {
            let b = stats.bucket(bucket);
            log::info!(
                "{}: {} total, {} fresh, {} updated, {} unchanged, {} skipped",
                bucket,
                b.total,
                b.fresh,
                b.updated,
                b.unchanged,
                b.skipped
            );
        }
        for (name, ok, fail) in orchestrator.provider_counts() {
            log::info!("provider {}: {} ok, {} failed", name, ok, fail);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
