//! Skip ledger: why, when and how often entries were skipped
//!
//! Persisted across runs so a later `--retry-skipped` pass can target
//! exactly the entries that failed, and so operators can spot
//! systemic resolution problems (unknown ids vs. rate limits).

use crate::catalog::{utc_now_iso, write_json_atomic, Bucket};
use crate::error::Result;
use crate::providers::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Reason code recorded for a skipped entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoPrice,
    RateLimited,
    HttpError,
    NetworkError,
    Unauthorized,
    MarketHashMissing,
    InvalidItemKey,
    VariantRequiresOverride,
    UnknownItemId,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoPrice => "no_price",
            SkipReason::RateLimited => "rate_limited",
            SkipReason::HttpError => "http_error",
            SkipReason::NetworkError => "network_error",
            SkipReason::Unauthorized => "unauthorized",
            SkipReason::MarketHashMissing => "market_hash_missing",
            SkipReason::InvalidItemKey => "invalid_item_key",
            SkipReason::VariantRequiresOverride => "variant_requires_override",
            SkipReason::UnknownItemId => "unknown_item_id",
        }
    }
}

impl From<FetchError> for SkipReason {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NoPrice => SkipReason::NoPrice,
            FetchError::RateLimited => SkipReason::RateLimited,
            FetchError::HttpError => SkipReason::HttpError,
            FetchError::NetworkError => SkipReason::NetworkError,
            FetchError::Unauthorized => SkipReason::Unauthorized,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipEntry {
    pub reason: SkipReason,
    pub last_attempt_utc: String,
    pub count: u64,
}

/// Per-bucket skip records, persisted between runs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SkipLedger {
    #[serde(default)]
    pub cases: BTreeMap<String, SkipEntry>,
    #[serde(default)]
    pub keys: BTreeMap<String, SkipEntry>,
    #[serde(default)]
    pub items: BTreeMap<String, SkipEntry>,
}

impl SkipLedger {
    /// Load the ledger. Missing or malformed files start fresh with a
    /// warning; losing skip history is never worth failing a run.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(ledger) => ledger,
            Err(e) => {
                log::warn!(
                    "Skip ledger {} is malformed ({}); starting fresh",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &serde_json::to_value(self)?)
    }

    fn bucket(&self, bucket: Bucket) -> &BTreeMap<String, SkipEntry> {
        match bucket {
            Bucket::Cases => &self.cases,
            Bucket::Keys => &self.keys,
            Bucket::Items => &self.items,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut BTreeMap<String, SkipEntry> {
        match bucket {
            Bucket::Cases => &mut self.cases,
            Bucket::Keys => &mut self.keys,
            Bucket::Items => &mut self.items,
        }
    }

    /// Upsert a skip record: newest reason wins, attempt count grows.
    pub fn record_skip(&mut self, bucket: Bucket, id: &str, reason: SkipReason) {
        let entry = self
            .bucket_mut(bucket)
            .entry(id.to_string())
            .or_insert_with(|| SkipEntry {
                reason,
                last_attempt_utc: String::new(),
                count: 0,
            });
        entry.reason = reason;
        entry.last_attempt_utc = utc_now_iso();
        entry.count += 1;
    }

    /// Remove an entry after a successful resolution.
    pub fn clear_skip(&mut self, bucket: Bucket, id: &str) {
        self.bucket_mut(bucket).remove(id);
    }

    pub fn get(&self, bucket: Bucket, id: &str) -> Option<&SkipEntry> {
        self.bucket(bucket).get(id)
    }

    /// Entry ids currently recorded for a bucket, in sorted order.
    pub fn ids(&self, bucket: Bucket) -> Vec<String> {
        self.bucket(bucket).keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty() && self.keys.is_empty() && self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cases.len() + self.keys.len() + self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_skip_upserts_and_counts() {
        let mut ledger = SkipLedger::default();
        ledger.record_skip(Bucket::Items, "bad|key", SkipReason::InvalidItemKey);
        ledger.record_skip(Bucket::Items, "bad|key", SkipReason::NoPrice);

        let entry = ledger.get(Bucket::Items, "bad|key").unwrap();
        assert_eq!(entry.reason, SkipReason::NoPrice);
        assert_eq!(entry.count, 2);
        assert!(!entry.last_attempt_utc.is_empty());
    }

    #[test]
    fn clear_skip_removes_entry() {
        let mut ledger = SkipLedger::default();
        ledger.record_skip(Bucket::Cases, "case-a", SkipReason::RateLimited);
        assert!(!ledger.is_empty());

        ledger.clear_skip(Bucket::Cases, "case-a");
        assert!(ledger.is_empty());
        assert!(ledger.get(Bucket::Cases, "case-a").is_none());

        // Clearing an absent entry is a no-op.
        ledger.clear_skip(Bucket::Cases, "case-a");
    }

    #[test]
    fn buckets_are_independent() {
        let mut ledger = SkipLedger::default();
        ledger.record_skip(Bucket::Cases, "x", SkipReason::NoPrice);
        ledger.record_skip(Bucket::Keys, "x", SkipReason::HttpError);

        assert_eq!(ledger.get(Bucket::Cases, "x").unwrap().reason, SkipReason::NoPrice);
        assert_eq!(ledger.get(Bucket::Keys, "x").unwrap().reason, SkipReason::HttpError);
        assert!(ledger.get(Bucket::Items, "x").is_none());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("skip-ledger.json");

        let mut ledger = SkipLedger::default();
        ledger.record_skip(Bucket::Items, "a|Factory New|0|None", SkipReason::NoPrice);
        ledger.record_skip(Bucket::Cases, "case-a", SkipReason::UnknownItemId);
        ledger.save(&path).unwrap();

        let reloaded = SkipLedger::load(&path);
        assert_eq!(reloaded.len(), 2);
        let entry = reloaded.get(Bucket::Items, "a|Factory New|0|None").unwrap();
        assert_eq!(entry.reason, SkipReason::NoPrice);
        assert_eq!(entry.count, 1);
    }

    #[test]
    fn load_missing_or_malformed_starts_fresh() {
        let missing = SkipLedger::load(Path::new("/nonexistent/ledger.json"));
        assert!(missing.is_empty());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("skip-ledger.json");
        std::fs::write(&path, "{ broken").unwrap();
        let malformed = SkipLedger::load(&path);
        assert!(malformed.is_empty());
    }

    #[test]
    fn reason_codes_serialize_snake_case() {
        let json = serde_json::to_string(&SkipReason::VariantRequiresOverride).unwrap();
        assert_eq!(json, "\"variant_requires_override\"");
        assert_eq!(SkipReason::RateLimited.as_str(), "rate_limited");
    }
}
