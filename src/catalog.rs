//! Price catalog loading, mutation and atomic persistence
//!
//! The catalog file is a JSON object with `cases`, `keys` and `items`
//! price maps, a parallel `priceUpdatedAtUtc` timestamp bucket, and
//! arbitrary other metadata this service must carry through untouched.

use crate::error::{RefreshError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The three catalog buckets, always processed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Cases,
    Keys,
    Items,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Cases, Bucket::Keys, Bucket::Items];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Cases => "cases",
            Bucket::Keys => "keys",
            Bucket::Items => "items",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory price catalog. Mutated in place as entries resolve and
/// serialized wholesale on save.
#[derive(Debug, Default)]
pub struct PriceCatalog {
    cases: BTreeMap<String, f64>,
    keys: BTreeMap<String, f64>,
    items: BTreeMap<String, f64>,
    updated_cases: BTreeMap<String, String>,
    updated_keys: BTreeMap<String, String>,
    updated_items: BTreeMap<String, String>,
    /// All other top-level catalog metadata, passed through untouched.
    extra: BTreeMap<String, Value>,
}

impl PriceCatalog {
    /// Load and validate the catalog file. The three price buckets
    /// are required; their absence aborts before any mutation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(&content)?;
        Self::from_value(doc)
    }

    pub fn from_value(doc: Value) -> Result<Self> {
        let Value::Object(mut doc) = doc else {
            return Err(RefreshError::Schema(
                "catalog root must be a JSON object".to_string(),
            ));
        };

        for required in ["cases", "keys", "items"] {
            if !doc.contains_key(required) {
                return Err(RefreshError::Schema(format!(
                    "catalog is missing required key {:?}",
                    required
                )));
            }
        }

        let cases = take_price_bucket(&mut doc, "cases")?;
        let keys = take_price_bucket(&mut doc, "keys")?;
        let items = take_price_bucket(&mut doc, "items")?;

        let mut updated_cases = BTreeMap::new();
        let mut updated_keys = BTreeMap::new();
        let mut updated_items = BTreeMap::new();
        if let Some(bucket) = doc.remove("priceUpdatedAtUtc") {
            if let Value::Object(mut bucket) = bucket {
                updated_cases = take_timestamp_bucket(&mut bucket, "cases");
                updated_keys = take_timestamp_bucket(&mut bucket, "keys");
                updated_items = take_timestamp_bucket(&mut bucket, "items");
            }
        }

        Ok(Self {
            cases,
            keys,
            items,
            updated_cases,
            updated_keys,
            updated_items,
            extra: doc.into_iter().collect(),
        })
    }

    fn prices(&self, bucket: Bucket) -> &BTreeMap<String, f64> {
        match bucket {
            Bucket::Cases => &self.cases,
            Bucket::Keys => &self.keys,
            Bucket::Items => &self.items,
        }
    }

    fn prices_mut(&mut self, bucket: Bucket) -> &mut BTreeMap<String, f64> {
        match bucket {
            Bucket::Cases => &mut self.cases,
            Bucket::Keys => &mut self.keys,
            Bucket::Items => &mut self.items,
        }
    }

    fn timestamps(&self, bucket: Bucket) -> &BTreeMap<String, String> {
        match bucket {
            Bucket::Cases => &self.updated_cases,
            Bucket::Keys => &self.updated_keys,
            Bucket::Items => &self.updated_items,
        }
    }

    fn timestamps_mut(&mut self, bucket: Bucket) -> &mut BTreeMap<String, String> {
        match bucket {
            Bucket::Cases => &mut self.updated_cases,
            Bucket::Keys => &mut self.updated_keys,
            Bucket::Items => &mut self.updated_items,
        }
    }

    pub fn price(&self, bucket: Bucket, id: &str) -> Option<f64> {
        self.prices(bucket).get(id).copied()
    }

    pub fn set_price(&mut self, bucket: Bucket, id: &str, price: f64) {
        self.prices_mut(bucket).insert(id.to_string(), price);
    }

    pub fn updated_at(&self, bucket: Bucket, id: &str) -> Option<&str> {
        self.timestamps(bucket).get(id).map(String::as_str)
    }

    pub fn set_updated_at(&mut self, bucket: Bucket, id: &str, iso: &str) {
        self.timestamps_mut(bucket)
            .insert(id.to_string(), iso.to_string());
    }

    /// Entry ids for a bucket in deterministic (sorted) order.
    pub fn entry_ids(&self, bucket: Bucket) -> Vec<String> {
        self.prices(bucket).keys().cloned().collect()
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        self.prices(bucket).len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty() && self.keys.is_empty() && self.items.is_empty()
    }

    /// Serialize the whole catalog back into a JSON object, metadata
    /// included. Keys come out sorted.
    pub fn to_value(&self) -> Value {
        let mut doc: serde_json::Map<String, Value> = serde_json::Map::new();
        for (k, v) in &self.extra {
            doc.insert(k.clone(), v.clone());
        }
        doc.insert("cases".to_string(), price_map_to_value(&self.cases));
        doc.insert("keys".to_string(), price_map_to_value(&self.keys));
        doc.insert("items".to_string(), price_map_to_value(&self.items));

        let mut updated = serde_json::Map::new();
        updated.insert(
            "cases".to_string(),
            timestamp_map_to_value(&self.updated_cases),
        );
        updated.insert(
            "keys".to_string(),
            timestamp_map_to_value(&self.updated_keys),
        );
        updated.insert(
            "items".to_string(),
            timestamp_map_to_value(&self.updated_items),
        );
        doc.insert("priceUpdatedAtUtc".to_string(), Value::Object(updated));

        Value::Object(doc)
    }

    /// Atomic write: temp file in the same directory, then rename
    /// over the target.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.to_value())
    }

    /// Copy the current on-disk catalog to a timestamped backup next
    /// to it, returning the backup path.
    pub fn backup(path: &Path) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = PathBuf::from(format!("{}.backup.{}", path.display(), stamp));
        std::fs::copy(path, &backup_path)?;
        Ok(backup_path)
    }

    /// Mid-run checkpoint. Failure is logged, never fatal: losing a
    /// checkpoint only widens the crash window.
    pub fn checkpoint(&self, path: &Path) {
        match self.save_atomic(path) {
            Ok(()) => log::info!("Checkpoint saved: {}", path.display()),
            Err(e) => log::warn!("Checkpoint save failed: {}", e),
        }
    }
}

fn take_price_bucket(
    doc: &mut serde_json::Map<String, Value>,
    key: &str,
) -> Result<BTreeMap<String, f64>> {
    let Some(Value::Object(map)) = doc.remove(key) else {
        return Err(RefreshError::Schema(format!(
            "catalog key {:?} must be a JSON object",
            key
        )));
    };

    let mut out = BTreeMap::new();
    for (id, value) in map {
        let Some(price) = value.as_f64() else {
            return Err(RefreshError::Schema(format!(
                "catalog {}.{} is not a number",
                key, id
            )));
        };
        if price < 0.0 {
            return Err(RefreshError::Schema(format!(
                "catalog {}.{} is negative",
                key, id
            )));
        }
        out.insert(id, price);
    }
    Ok(out)
}

fn take_timestamp_bucket(
    bucket: &mut serde_json::Map<String, Value>,
    key: &str,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(map)) = bucket.remove(key) {
        for (id, value) in map {
            if let Value::String(ts) = value {
                out.insert(id, ts);
            }
        }
    }
    out
}

fn price_map_to_value(map: &BTreeMap<String, f64>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| {
                let num = serde_json::Number::from_f64(*v)
                    .unwrap_or_else(|| serde_json::Number::from(0));
                (k.clone(), Value::Number(num))
            })
            .collect(),
    )
}

fn timestamp_map_to_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Write a JSON value atomically: temp file, then rename over the
/// target. Output is pretty-printed with a trailing newline.
pub fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Current UTC time as an ISO-8601 string with second precision.
pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO-8601 timestamp, tolerating a trailing `Z`.
pub fn parse_iso_utc(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Round a settlement-currency amount to 2 decimals.
pub fn money_round(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
