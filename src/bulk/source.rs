//! Bulk dump download and on-disk caching
//!
//! A dump is re-downloaded only when its cache file is older than the
//! configured horizon. A failed download falls back to a stale cache
//! rather than dropping the source for the run.

use crate::catalog::money_round;
use crate::config::{BulkSourceConfig, Config, DumpCurrency, DumpFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// One parsed dump, prices already in the settlement currency.
pub struct BulkSnapshot {
    name: String,
    prices: HashMap<String, f64>,
}

impl BulkSnapshot {
    pub fn from_entries(name: &str, prices: HashMap<String, f64>) -> Self {
        Self {
            name: name.to_string(),
            prices,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn price(&self, market_hash_name: &str) -> Option<f64> {
        self.prices.get(market_hash_name).copied()
    }
}

#[derive(Debug, Deserialize)]
struct SkinportItem {
    #[serde(default)]
    market_hash_name: Option<String>,
    #[serde(default)]
    min_price: Option<f64>,
    #[serde(default)]
    suggested_price: Option<f64>,
}

/// Load every enabled bulk source named in the config: the built-in
/// Skinport dump plus any `extraSources`. Sources that cannot be
/// loaded are simply absent this run.
pub fn load_all_sources(config: &Config, fx_usd_cad: Option<f64>) -> Vec<BulkSnapshot> {
    let client = match reqwest::blocking::Client::builder()
        .user_agent(config.http.user_agent.clone())
        .timeout(Duration::from_secs(config.http.timeout_seconds))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Cannot build HTTP client for bulk sources: {}", e);
            return Vec::new();
        }
    };

    let cache_dir = config.resolve(&config.paths.bulk_cache_dir);
    let max_age_hours = config.providers.bulk_cache.max_age_hours;

    let mut specs = Vec::new();
    if config.providers.skinport.enabled {
        specs.push(BulkSourceConfig {
            name: "skinport".to_string(),
            url: config.providers.skinport.url.clone(),
            format: DumpFormat::Skinport,
            currency: DumpCurrency::Usd,
            enabled: true,
        });
    }
    specs.extend(
        config
            .providers
            .bulk_cache
            .extra_sources
            .iter()
            .filter(|s| s.enabled)
            .cloned(),
    );

    let mut snapshots = Vec::new();
    for spec in &specs {
        if let Some(snapshot) = load_source(&client, spec, &cache_dir, max_age_hours, fx_usd_cad) {
            log::info!("Bulk source {} loaded ({} names)", snapshot.name(), snapshot.len());
            snapshots.push(snapshot);
        }
    }
    snapshots
}

/// Load one source, preferring a fresh cache file over the network.
pub fn load_source(
    client: &reqwest::blocking::Client,
    spec: &BulkSourceConfig,
    cache_dir: &Path,
    max_age_hours: f64,
    fx_usd_cad: Option<f64>,
) -> Option<BulkSnapshot> {
    if spec.currency == DumpCurrency::Usd && fx_usd_cad.is_none() {
        log::warn!(
            "Bulk source {} quotes in USD but no FX rate is available; disabled this run",
            spec.name
        );
        return None;
    }

    let cache_path = cache_dir.join(format!("{}.json", spec.name));

    let body = if cache_age_hours(&cache_path).is_some_and(|age| age < max_age_hours) {
        log::debug!("Bulk source {}: reusing fresh cache", spec.name);
        std::fs::read_to_string(&cache_path).ok()?
    } else {
        match download(client, &spec.url) {
            Ok(body) => {
                if let Err(e) = write_cache(&cache_path, &body) {
                    log::warn!("Cannot cache bulk dump {}: {}", spec.name, e);
                }
                body
            }
            Err(e) => {
                if cache_path.exists() {
                    log::warn!(
                        "Bulk source {} download failed ({}); using stale cache",
                        spec.name,
                        e
                    );
                    std::fs::read_to_string(&cache_path).ok()?
                } else {
                    log::warn!("Bulk source {} unavailable: {}", spec.name, e);
                    return None;
                }
            }
        }
    };

    let mut prices = match parse_dump(&body, spec.format) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("Bulk source {} dump did not parse: {}", spec.name, e);
            return None;
        }
    };

    if spec.currency == DumpCurrency::Usd {
        // Checked above: a USD source without a rate never gets here.
        let rate = fx_usd_cad.unwrap_or(1.0);
        for value in prices.values_mut() {
            *value = money_round(*value * rate);
        }
    }

    Some(BulkSnapshot::from_entries(&spec.name, prices))
}

fn cache_age_hours(path: &Path) -> Option<f64> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let age = modified.elapsed().ok()?;
    Some(age.as_secs_f64() / 3600.0)
}

fn download(client: &reqwest::blocking::Client, url: &str) -> Result<String, String> {
    let response = client.get(url).send().map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status));
    }
    response.text().map_err(|e| e.to_string())
}

fn write_cache(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}

fn parse_dump(body: &str, format: DumpFormat) -> Result<HashMap<String, f64>, serde_json::Error> {
    let mut prices = HashMap::new();
    match format {
        DumpFormat::Skinport => {
            let items: Vec<SkinportItem> = serde_json::from_str(body)?;
            for item in items {
                let name = match item.market_hash_name {
                    Some(n) if !n.is_empty() => n,
                    _ => continue,
                };
                let price = item.min_price.or(item.suggested_price);
                if let Some(p) = price.filter(|p| *p > 0.0) {
                    prices.insert(name, p);
                }
            }
        }
        DumpFormat::Flat => {
            let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(body)?;
            for (name, value) in map {
                if let Some(p) = value.as_f64().filter(|p| *p > 0.0) {
                    prices.insert(name, p);
                }
            }
        }
    }
    Ok(prices)
}
