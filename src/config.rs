//! Typed configuration for the refresher
//!
//! The whole run is driven by a single JSON document. Every recognized
//! option is an explicit field with a default; unknown fields are
//! rejected at load time so typos fail the run up front instead of
//! mid-refresh.

use crate::error::{RefreshError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PathsConfig {
    /// Base directory all other paths are resolved against.
    /// Defaults to the config file's parent directory.
    #[serde(default)]
    pub base: Option<PathBuf>,
    #[serde(default = "default_prices_json")]
    pub prices_json: String,
    #[serde(default = "default_case_odds_dir")]
    pub case_odds_dir: String,
    #[serde(default = "default_overrides_json")]
    pub overrides_json: String,
    #[serde(default = "default_skip_ledger_json")]
    pub skip_ledger_json: String,
    #[serde(default = "default_lock_file")]
    pub lock_file: String,
    #[serde(default = "default_bulk_cache_dir")]
    pub bulk_cache_dir: String,
    #[serde(default)]
    pub secrets_json: Option<String>,
    #[serde(default = "default_daemon_state_json")]
    pub daemon_state_json: String,
}

fn default_prices_json() -> String {
    "data/prices.json".to_string()
}
fn default_case_odds_dir() -> String {
    "data/case-odds".to_string()
}
fn default_overrides_json() -> String {
    "data/price-overrides.json".to_string()
}
fn default_skip_ledger_json() -> String {
    "data/skip-ledger.json".to_string()
}
fn default_lock_file() -> String {
    "data/price-refresher.lock".to_string()
}
fn default_bulk_cache_dir() -> String {
    "data/bulk-cache".to_string()
}
fn default_daemon_state_json() -> String {
    "data/daemon-state.json".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

fn default_user_agent() -> String {
    "price_refresher/1.0".to_string()
}
fn default_http_timeout() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: default_http_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub steam: SteamConfig,
    #[serde(default)]
    pub csfloat: CsfloatConfig,
    #[serde(default)]
    pub fx: FxConfig,
    #[serde(default)]
    pub skinport: SkinportConfig,
    #[serde(default)]
    pub bulk_cache: BulkCacheConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub variant_handling: VariantHandlingConfig,
    #[serde(default)]
    pub rotation_mode: RotationMode,
    #[serde(default = "default_true")]
    pub fallback_on_failure: bool,
    #[serde(default = "default_skip_rounds")]
    pub skip_rounds_on_failure: u32,
    #[serde(default = "default_item_delay_min")]
    pub item_delay_seconds_min: f64,
    #[serde(default = "default_item_delay_max")]
    pub item_delay_seconds_max: f64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            steam: SteamConfig::default(),
            csfloat: CsfloatConfig::default(),
            fx: FxConfig::default(),
            skinport: SkinportConfig::default(),
            bulk_cache: BulkCacheConfig::default(),
            aggregator: AggregatorConfig::default(),
            failover: FailoverConfig::default(),
            variant_handling: VariantHandlingConfig::default(),
            rotation_mode: RotationMode::default(),
            fallback_on_failure: default_true(),
            skip_rounds_on_failure: default_skip_rounds(),
            item_delay_seconds_min: default_item_delay_min(),
            item_delay_seconds_max: default_item_delay_max(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_skip_rounds() -> u32 {
    1
}
fn default_item_delay_min() -> f64 {
    1.0
}
fn default_item_delay_max() -> f64 {
    3.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SteamConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_steam_appid")]
    pub appid: u32,
    /// Steam currency code (20 = CAD)
    #[serde(default = "default_steam_currency")]
    pub currency: u32,
    #[serde(default = "default_steam_delay")]
    pub delay_seconds: f64,
    #[serde(default = "default_true")]
    pub use_for_cases: bool,
    #[serde(default = "default_true")]
    pub use_for_keys: bool,
    #[serde(default = "default_true")]
    pub use_for_items: bool,
    /// Explicit key id -> market hash name mapping (keys have no
    /// synthesizable names).
    #[serde(default)]
    pub key_market_hash_names: HashMap<String, String>,
}

fn default_steam_appid() -> u32 {
    730
}
fn default_steam_currency() -> u32 {
    20
}
fn default_steam_delay() -> f64 {
    3.0
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            appid: default_steam_appid(),
            currency: default_steam_currency(),
            delay_seconds: default_steam_delay(),
            use_for_cases: true,
            use_for_keys: true,
            use_for_items: true,
            key_market_hash_names: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CsfloatConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_csfloat_delay")]
    pub delay_seconds: f64,
    /// Environment variable consulted for the API key when the
    /// secrets file has none.
    #[serde(default = "default_csfloat_env_var")]
    pub api_key_env_var: String,
    /// Discouraged: keys in config leak into version control. Prefer
    /// the secrets file or the environment variable.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub use_for_cases: bool,
    #[serde(default = "default_true")]
    pub use_for_keys: bool,
    #[serde(default = "default_true")]
    pub use_for_items: bool,
}

fn default_csfloat_delay() -> f64 {
    1.5
}
fn default_csfloat_env_var() -> String {
    "CSFLOAT_API_KEY".to_string()
}

impl Default for CsfloatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_seconds: default_csfloat_delay(),
            api_key_env_var: default_csfloat_env_var(),
            api_key: String::new(),
            use_for_cases: true,
            use_for_keys: true,
            use_for_items: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FxConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SkinportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_skinport_url")]
    pub url: String,
}

fn default_skinport_url() -> String {
    "https://api.skinport.com/v1/items?app_id=730&currency=USD".to_string()
}

impl Default for SkinportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_skinport_url(),
        }
    }
}

/// Shared policy for all bulk dump caches, plus any additional dump
/// sources beyond the built-in Skinport one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkCacheConfig {
    #[serde(default = "default_bulk_max_age")]
    pub max_age_hours: f64,
    #[serde(default)]
    pub extra_sources: Vec<BulkSourceConfig>,
}

fn default_bulk_max_age() -> f64 {
    12.0
}

impl Default for BulkCacheConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_bulk_max_age(),
            extra_sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub format: DumpFormat,
    #[serde(default)]
    pub currency: DumpCurrency,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DumpFormat {
    /// Skinport-style array of objects with `market_hash_name` and
    /// `min_price`/`suggested_price` fields.
    #[default]
    #[serde(rename = "skinport")]
    Skinport,
    /// Flat JSON object of `market_hash_name -> price`.
    #[serde(rename = "flat")]
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum DumpCurrency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "CAD")]
    Cad,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AggregatorConfig {
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,
    #[serde(default)]
    pub method: AggregateMethod,
    #[serde(default = "default_clamp_min")]
    pub clamp_min: f64,
    #[serde(default = "default_clamp_max")]
    pub clamp_max: f64,
}

fn default_min_sources() -> usize {
    2
}
fn default_clamp_min() -> f64 {
    0.01
}
fn default_clamp_max() -> f64 {
    25_000.0
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_sources: default_min_sources(),
            method: AggregateMethod::default(),
            clamp_min: default_clamp_min(),
            clamp_max: default_clamp_max(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateMethod {
    #[default]
    Median,
    Mean,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FailoverConfig {
    #[serde(default = "default_fail_threshold")]
    pub consecutive_hard_failures: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: f64,
    /// Explicit provider order used on the fallback pass after a bulk
    /// lookup came up empty.
    #[serde(default = "default_preferred_order")]
    pub preferred_order: Vec<String>,
}

fn default_fail_threshold() -> u32 {
    3
}
fn default_cooldown() -> f64 {
    120.0
}
fn default_preferred_order() -> Vec<String> {
    vec!["steam".to_string(), "csfloat".to_string()]
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            consecutive_hard_failures: default_fail_threshold(),
            cooldown_seconds: default_cooldown(),
            preferred_order: default_preferred_order(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VariantHandlingConfig {
    /// Variants that may be auto-prefixed onto the market hash name
    /// without a manual override (e.g. "Souvenir").
    #[serde(default = "default_auto_prefix")]
    pub auto_prefix: Vec<String>,
}

fn default_auto_prefix() -> Vec<String> {
    vec!["Souvenir".to_string()]
}

impl Default for VariantHandlingConfig {
    fn default() -> Self {
        Self {
            auto_prefix: default_auto_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RotationMode {
    #[default]
    RoundRobin,
    Fixed,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default)]
    pub retries: RetriesConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetriesConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff")]
    pub backoff_seconds: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff() -> f64 {
    5.0
}

impl Default for RetriesConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_seconds: default_backoff(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: f64,
    /// Takes precedence over maxAgeHours when present.
    #[serde(default)]
    pub max_age_days: Option<f64>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every_items: usize,
    /// Entries at or below this price are always considered stale.
    #[serde(default)]
    pub always_refresh_price_at_or_below: f64,
}

fn default_max_age_hours() -> f64 {
    168.0
}
fn default_checkpoint_every() -> usize {
    250
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
            max_age_days: None,
            force_refresh: false,
            checkpoint_every_items: default_checkpoint_every(),
            always_refresh_price_at_or_below: 0.0,
        }
    }
}

impl CacheConfig {
    /// Effective staleness horizon in hours (days take precedence).
    pub fn effective_max_age_hours(&self) -> f64 {
        match self.max_age_days {
            Some(days) => days * 24.0,
            None => self.max_age_hours,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_days")]
    pub days_of_week: Vec<String>,
    #[serde(default = "default_schedule_time")]
    pub time: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: f64,
    #[serde(default = "default_true")]
    pub boot_time_refresh: bool,
}

fn default_days() -> Vec<String> {
    vec!["sunday".to_string()]
}
fn default_schedule_time() -> String {
    "03:00".to_string()
}
fn default_check_interval() -> f64 {
    30.0
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            days_of_week: default_days(),
            time: default_schedule_time(),
            check_interval_seconds: default_check_interval(),
            boot_time_refresh: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    /// Load and validate a config file. The base path defaults to the
    /// config file's parent directory when not set explicitly.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RefreshError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| RefreshError::Config(format!("invalid config JSON: {}", e)))?;

        if config.paths.base.is_none() {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            config.paths.base = Some(parent.to_path_buf());
        }

        config.validate()?;
        Ok(config)
    }

    /// Sanity-check option ranges up front so bad values fail the run
    /// before any network or disk work starts.
    pub fn validate(&self) -> Result<()> {
        let p = &self.providers;
        if p.failover.consecutive_hard_failures < 1 {
            return Err(RefreshError::Config(
                "providers.failover.consecutiveHardFailures must be >= 1".to_string(),
            ));
        }
        if p.failover.cooldown_seconds < 10.0 {
            return Err(RefreshError::Config(
                "providers.failover.cooldownSeconds must be >= 10".to_string(),
            ));
        }
        if p.aggregator.min_sources < 1 {
            return Err(RefreshError::Config(
                "providers.aggregator.minSources must be >= 1".to_string(),
            ));
        }
        if p.aggregator.clamp_min >= p.aggregator.clamp_max {
            return Err(RefreshError::Config(
                "providers.aggregator.clampMin must be below clampMax".to_string(),
            ));
        }
        if p.item_delay_seconds_min > p.item_delay_seconds_max {
            return Err(RefreshError::Config(
                "providers.itemDelaySecondsMin must not exceed itemDelaySecondsMax".to_string(),
            ));
        }
        if p.item_delay_seconds_min < 0.0 {
            return Err(RefreshError::Config(
                "providers.itemDelaySecondsMin must be >= 0".to_string(),
            ));
        }
        if self.api.retries.max_attempts < 1 {
            return Err(RefreshError::Config(
                "api.retries.maxAttempts must be >= 1".to_string(),
            ));
        }
        if self.api.retries.backoff_seconds < 0.0 {
            return Err(RefreshError::Config(
                "api.retries.backoffSeconds must be >= 0".to_string(),
            ));
        }
        if self.cache.effective_max_age_hours() <= 0.0 {
            return Err(RefreshError::Config(
                "cache.maxAgeHours/maxAgeDays must be positive".to_string(),
            ));
        }
        if !valid_hhmm(&self.schedule.time) {
            return Err(RefreshError::Config(format!(
                "schedule.time must be HH:MM, got {:?}",
                self.schedule.time
            )));
        }
        Ok(())
    }

    /// Base directory for all relative paths. `load()` guarantees this
    /// is set.
    pub fn base(&self) -> &Path {
        self.paths
            .base
            .as_deref()
            .unwrap_or_else(|| Path::new("."))
    }

    /// Resolve a configured relative path against the base directory.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.base().join(rel)
    }

    /// CSFloat API key: secrets file, then environment variable, then
    /// (discouraged) the config key itself.
    pub fn csfloat_api_key(&self) -> String {
        if let Some(rel) = &self.paths.secrets_json {
            let path = self.resolve(rel);
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Ok(secrets) = serde_json::from_str::<serde_json::Value>(&content) {
                    if let Some(key) = secrets.get("csfloatApiKey").and_then(|v| v.as_str()) {
                        let key = key.trim();
                        if !key.is_empty() {
                            return key.to_string();
                        }
                    }
                }
            }
        }

        if let Ok(key) = std::env::var(&self.providers.csfloat.api_key_env_var) {
            let key = key.trim();
            if !key.is_empty() {
                return key.to_string();
            }
        }

        let cfg_key = self.providers.csfloat.api_key.trim();
        if !cfg_key.is_empty() {
            log::warn!(
                "CSFloat API key is present in config; move it to the secrets file or {} to avoid leaks",
                self.providers.csfloat.api_key_env_var
            );
        }
        cfg_key.to_string()
    }
}

fn valid_hhmm(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 || parts[0].len() != 2 || parts[1].len() != 2 {
        return false;
    }
    let (h, m) = match (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
        (Ok(h), Ok(m)) => (h, m),
        _ => return false,
    };
    h < 24 && m < 60
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
