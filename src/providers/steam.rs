//! Steam Community Market price overview adapter
//!
//! Quotes directly in the settlement currency. Prefers the median
//! price as a steadier signal, falling back to the lowest listing.

use super::{FetchError, LiveProvider, QuoteCurrency};
use crate::catalog::Bucket;
use crate::config::{HttpConfig, SteamConfig};
use crate::error::Result;
use crate::ratelimit::RateLimiter;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

const PRICE_OVERVIEW_URL: &str = "https://steamcommunity.com/market/priceoverview/";

#[derive(Debug, Deserialize)]
struct PriceOverview {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    median_price: Option<String>,
    #[serde(default)]
    lowest_price: Option<String>,
}

pub struct SteamProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    appid: u32,
    currency: u32,
    limiter: RateLimiter,
    use_for_cases: bool,
    use_for_keys: bool,
    use_for_items: bool,
}

impl SteamProvider {
    pub fn new(cfg: &SteamConfig, http: &HttpConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(http.user_agent.clone())
            .timeout(Duration::from_secs(http.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: PRICE_OVERVIEW_URL.to_string(),
            appid: cfg.appid,
            currency: cfg.currency,
            limiter: RateLimiter::new(cfg.delay_seconds),
            use_for_cases: cfg.use_for_cases,
            use_for_keys: cfg.use_for_keys,
            use_for_items: cfg.use_for_items,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

impl LiveProvider for SteamProvider {
    fn name(&self) -> &'static str {
        "steam"
    }

    fn currency(&self) -> QuoteCurrency {
        QuoteCurrency::Settlement
    }

    fn supports(&self, bucket: Bucket) -> bool {
        match bucket {
            Bucket::Cases => self.use_for_cases,
            Bucket::Keys => self.use_for_keys,
            Bucket::Items => self.use_for_items,
        }
    }

    fn fetch_once(&mut self, market_hash_name: &str) -> std::result::Result<f64, FetchError> {
        self.limiter.wait();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("appid", self.appid.to_string()),
                ("currency", self.currency.to_string()),
                ("market_hash_name", market_hash_name.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .map_err(|_| FetchError::NetworkError)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::HttpError);
        }

        let overview: PriceOverview = response.json().map_err(|_| FetchError::NoPrice)?;
        if !overview.success {
            return Err(FetchError::NoPrice);
        }

        overview
            .median_price
            .as_deref()
            .and_then(parse_price_text)
            .or_else(|| overview.lowest_price.as_deref().and_then(parse_price_text))
            .map(crate::catalog::money_round)
            .ok_or(FetchError::NoPrice)
    }
}

lazy_static! {
    static ref PRICE_RE: Regex = Regex::new(r"[-+]?\d[\d\s,. ]*").unwrap();
}

/// Extract a number from marketplace price strings such as
/// "$8.50 CAD", "CDN$ 7.90" or "39,58 kr". Handles thousands
/// separators and decimal commas.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let m = PRICE_RE.find(text)?;
    let mut num: String = m
        .as_str()
        .replace('\u{00A0}', " ")
        .trim()
        .replace(' ', "");

    if num.contains(',') && num.contains('.') {
        // Both present: comma is a thousands separator.
        num = num.replace(',', "");
    } else if num.contains(',') {
        // Only comma: decimal separator.
        num = num.replace(',', ".");
    }

    num.trim_end_matches('.').parse::<f64>().ok()
}

#[cfg(test)]
#[path = "steam_tests.rs"]
mod tests;
