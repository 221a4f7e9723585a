//! CSFloat lowest buy-now listing adapter
//!
//! Quotes in USD (integer cents); the orchestrator converts via the
//! daily FX rate. An API key is optional but strongly rate-limited
//! without one.

use super::{FetchError, LiveProvider, QuoteCurrency};
use crate::catalog::Bucket;
use crate::config::{CsfloatConfig, HttpConfig};
use crate::error::Result;
use crate::ratelimit::RateLimiter;
use serde::Deserialize;
use std::time::Duration;

const LISTINGS_URL: &str = "https://csfloat.com/api/v1/listings";

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    price: Option<i64>,
}

pub struct CsfloatProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
    use_for_cases: bool,
    use_for_keys: bool,
    use_for_items: bool,
}

impl CsfloatProvider {
    pub fn new(cfg: &CsfloatConfig, http: &HttpConfig, api_key: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(http.user_agent.clone())
            .timeout(Duration::from_secs(http.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: LISTINGS_URL.to_string(),
            api_key,
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

impl LiveProvider for CsfloatProvider {
    fn name(&self) -> &'static str {
        "csfloat"
    }

    fn currency(&self) -> QuoteCurrency {
        QuoteCurrency::Usd
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

        let mut request = self.client.get(&self.base_url).query(&[
            ("market_hash_name", market_hash_name),
            ("sort_by", "lowest_price"),
            ("limit", "1"),
            ("type", "buy_now"),
        ]);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", &self.api_key);
        }

        let response = request.send().map_err(|_| FetchError::NetworkError)?;

        let status = response.status();
        match status.as_u16() {
            429 => return Err(FetchError::RateLimited),
            401 | 403 => return Err(FetchError::Unauthorized),
            s if !(200..300).contains(&s) => return Err(FetchError::HttpError),
            _ => {}
        }

        let listings: Vec<Listing> = response.json().map_err(|_| FetchError::NoPrice)?;
        let cents = listings
            .first()
            .and_then(|l| l.price)
            .ok_or(FetchError::NoPrice)?;
        if cents <= 0 {
            return Err(FetchError::NoPrice);
        }
        Ok(cents as f64 / 100.0)
    }
}

#[cfg(test)]
#[path = "csfloat_tests.rs"]
mod tests;
