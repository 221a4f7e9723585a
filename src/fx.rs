//! Daily USD/CAD exchange rate from the Bank of Canada Valet API
//!
//! USD-quoting providers are converted into the settlement currency at
//! this rate. The rate is fetched once per run; any failure yields
//! `None` and the engine disables USD sources rather than guessing.

use crate::config::HttpConfig;
use serde::Deserialize;
use std::time::Duration;

const VALET_URL: &str = "https://www.bankofcanada.ca/valet/observations/FXUSDCAD/json?recent=1";

// Rates outside this band are treated as API garbage.
const RATE_MIN: f64 = 0.5;
const RATE_MAX: f64 = 5.0;

#[derive(Debug, Deserialize)]
struct ValetResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(rename = "FXUSDCAD")]
    fxusdcad: Option<RateValue>,
}

#[derive(Debug, Deserialize)]
struct RateValue {
    v: String,
}

pub struct FxClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl FxClient {
    pub fn new(http: &HttpConfig) -> crate::error::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(http.user_agent.clone())
            .timeout(Duration::from_secs(http.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            url: VALET_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Fetch the most recent USD/CAD rate. Returns `None` on any
    /// network, HTTP or parse failure, and on implausible values.
    pub fn fetch_usd_cad(&self) -> Option<f64> {
        let response = match self.client.get(&self.url).send() {
            Ok(r) => r,
            Err(e) => {
                log::warn!("FX rate request failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            log::warn!("FX rate request returned HTTP {}", response.status());
            return None;
        }
        let body: ValetResponse = match response.json() {
            Ok(b) => b,
            Err(e) => {
                log::warn!("FX rate response did not parse: {}", e);
                return None;
            }
        };

        let rate = body
            .observations
            .last()
            .and_then(|obs| obs.fxusdcad.as_ref())
            .and_then(|r| r.v.trim().parse::<f64>().ok());

        match rate {
            Some(r) if (RATE_MIN..=RATE_MAX).contains(&r) => {
                log::info!("USD/CAD rate: {}", r);
                Some(r)
            }
            Some(r) => {
                log::warn!("FX rate {} outside plausible range; ignoring", r);
                None
            }
            None => {
                log::warn!("FX rate response had no usable observation");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(url: &str) -> FxClient {
        FxClient::new(&HttpConfig::default()).unwrap().with_url(url)
    }

    #[tokio::test]
    async fn parses_latest_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"observations":[
                    {"d":"2026-08-20","FXUSDCAD":{"v":"1.3501"}},
                    {"d":"2026-08-21","FXUSDCAD":{"v":"1.3622"}}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let url = server.uri();
        let rate = tokio::task::spawn_blocking(move || test_client(&url).fetch_usd_cad())
            .await
            .unwrap();
        assert_eq!(rate, Some(1.3622));
    }

    #[tokio::test]
    async fn implausible_rate_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"observations":[{"d":"2026-08-21","FXUSDCAD":{"v":"42.0"}}]}"#,
            ))
            .mount(&server)
            .await;

        let url = server.uri();
        let rate = tokio::task::spawn_blocking(move || test_client(&url).fetch_usd_cad())
            .await
            .unwrap();
        assert_eq!(rate, None);
    }

    #[tokio::test]
    async fn http_error_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = server.uri();
        let rate = tokio::task::spawn_blocking(move || test_client(&url).fetch_usd_cad())
            .await
            .unwrap();
        assert_eq!(rate, None);
    }

    #[tokio::test]
    async fn empty_observations_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"observations":[]}"#))
            .mount(&server)
            .await;

        let url = server.uri();
        let rate = tokio::task::spawn_blocking(move || test_client(&url).fetch_usd_cad())
            .await
            .unwrap();
        assert_eq!(rate, None);
    }
}
