//! Live-provider failover orchestration
//!
//! Owns the provider chain consulted when the bulk board has no
//! answer: rotation order, per-provider retries with backoff, the
//! cooldown state machine and USD conversion all live here, so the
//! engine only ever asks "price for this name, please".

use crate::catalog::{money_round, Bucket};
use crate::config::RotationMode;
use crate::providers::{epoch_now, FetchError, LiveProvider, ProviderState, QuoteCurrency};
use crate::ratelimit::{jitter, sleep_seconds};

pub struct OrchestratorOptions {
    pub rotation: RotationMode,
    pub fallback_on_failure: bool,
    pub max_attempts: u32,
    pub backoff_seconds: f64,
    pub fail_threshold: u32,
    pub cooldown_seconds: f64,
    pub skip_rounds_on_failure: u32,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            rotation: RotationMode::RoundRobin,
            fallback_on_failure: true,
            max_attempts: 3,
            backoff_seconds: 5.0,
            fail_threshold: 3,
            cooldown_seconds: 120.0,
            skip_rounds_on_failure: 1,
        }
    }
}

/// A successful live lookup, already in the settlement currency.
#[derive(Debug, PartialEq)]
pub struct Resolved {
    pub price: f64,
    pub provider: String,
}

struct ProviderSlot {
    state: ProviderState,
    provider: Box<dyn LiveProvider>,
    ok: u64,
    fail: u64,
}

pub struct Orchestrator {
    slots: Vec<ProviderSlot>,
    rr_cursor: usize,
    fx_usd_cad: Option<f64>,
    opts: OrchestratorOptions,
}

impl Orchestrator {
    /// Only enabled providers should be handed in; disabled ones are
    /// simply not part of the chain.
    pub fn new(
        providers: Vec<Box<dyn LiveProvider>>,
        opts: OrchestratorOptions,
        fx_usd_cad: Option<f64>,
    ) -> Self {
        let slots = providers
            .into_iter()
            .map(|provider| ProviderSlot {
                state: ProviderState::new(provider.name(), true),
                provider,
                ok: 0,
                fail: 0,
            })
            .collect();
        Self {
            slots,
            rr_cursor: 0,
            fx_usd_cad,
            opts,
        }
    }

    /// Per-provider (name, ok, fail) counters for the run summary.
    pub fn provider_counts(&self) -> Vec<(String, u64, u64)> {
        self.slots
            .iter()
            .map(|s| (s.state.name.clone(), s.ok, s.fail))
            .collect()
    }

    /// Resolve one market name through the provider chain. Explicit
    /// `preferred` names are consulted first, then the rest in
    /// rotation order. Returns the last failure when every provider
    /// is skipped or exhausted.
    pub fn resolve(
        &mut self,
        market_hash_name: &str,
        bucket: Bucket,
        preferred: Option<&[String]>,
    ) -> Result<Resolved, FetchError> {
        let chain = self.chain(preferred);
        if self.opts.rotation == RotationMode::RoundRobin && !self.slots.is_empty() {
            self.rr_cursor = (self.rr_cursor + 1) % self.slots.len();
        }

        let mut last_failure = FetchError::NoPrice;
        for index in chain {
            match self.consult(index, market_hash_name, bucket) {
                Some(Ok(resolved)) => return Ok(resolved),
                Some(Err(e)) => last_failure = e,
                None => {}
            }
        }
        Err(last_failure)
    }

    /// Chain of slot indices for one resolution.
    fn chain(&self, preferred: Option<&[String]>) -> Vec<usize> {
        let n = self.slots.len();
        if n == 0 {
            return Vec::new();
        }
        let start = match self.opts.rotation {
            RotationMode::RoundRobin => self.rr_cursor % n,
            RotationMode::Fixed => 0,
        };
        let rotated: Vec<usize> = (0..n).map(|i| (start + i) % n).collect();

        let mut order: Vec<usize> = Vec::with_capacity(n);
        if let Some(names) = preferred {
            for name in names {
                if let Some(i) = self.slots.iter().position(|s| s.state.name == *name) {
                    if !order.contains(&i) {
                        order.push(i);
                    }
                }
            }
        }
        for i in rotated {
            if !order.contains(&i) {
                order.push(i);
            }
        }
        if !self.opts.fallback_on_failure {
            order.truncate(1);
        }
        order
    }

    /// One provider's turn: `None` when it never got to make a call,
    /// `Some(Err)` when it tried and failed.
    fn consult(
        &mut self,
        index: usize,
        market_hash_name: &str,
        bucket: Bucket,
    ) -> Option<Result<Resolved, FetchError>> {
        let slot = &mut self.slots[index];
        if !slot.state.is_available(epoch_now()) {
            return None;
        }
        if slot.state.declines_this_round() {
            return None;
        }
        if !slot.provider.supports(bucket) {
            return None;
        }
        if slot.provider.currency() == QuoteCurrency::Usd && self.fx_usd_cad.is_none() {
            log::debug!(
                "Provider {} quotes in USD but no FX rate is available; skipping",
                slot.state.name
            );
            return None;
        }

        let mut attempt = 1u32;
        let failure = loop {
            match slot.provider.fetch_once(market_hash_name) {
                Ok(price) => {
                    slot.state.record_success();
                    slot.ok += 1;
                    let settled = match slot.provider.currency() {
                        QuoteCurrency::Settlement => money_round(price),
                        QuoteCurrency::Usd => {
                            money_round(price * self.fx_usd_cad.unwrap_or(1.0))
                        }
                    };
                    return Some(Ok(Resolved {
                        price: settled,
                        provider: slot.state.name.clone(),
                    }));
                }
                Err(e) if e.is_transient() && attempt < self.opts.max_attempts => {
                    let delay = jitter(self.opts.backoff_seconds * attempt as f64, 0.15);
                    log::debug!(
                        "Provider {} attempt {} failed ({}); retrying in {:.1}s",
                        slot.state.name,
                        attempt,
                        e.as_str(),
                        delay
                    );
                    sleep_seconds(delay);
                    attempt += 1;
                }
                Err(e) => break e,
            }
        };

        slot.fail += 1;
        if failure.is_hard() {
            slot.state.record_hard_failure(
                epoch_now(),
                self.opts.fail_threshold,
                self.opts.cooldown_seconds,
            );
        } else {
            slot.state
                .record_soft_failure(self.opts.skip_rounds_on_failure);
        }
        log::debug!(
            "Provider {} gave no price for {:?}: {}",
            slot.state.name,
            market_hash_name,
            failure.as_str()
        );
        Some(Err(failure))
    }
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
