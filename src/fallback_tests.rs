//! Tests for the failover orchestrator

use super::*;
use std::collections::VecDeque;

/// Provider stub that replays a script of outcomes and counts calls.
struct Scripted {
    name: &'static str,
    currency: QuoteCurrency,
    buckets: Vec<Bucket>,
    outcomes: VecDeque<Result<f64, FetchError>>,
    calls: std::rc::Rc<std::cell::Cell<u32>>,
}

impl Scripted {
    fn new(name: &'static str, outcomes: Vec<Result<f64, FetchError>>) -> Self {
        Self {
            name,
            currency: QuoteCurrency::Settlement,
            buckets: Bucket::ALL.to_vec(),
            outcomes: outcomes.into(),
            calls: std::rc::Rc::new(std::cell::Cell::new(0)),
        }
    }

    fn usd(mut self) -> Self {
        self.currency = QuoteCurrency::Usd;
        self
    }

    fn only_for(mut self, buckets: &[Bucket]) -> Self {
        self.buckets = buckets.to_vec();
        self
    }

    fn call_counter(&self) -> std::rc::Rc<std::cell::Cell<u32>> {
        self.calls.clone()
    }
}

impl LiveProvider for Scripted {
    fn name(&self) -> &'static str {
        self.name
    }

    fn currency(&self) -> QuoteCurrency {
        self.currency
    }

    fn supports(&self, bucket: Bucket) -> bool {
        self.buckets.contains(&bucket)
    }

    fn fetch_once(&mut self, _market_hash_name: &str) -> Result<f64, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.outcomes.pop_front().unwrap_or(Err(FetchError::NoPrice))
    }
}

fn opts() -> OrchestratorOptions {
    OrchestratorOptions {
        max_attempts: 1,
        backoff_seconds: 0.0,
        ..OrchestratorOptions::default()
    }
}

#[test]
fn first_provider_wins() {
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Ok(10.0)])),
            Box::new(Scripted::new("b", vec![Ok(20.0)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    let got = orch.resolve("Knife", Bucket::Items, None).unwrap();
    assert_eq!(got, Resolved { price: 10.0, provider: "a".to_string() });
}

#[test]
fn hard_failure_falls_through_to_next_provider() {
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Err(FetchError::NetworkError)])),
            Box::new(Scripted::new("b", vec![Ok(20.0)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    let got = orch.resolve("Knife", Bucket::Items, None).unwrap();
    assert_eq!(got.provider, "b");
}

#[test]
fn no_fallback_stops_after_first_provider() {
    let second = Scripted::new("b", vec![Ok(20.0)]);
    let second_calls = second.call_counter();
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Err(FetchError::HttpError)])),
            Box::new(second),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            fallback_on_failure: false,
            ..opts()
        },
        None,
    );
    let got = orch.resolve("Knife", Bucket::Items, None);
    assert_eq!(got, Err(FetchError::HttpError));
    assert_eq!(second_calls.get(), 0);
}

#[test]
fn round_robin_rotates_the_starting_provider() {
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Ok(1.0), Ok(1.0)])),
            Box::new(Scripted::new("b", vec![Ok(2.0), Ok(2.0)])),
        ],
        opts(),
        None,
    );
    let first = orch.resolve("Knife", Bucket::Items, None).unwrap();
    let second = orch.resolve("Knife", Bucket::Items, None).unwrap();
    assert_eq!(first.provider, "a");
    assert_eq!(second.provider, "b");
}

#[test]
fn fixed_rotation_always_starts_at_the_first_provider() {
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Ok(1.0), Ok(1.0)])),
            Box::new(Scripted::new("b", vec![Ok(2.0), Ok(2.0)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "a");
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "a");
}

#[test]
fn preferred_order_overrides_rotation() {
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Ok(1.0)])),
            Box::new(Scripted::new("b", vec![Ok(2.0)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    let preferred = vec!["b".to_string()];
    let got = orch.resolve("Knife", Bucket::Items, Some(&preferred)).unwrap();
    assert_eq!(got.provider, "b");
}

#[test]
fn transient_failure_retries_same_provider() {
    let provider = Scripted::new("a", vec![Err(FetchError::RateLimited), Ok(5.0)]);
    let calls = provider.call_counter();
    let mut orch = Orchestrator::new(
        vec![Box::new(provider)],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            max_attempts: 2,
            backoff_seconds: 0.0,
            ..OrchestratorOptions::default()
        },
        None,
    );
    let got = orch.resolve("Knife", Bucket::Items, None).unwrap();
    assert_eq!(got.price, 5.0);
    assert_eq!(calls.get(), 2);
}

#[test]
fn no_price_never_retries() {
    let provider = Scripted::new("a", vec![Err(FetchError::NoPrice), Ok(5.0)]);
    let calls = provider.call_counter();
    let mut orch = Orchestrator::new(
        vec![Box::new(provider)],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            max_attempts: 3,
            backoff_seconds: 0.0,
            ..OrchestratorOptions::default()
        },
        None,
    );
    assert_eq!(orch.resolve("Knife", Bucket::Items, None), Err(FetchError::NoPrice));
    assert_eq!(calls.get(), 1);
}

#[test]
fn unauthorized_never_retries() {
    let provider = Scripted::new("a", vec![Err(FetchError::Unauthorized), Ok(5.0)]);
    let calls = provider.call_counter();
    let mut orch = Orchestrator::new(
        vec![Box::new(provider)],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            max_attempts: 3,
            backoff_seconds: 0.0,
            ..OrchestratorOptions::default()
        },
        None,
    );
    assert_eq!(
        orch.resolve("Knife", Bucket::Items, None),
        Err(FetchError::Unauthorized)
    );
    assert_eq!(calls.get(), 1);
}

#[test]
fn cooldown_removes_provider_from_later_resolutions() {
    let failing = Scripted::new("a", vec![Err(FetchError::NetworkError), Ok(99.0)]);
    let failing_calls = failing.call_counter();
    let mut orch = Orchestrator::new(
        vec![
            Box::new(failing),
            Box::new(Scripted::new("b", vec![Ok(1.0), Ok(2.0)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            fail_threshold: 1,
            cooldown_seconds: 3600.0,
            ..opts()
        },
        None,
    );
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "b");
    // Provider a is cooling down: consulted zero more times.
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "b");
    assert_eq!(failing_calls.get(), 1);
}

#[test]
fn soft_failure_sits_out_the_next_round() {
    let soft = Scripted::new("a", vec![Err(FetchError::NoPrice), Ok(9.0)]);
    let soft_calls = soft.call_counter();
    let mut orch = Orchestrator::new(
        vec![
            Box::new(soft),
            Box::new(Scripted::new("b", vec![Ok(1.0), Ok(2.0), Ok(3.0)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            skip_rounds_on_failure: 1,
            ..opts()
        },
        None,
    );
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "b");
    // a sits out exactly one round, then is consulted again.
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "b");
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "a");
    assert_eq!(soft_calls.get(), 2);
}

#[test]
fn usd_quotes_are_converted() {
    let mut orch = Orchestrator::new(
        vec![Box::new(Scripted::new("a", vec![Ok(10.0)]).usd())],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        Some(1.35),
    );
    let got = orch.resolve("Knife", Bucket::Items, None).unwrap();
    assert_eq!(got.price, 13.5);
}

#[test]
fn usd_provider_without_fx_is_skipped() {
    let usd = Scripted::new("a", vec![Ok(10.0)]).usd();
    let usd_calls = usd.call_counter();
    let mut orch = Orchestrator::new(
        vec![Box::new(usd), Box::new(Scripted::new("b", vec![Ok(2.0)]))],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "b");
    assert_eq!(usd_calls.get(), 0);
}

#[test]
fn bucket_restrictions_skip_the_provider() {
    let cases_only = Scripted::new("a", vec![Ok(10.0)]).only_for(&[Bucket::Cases]);
    let mut orch = Orchestrator::new(
        vec![Box::new(cases_only), Box::new(Scripted::new("b", vec![Ok(2.0)]))],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    assert_eq!(orch.resolve("Knife", Bucket::Items, None).unwrap().provider, "b");
}

#[test]
fn exhaustion_reports_the_last_failure() {
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Err(FetchError::NetworkError)])),
            Box::new(Scripted::new("b", vec![Err(FetchError::RateLimited)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    assert_eq!(
        orch.resolve("Knife", Bucket::Items, None),
        Err(FetchError::RateLimited)
    );
}

#[test]
fn counters_track_outcomes_per_provider() {
    let mut orch = Orchestrator::new(
        vec![
            Box::new(Scripted::new("a", vec![Err(FetchError::HttpError), Ok(1.0)])),
            Box::new(Scripted::new("b", vec![Ok(2.0)])),
        ],
        OrchestratorOptions {
            rotation: RotationMode::Fixed,
            ..opts()
        },
        None,
    );
    orch.resolve("Knife", Bucket::Items, None).unwrap();
    orch.resolve("Knife", Bucket::Items, None).unwrap();
    let counts = orch.provider_counts();
    assert_eq!(counts[0], ("a".to_string(), 1, 1));
    assert_eq!(counts[1], ("b".to_string(), 1, 0));
}
