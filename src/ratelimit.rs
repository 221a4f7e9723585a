//! Minimum inter-call delays with randomized jitter
//!
//! All pacing is blocking sleeps; there is no concurrency to manage.
//! Jitter keeps repeated runs from hammering providers on a fixed
//! cadence.

use rand::Rng;
use std::time::{Duration, Instant};

/// Apply ±pct jitter to a duration in seconds. Never negative.
pub fn jitter(seconds: f64, pct: f64) -> f64 {
    let delta = seconds.abs() * pct;
    if delta <= 0.0 {
        return seconds.max(0.0);
    }
    let mut rng = rand::rng();
    (seconds + rng.random_range(-delta..=delta)).max(0.0)
}

/// Standard ±15% jitter used for backoff and pacing sleeps.
pub fn jitter15(seconds: f64) -> f64 {
    jitter(seconds, 0.15)
}

/// Random delay drawn uniformly from [min, max] seconds.
pub fn random_delay(min: f64, max: f64) -> f64 {
    if max <= min {
        return min.max(0.0);
    }
    let mut rng = rand::rng();
    rng.random_range(min..=max).max(0.0)
}

/// Blocking sleep helper for fractional seconds.
pub fn sleep_seconds(seconds: f64) {
    if seconds > 0.0 {
        std::thread::sleep(Duration::from_secs_f64(seconds));
    }
}

/// Per-provider minimum inter-call delay with jitter.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay_seconds: f64,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_delay_seconds: f64) -> Self {
        Self {
            min_delay_seconds,
            last_call: None,
        }
    }

    /// Block until at least the configured delay has passed since the
    /// previous call, then mark this call.
    pub fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed().as_secs_f64();
            let remaining = self.min_delay_seconds - elapsed;
            if remaining > 0.0 {
                sleep_seconds(jitter15(remaining));
            }
        }
        self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..200 {
            let v = jitter(10.0, 0.15);
            assert!((8.5..=11.5).contains(&v), "jitter out of band: {v}");
        }
    }

    #[test]
    fn jitter_zero_is_zero() {
        assert_eq!(jitter(0.0, 0.15), 0.0);
    }

    #[test]
    fn jitter_never_negative() {
        for _ in 0..200 {
            assert!(jitter(0.001, 0.99) >= 0.0);
        }
    }

    #[test]
    fn random_delay_in_range() {
        for _ in 0..200 {
            let v = random_delay(1.0, 3.0);
            assert!((1.0..=3.0).contains(&v));
        }
        assert_eq!(random_delay(2.0, 2.0), 2.0);
        assert_eq!(random_delay(5.0, 1.0), 5.0);
    }

    #[test]
    fn rate_limiter_first_call_is_immediate() {
        let mut limiter = RateLimiter::new(10.0);
        let start = Instant::now();
        limiter.wait();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn rate_limiter_enforces_delay() {
        let mut limiter = RateLimiter::new(0.05);
        limiter.wait();
        let start = Instant::now();
        limiter.wait();
        // 15% jitter can shave a bit off the nominal 50ms.
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
