//! Per-provider availability state machine
//!
//! Rebuilt fresh for every refresh run: cooldowns and skip-rounds are
//! intra-run memory only, so a provider that misbehaved yesterday
//! starts today with a clean slate.

/// Tracks one provider's availability across a run.
///
/// Two independent mechanisms:
/// - Cooldown: enough consecutive hard failures pause the provider
///   until `cooldown_until` (epoch seconds).
/// - Skip-rounds: soft failures make the provider sit out the next N
///   consultations without a full cooldown.
#[derive(Debug)]
pub struct ProviderState {
    pub name: String,
    pub enabled: bool,
    pub cooldown_until: f64,
    pub consecutive_hard_failures: u32,
    pub skip_rounds_remaining: u32,
}

impl ProviderState {
    pub fn new(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            enabled,
            cooldown_until: 0.0,
            consecutive_hard_failures: 0,
            skip_rounds_remaining: 0,
        }
    }

    /// Disabled providers are never available. A cooled-down provider
    /// becomes available again once `now_ts` passes the deadline, at
    /// which point its counters reset.
    pub fn is_available(&mut self, now_ts: f64) -> bool {
        if !self.enabled {
            return false;
        }
        if self.cooldown_until <= 0.0 {
            return true;
        }
        if now_ts >= self.cooldown_until {
            self.cooldown_until = 0.0;
            self.consecutive_hard_failures = 0;
            log::info!("Provider {} back online; resuming", self.name);
            return true;
        }
        false
    }

    /// An available provider with skip-rounds pending declines this
    /// attempt and burns one round.
    pub fn declines_this_round(&mut self) -> bool {
        if self.skip_rounds_remaining > 0 {
            self.skip_rounds_remaining -= 1;
            log::debug!(
                "Provider {} sitting out this round ({} more)",
                self.name,
                self.skip_rounds_remaining
            );
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.consecutive_hard_failures = 0;
    }

    /// Count a hard failure; reaching the threshold starts a cooldown
    /// and resets the counter.
    pub fn record_hard_failure(&mut self, now_ts: f64, fail_threshold: u32, cooldown_seconds: f64) {
        self.consecutive_hard_failures += 1;
        if self.consecutive_hard_failures >= fail_threshold {
            self.cooldown_until = now_ts + cooldown_seconds;
            self.consecutive_hard_failures = 0;
            log::warn!(
                "Provider {} paused for {}s after {} hard failures",
                self.name,
                cooldown_seconds as i64,
                fail_threshold
            );
        }
    }

    /// Soft failure: optionally sit out the next rounds. Never
    /// extends an already longer sentence.
    pub fn record_soft_failure(&mut self, skip_rounds: u32) {
        self.skip_rounds_remaining = self.skip_rounds_remaining.max(skip_rounds);
    }
}

/// Current wall-clock time as fractional epoch seconds.
pub fn epoch_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
