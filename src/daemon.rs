//! Scheduled daemon mode
//!
//! Runs one refresh at boot (configurable), then wakes periodically
//! and triggers a refresh on the configured days at the configured
//! local time, at most once per local date. The last run date is
//! persisted so restarts do not repeat a day's refresh.

use crate::catalog::write_json_atomic;
use crate::config::Config;
use crate::error::{RefreshError, Result};
use crate::ratelimit::sleep_seconds;
use chrono::{DateTime, Local, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DaemonState {
    #[serde(default)]
    last_run_local_date: Option<String>,
}

impl DaemonState {
    fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|c| serde_json::from_str(&c).ok())
            .unwrap_or_default()
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &serde_json::to_value(self)?)
    }
}

/// Loop forever, refreshing on schedule. `run_once` failures are
/// logged and the daemon keeps going.
pub fn run_daemon<F>(config: &Config, mut run_once: F) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    let schedule = &config.schedule;
    let days = parse_days(&schedule.days_of_week)?;
    let at = NaiveTime::parse_from_str(&schedule.time, "%H:%M").map_err(|_| {
        RefreshError::Config(format!("schedule.time must be HH:MM, got {:?}", schedule.time))
    })?;
    let state_path = config.resolve(&config.paths.daemon_state_json);
    let mut state = DaemonState::load(&state_path);

    if schedule.boot_time_refresh {
        log::info!("Boot-time refresh starting");
        record_and_run(&mut state, &state_path, &mut run_once);
    }

    if !schedule.enabled {
        // Stay resident so a supervisor does not restart-loop us.
        log::info!("Schedule is disabled; daemon will sleep indefinitely");
        loop {
            sleep_seconds(idle_interval(schedule.check_interval_seconds));
        }
    }

    log::info!(
        "Daemon scheduled for {:?} at {} (checking every {}s)",
        schedule.days_of_week,
        schedule.time,
        schedule.check_interval_seconds
    );
    loop {
        let now = Local::now();
        if is_due(now, &days, at, state.last_run_local_date.as_deref()) {
            log::info!("Scheduled refresh starting");
            record_and_run(&mut state, &state_path, &mut run_once);
        }
        sleep_seconds(idle_interval(schedule.check_interval_seconds));
    }
}

/// Never poll tighter than every 5 seconds, whatever the config says.
fn idle_interval(check_interval_seconds: f64) -> f64 {
    check_interval_seconds.max(5.0)
}

/// Mark today as run first, so a crashing refresh cannot hot-loop.
fn record_and_run<F>(state: &mut DaemonState, state_path: &Path, run_once: &mut F)
where
    F: FnMut() -> Result<()>,
{
    state.last_run_local_date = Some(Local::now().format("%Y-%m-%d").to_string());
    if let Err(e) = state.save(state_path) {
        log::warn!("Cannot persist daemon state: {}", e);
    }
    if let Err(e) = run_once() {
        log::error!("Refresh failed: {}", e);
    }
}

fn parse_days(names: &[String]) -> Result<Vec<Weekday>> {
    let mut days = Vec::with_capacity(names.len());
    for name in names {
        let day: Weekday = name.to_lowercase().parse().map_err(|_| {
            RefreshError::Config(format!("schedule.daysOfWeek has unknown day {:?}", name))
        })?;
        days.push(day);
    }
    Ok(days)
}

fn is_due(
    now: DateTime<Local>,
    days: &[Weekday],
    at: NaiveTime,
    last_run_local_date: Option<&str>,
) -> bool {
    use chrono::Datelike;
    if !days.contains(&now.weekday()) {
        return false;
    }
    if now.time() < at {
        return false;
    }
    let today = now.format("%Y-%m-%d").to_string();
    last_run_local_date != Some(today.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn three_am() -> NaiveTime {
        NaiveTime::parse_from_str("03:00", "%H:%M").unwrap()
    }

    #[test]
    fn idle_interval_clamps_to_five_seconds() {
        assert_eq!(idle_interval(0.5), 5.0);
        assert_eq!(idle_interval(60.0), 60.0);
    }

    #[test]
    fn parse_days_accepts_full_names() {
        let days = parse_days(&["sunday".to_string(), "Wednesday".to_string()]).unwrap();
        assert_eq!(days, vec![Weekday::Sun, Weekday::Wed]);
    }

    #[test]
    fn parse_days_rejects_garbage() {
        assert!(parse_days(&["caturday".to_string()]).is_err());
    }

    #[test]
    fn due_on_matching_day_past_the_time() {
        // 2026-08-23 is a Sunday.
        let now = local(2026, 8, 23, 3, 30);
        assert!(is_due(now, &[Weekday::Sun], three_am(), None));
        assert!(is_due(now, &[Weekday::Sun], three_am(), Some("2026-08-16")));
    }

    #[test]
    fn not_due_before_the_scheduled_time() {
        let now = local(2026, 8, 23, 2, 59);
        assert!(!is_due(now, &[Weekday::Sun], three_am(), None));
    }

    #[test]
    fn not_due_on_other_days() {
        // A Monday.
        let now = local(2026, 8, 24, 3, 30);
        assert!(!is_due(now, &[Weekday::Sun], three_am(), None));
    }

    #[test]
    fn runs_at_most_once_per_date() {
        let now = local(2026, 8, 23, 23, 0);
        assert!(!is_due(now, &[Weekday::Sun], three_am(), Some("2026-08-23")));
    }

    #[test]
    fn state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon-state.json");
        let state = DaemonState {
            last_run_local_date: Some("2026-08-23".to_string()),
        };
        state.save(&path).unwrap();
        let reloaded = DaemonState::load(&path);
        assert_eq!(reloaded.last_run_local_date.as_deref(), Some("2026-08-23"));
    }

    #[test]
    fn missing_state_file_is_a_fresh_state() {
        let state = DaemonState::load(Path::new("/nonexistent/daemon-state.json"));
        assert!(state.last_run_local_date.is_none());
    }
}
