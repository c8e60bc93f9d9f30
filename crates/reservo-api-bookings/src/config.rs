//! Booking engine configuration parsed from environment variables.
//!
//! All tunables are clamped to bounded ranges so a misconfigured deployment
//! degrades to sane behavior instead of holding slots forever or hammering
//! the store.

use std::env;

use chrono_tz::Tz;
use tracing::warn;

/// Bounds for the hold time-to-live, in minutes.
pub const HOLD_TTL_MIN_MINUTES: i64 = 5;
/// Upper bound for the hold time-to-live, in minutes.
pub const HOLD_TTL_MAX_MINUTES: i64 = 120;
/// Default hold time-to-live, in minutes.
pub const DEFAULT_HOLD_TTL_MINUTES: i64 = 15;

/// Upper bound for the minimum cancellation notice, in hours (one week).
pub const MAX_CANCEL_NOTICE_HOURS: i64 = 168;
/// Default minimum cancellation notice, in hours.
pub const DEFAULT_CANCEL_NOTICE_HOURS: i64 = 24;

/// Bounds for the sweep interval, in seconds.
pub const SWEEP_INTERVAL_MIN_SECS: u64 = 30;
/// Upper bound for the sweep interval, in seconds.
pub const SWEEP_INTERVAL_MAX_SECS: u64 = 3600;
/// Default sweep interval, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Settings for the booking lifecycle engine and expiry sweeper.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// How long a pending hold lives before the sweeper may reclaim it.
    pub hold_ttl_minutes: i64,

    /// Minimum hours of notice required to cancel a confirmed booking.
    /// Zero disables the policy. Admin overrides bypass it.
    pub min_cancel_notice_hours: i64,

    /// How often the expiry sweeper runs.
    pub sweep_interval_secs: u64,

    /// Timezone in which "today" and notice windows are evaluated.
    pub timezone: Tz,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            hold_ttl_minutes: DEFAULT_HOLD_TTL_MINUTES,
            min_cancel_notice_hours: DEFAULT_CANCEL_NOTICE_HOURS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            timezone: Tz::UTC,
        }
    }
}

impl BookingSettings {
    /// Build settings from raw values, clamping each to its bounded range.
    #[must_use]
    pub fn new(
        hold_ttl_minutes: i64,
        min_cancel_notice_hours: i64,
        sweep_interval_secs: u64,
        timezone: Tz,
    ) -> Self {
        Self {
            hold_ttl_minutes: hold_ttl_minutes.clamp(HOLD_TTL_MIN_MINUTES, HOLD_TTL_MAX_MINUTES),
            min_cancel_notice_hours: min_cancel_notice_hours.clamp(0, MAX_CANCEL_NOTICE_HOURS),
            sweep_interval_secs: sweep_interval_secs
                .clamp(SWEEP_INTERVAL_MIN_SECS, SWEEP_INTERVAL_MAX_SECS),
            timezone,
        }
    }

    /// Load settings from environment variables, falling back to defaults
    /// for anything missing or unparseable.
    ///
    /// Variables: `RESERVO_HOLD_TTL_MINUTES`, `RESERVO_CANCEL_NOTICE_HOURS`,
    /// `RESERVO_SWEEP_INTERVAL_SECS`, `RESERVO_TIMEZONE` (IANA name).
    #[must_use]
    pub fn from_env() -> Self {
        let hold_ttl = parse_var("RESERVO_HOLD_TTL_MINUTES", DEFAULT_HOLD_TTL_MINUTES);
        let notice = parse_var("RESERVO_CANCEL_NOTICE_HOURS", DEFAULT_CANCEL_NOTICE_HOURS);
        let interval = parse_var("RESERVO_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS);

        let timezone = match env::var("RESERVO_TIMEZONE") {
            Ok(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!(timezone = %name, "Unknown RESERVO_TIMEZONE, falling back to UTC");
                Tz::UTC
            }),
            Err(_) => Tz::UTC,
        };

        Self::new(hold_ttl, notice, interval, timezone)
    }

    /// The hold time-to-live as a chrono duration.
    #[must_use]
    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_ttl_minutes)
    }

    /// The sweep interval as a std duration.
    #[must_use]
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_in_bounds() {
        let s = BookingSettings::default();
        assert_eq!(s.hold_ttl_minutes, DEFAULT_HOLD_TTL_MINUTES);
        assert_eq!(s.sweep_interval_secs, DEFAULT_SWEEP_INTERVAL_SECS);
        assert_eq!(s.timezone, Tz::UTC);
    }

    #[test]
    fn test_hold_ttl_clamped_low() {
        let s = BookingSettings::new(1, 24, 60, Tz::UTC);
        assert_eq!(s.hold_ttl_minutes, HOLD_TTL_MIN_MINUTES);
    }

    #[test]
    fn test_hold_ttl_clamped_high() {
        let s = BookingSettings::new(10_000, 24, 60, Tz::UTC);
        assert_eq!(s.hold_ttl_minutes, HOLD_TTL_MAX_MINUTES);
    }

    #[test]
    fn test_zero_notice_disables_policy() {
        let s = BookingSettings::new(15, 0, 60, Tz::UTC);
        assert_eq!(s.min_cancel_notice_hours, 0);
    }

    #[test]
    fn test_negative_notice_clamps_to_zero() {
        let s = BookingSettings::new(15, -5, 60, Tz::UTC);
        assert_eq!(s.min_cancel_notice_hours, 0);
    }

    #[test]
    fn test_sweep_interval_clamped() {
        let s = BookingSettings::new(15, 24, 1, Tz::UTC);
        assert_eq!(s.sweep_interval_secs, SWEEP_INTERVAL_MIN_SECS);
        let s = BookingSettings::new(15, 24, 86_400, Tz::UTC);
        assert_eq!(s.sweep_interval_secs, SWEEP_INTERVAL_MAX_SECS);
    }

    #[test]
    fn test_hold_ttl_duration() {
        let s = BookingSettings::default();
        assert_eq!(s.hold_ttl(), chrono::Duration::minutes(15));
    }
}
