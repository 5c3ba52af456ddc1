//! # Temporal Types — UTC Timestamps and Injected Clocks
//!
//! `Timestamp` is a UTC-only instant truncated to whole seconds. Offering
//! deadlines, unlock dates and event times are all `Timestamp`s.
//!
//! ## Clock Injection
//!
//! Engines never call `Utc::now()` directly. They hold an
//! `Arc<dyn Clock>` and read time through it, so tests drive every timed
//! transition by advancing a [`ManualClock`].

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Timestamp = Timestamp(DateTime::UNIX_EPOCH);

    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// From seconds since the Unix epoch.
    pub fn from_epoch_secs(secs: u64) -> Result<Self, CoreError> {
        let signed = i64::try_from(secs)
            .map_err(|_| CoreError::InvalidTimestamp(format!("epoch seconds out of range: {secs}")))?;
        DateTime::from_timestamp(signed, 0)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("epoch seconds out of range: {secs}")))
    }

    /// Seconds since the Unix epoch.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted forward by `secs` seconds.
    pub fn plus_secs(&self, secs: u64) -> Result<Self, CoreError> {
        let overflow = || CoreError::Overflow { op: "timestamp add" };
        let signed = i64::try_from(secs).map_err(|_| overflow())?;
        let delta = TimeDelta::try_seconds(signed).ok_or_else(overflow)?;
        self.0.checked_add_signed(delta).map(Self).ok_or_else(overflow)
    }

    /// Whole seconds from `self` until `later`, zero if `later` is not after `self`.
    pub fn secs_until(&self, later: Timestamp) -> u64 {
        u64::try_from(later.epoch_secs() - self.epoch_secs()).unwrap_or(0)
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with Z suffix (e.g. `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// A clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock to `at`. Moving backwards is allowed.
    pub fn set(&self, at: Timestamp) {
        *self.lock() = at;
    }

    /// Move the clock forward by `secs`. Saturates rather than overflowing.
    pub fn advance(&self, secs: u64) {
        let mut now = self.lock();
        if let Ok(next) = now.plus_secs(secs) {
            *now = next;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Timestamp> {
        // A poisoned lock still holds a valid Timestamp.
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.lock()
    }
}
