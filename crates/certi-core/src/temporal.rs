//! # Temporal Types: UTC Timestamps and Clocks
//!
//! `Timestamp` is UTC-only, truncated to seconds and rendered as
//! `YYYY-MM-DDTHH:MM:SSZ`. Issuance dates, expiry dates and audit entry times
//! all use it, so a given instant has exactly one canonical rendering.
//!
//! Time is read through the [`Clock`] trait. Production code uses
//! [`SystemClock`]; tests use [`ManualClock`] to step through expiry and key
//! rotation windows deterministically.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CertiError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse the canonical form `YYYY-MM-DDTHH:MM:SSZ`. Explicit offsets,
    /// even `+00:00`, and fractional seconds are rejected, so each instant
    /// has exactly one accepted spelling.
    pub fn parse(s: &str) -> Result<Self, CertiError> {
        if !s.ends_with('Z') {
            return Err(CertiError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let ts = Self::parse_lenient(s)?;
        if ts.to_iso8601() != s {
            return Err(CertiError::Validation(format!(
                "timestamp must be YYYY-MM-DDTHH:MM:SSZ without fractional seconds, got: {s:?}"
            )));
        }
        Ok(ts)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    ///
    /// Intended for operator input (CLI `--expires-at`). Anything that ends
    /// up in a signed payload is re-rendered through [`Timestamp::to_iso8601`].
    pub fn parse_lenient(s: &str) -> Result<Self, CertiError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            CertiError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// From Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, CertiError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| CertiError::Validation(format!("invalid Unix timestamp: {secs}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This timestamp shifted by `secs` seconds. Saturates at the
    /// representable range.
    pub fn plus_secs(&self, secs: i64) -> Self {
        Duration::try_seconds(secs)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
            .unwrap_or(*self)
    }

    /// Render as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to `ts`.
    pub fn set(&self, ts: Timestamp) {
        *self.now.lock() = ts;
    }

    /// Move forward by `secs` seconds.
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock();
        *now = now.plus_secs(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
