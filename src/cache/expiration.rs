//! Expiration Module
//!
//! Encodes expiration instants and answers whether a record has expired.
//!
//! Instants are minutes since the Unix epoch as `f64`, so sub-minute TTLs keep
//! their precision while the stored text stays short.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Utc;

// == Constants ==
/// Milliseconds per expiration unit (one minute).
pub const EXPIRY_UNIT_MS: f64 = 60_000.0;

/// Latest representable instant, used to rank non-expiring entries last.
pub const MAX_EXPIRATION: f64 = 144_000_000_000.0;

// == Encoding ==
/// Encodes an instant for storage.
pub fn encode(instant: f64) -> String {
    instant.to_string()
}

/// Decodes a stored instant. Returns None for unreadable records.
pub fn decode(record: &str) -> Option<f64> {
    record
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

// == Is Expired ==
/// Checks whether an expiration record has passed at `now`.
///
/// Boundary condition: a record is expired once `now >= expires_at`. A missing
/// or undecodable record never expires.
pub fn is_expired(record: Option<&str>, now: f64) -> bool {
    match record.and_then(decode) {
        Some(expires_at) => now >= expires_at,
        None => false,
    }
}

/// Expiration instant for a TTL written at `now`, or None when the TTL means
/// "never expires" (absent, zero, negative or not finite).
pub fn expires_at(now: f64, ttl_minutes: Option<f64>) -> Option<f64> {
    ttl_minutes
        .filter(|ttl| ttl.is_finite() && *ttl > 0.0)
        .map(|ttl| now + ttl)
}

// == Clock ==
/// Source of the current time, in expiration units.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_minutes(&self) -> f64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_minutes(&self) -> f64 {
        Utc::now().timestamp_millis() as f64 / EXPIRY_UNIT_MS
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    minutes: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start_minutes: f64) -> Self {
        Self {
            minutes: Arc::new(Mutex::new(start_minutes)),
        }
    }

    /// Moves the clock forward by `minutes`.
    pub fn advance(&self, minutes: f64) {
        if let Ok(mut now) = self.minutes.lock() {
            *now += minutes;
        }
    }

    pub fn set(&self, minutes: f64) {
        if let Ok(mut now) = self.minutes.lock() {
            *now = minutes;
        }
    }
}

impl Clock for ManualClock {
    fn now_minutes(&self) -> f64 {
        self.minutes.lock().map(|now| *now).unwrap_or(0.0)
    }
}
