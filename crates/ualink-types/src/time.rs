// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA timestamps.
//!
//! The wire format counts 100-nanosecond intervals since 1601-01-01 00:00:00
//! UTC. [`UaDateTime`] stores that tick count directly and converts to and
//! from `chrono` types at the API boundary.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, DecodeCursor, UaDecode, UaEncode};

/// Ticks between 1601-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/// Nanoseconds per tick.
const NANOS_PER_TICK: i64 = 100;

// =============================================================================
// UaDateTime
// =============================================================================

/// A timestamp in 100 ns ticks since 1601-01-01 UTC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UaDateTime(pub i64);

impl UaDateTime {
    /// The null timestamp (tick 0).
    pub const NULL: UaDateTime = UaDateTime(0);

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_chrono(Utc::now())
    }

    /// Converts from a `chrono` UTC timestamp.
    pub fn from_chrono(when: DateTime<Utc>) -> Self {
        let nanos = when.timestamp_nanos_opt().unwrap_or(0);
        Self(nanos / NANOS_PER_TICK + UNIX_EPOCH_TICKS)
    }

    /// Converts to a `chrono` UTC timestamp, clamping out-of-range ticks.
    pub fn to_chrono(self) -> DateTime<Utc> {
        let unix_ticks = self.0 - UNIX_EPOCH_TICKS;
        let secs = unix_ticks.div_euclid(10_000_000);
        let nanos = (unix_ticks.rem_euclid(10_000_000) * NANOS_PER_TICK) as u32;
        Utc.timestamp_opt(secs, nanos)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Returns `true` if this is the null timestamp.
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for UaDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "<null>")
        } else {
            write!(f, "{}", self.to_chrono().to_rfc3339())
        }
    }
}

impl UaEncode for UaDateTime {
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }
}

impl UaDecode for UaDateTime {
    #[inline]
    fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, CodecError> {
        Ok(Self(cur.read_i64()?))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let epoch = UaDateTime::from_chrono(Utc.timestamp_opt(0, 0).unwrap());
        assert_eq!(epoch.0, UNIX_EPOCH_TICKS);
        assert_eq!(epoch.to_chrono().timestamp(), 0);
    }

    #[test]
    fn test_chrono_round_trip() {
        let when = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 45).unwrap();
        let ticks = UaDateTime::from_chrono(when);
        assert_eq!(ticks.to_chrono(), when);
    }

    #[test]
    fn test_now_is_recent() {
        let now = UaDateTime::now();
        assert!(now.0 > UNIX_EPOCH_TICKS);
        assert!(!now.is_null());
    }
}
