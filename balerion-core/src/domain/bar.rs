//! Bar: one time bucket of price activity for a symbol.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol and a single timeframe bucket.
///
/// `volume` is the terminal's tick volume. `spread` and `real_volume` are
/// only present when the terminal reports them and the config keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub spread: Option<i32>,
    pub real_volume: Option<u64>,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (a null read back from disk).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Price relationships hold and every price is strictly positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }

    /// True when the timestamp sits exactly on a minute boundary.
    pub fn is_minute_aligned(&self) -> bool {
        self.timestamp.second() == 0 && self.timestamp.nanosecond() == 0
    }

    /// High-low range of the bar.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Drop the optional columns.
    pub fn without_optional(mut self) -> Self {
        self.spread = None;
        self.real_volume = None;
        self
    }
}
