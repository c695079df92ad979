//! Terminal capability trait and structured error types.
//!
//! The `Terminal` trait abstracts over the vendor trading terminal (the HTTP
//! bridge in production, an in-memory fake in tests) so the backfill and
//! update algorithms never talk to a live session directly.

use super::schema::SchemaError;
use crate::domain::{Bar, SymbolSpec, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One rate record exactly as the terminal returns it.
///
/// `time` is seconds since the Unix epoch. `tick_volume` becomes the bar's
/// `volume` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRate {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: u64,
    #[serde(default)]
    pub spread: i32,
    #[serde(default)]
    pub real_volume: u64,
}

impl RawRate {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }

    /// Convert to the canonical bar, renaming `time` and `tick_volume`.
    pub fn to_bar(&self) -> Result<Bar, DataError> {
        let timestamp = self.timestamp().ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("invalid rate time: {}", self.time))
        })?;
        Ok(Bar {
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.tick_volume,
            spread: Some(self.spread),
            real_volume: Some(self.real_volume),
        })
    }
}

/// Symbol metadata reported by the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Whether the symbol is shown in the terminal's market watch. Bars can
    /// only be requested for visible symbols.
    pub visible: bool,
}

/// Connection details reported after a successful initialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInfo {
    pub server: Option<String>,
    pub login: Option<u64>,
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("symbol {symbol} not found in terminal (tried: {tried})")]
    SymbolNotFound { symbol: String, tried: String },

    #[error("no data available for {symbol}: {reason}")]
    NotAvailable { symbol: String, reason: String },

    #[error("no existing data for '{symbol}' at {path}. Run `balerion collect` first")]
    NoDataset { symbol: String, path: String },

    #[error("interrupted")]
    Interrupted,

    #[error("terminal initialization failed: {0}")]
    TerminalInit(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("csv I/O error: {0}")]
    CsvError(String),

    #[error("file I/O error: {0}")]
    Io(String),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for trading terminals.
///
/// The session is stateful, so every call takes `&mut self`. An empty vector
/// from a fetch means "no data", never an error. A terminal that cannot serve
/// the symbol at all says so with `NotAvailable`.
pub trait Terminal {
    /// Human-readable name of this terminal backend.
    fn name(&self) -> &str;

    /// Open the session. Failure here is fatal for a run.
    fn initialize(&mut self) -> Result<TerminalInfo, DataError>;

    /// Close the session. Idempotent.
    fn shutdown(&mut self);

    /// Look up a symbol by its broker spelling.
    fn symbol_info(&mut self, symbol: &str) -> Result<Option<SymbolInfo>, DataError>;

    /// Make a symbol visible so bars can be requested. Returns false if the
    /// terminal refused.
    fn enable_symbol(&mut self, symbol: &str) -> Result<bool, DataError>;

    /// Up to `count` bars ending `start_pos` bars before the newest one,
    /// ascending by time.
    fn fetch_bars_from_position(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> Result<Vec<RawRate>, DataError>;

    /// Up to `count` bars opening at or before `anchor`, ascending by time.
    fn fetch_bars_from_time(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        anchor: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<RawRate>, DataError>;

    /// Find the first spelling of `spec` the terminal knows, enabling it if
    /// it is hidden. A spelling that cannot be enabled is skipped.
    fn resolve_symbol(&mut self, spec: &SymbolSpec) -> Result<Option<SymbolInfo>, DataError> {
        for candidate in spec.candidates() {
            let Some(mut info) = self.symbol_info(candidate)? else {
                continue;
            };
            if !info.visible {
                if !self.enable_symbol(candidate)? {
                    tracing::debug!(symbol = candidate, "terminal refused to enable symbol");
                    continue;
                }
                tracing::info!(symbol = candidate, "enabled symbol");
                info.visible = true;
            }
            return Ok(Some(info));
        }
        Ok(None)
    }
}

/// Convert a chunk of raw rates to bars.
pub fn rates_to_bars(rates: &[RawRate]) -> Result<Vec<Bar>, DataError> {
    rates.iter().map(RawRate::to_bar).collect()
}
