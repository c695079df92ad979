//! Historical backfill: page backward through a terminal's bar history.
//!
//! The terminal hands out at most `chunk_size` bars per request. Starting
//! from the newest chunk, each further request is anchored one minute before
//! the earliest bar held so far (the watermark). Paging stops when the
//! terminal returns nothing, when a chunk fails to move the watermark, or
//! when the attempt budget runs out.

use super::merge::{dedup_by_timestamp, KeepStrategy};
use super::provider::{rates_to_bars, DataError, RawRate, Terminal};
use crate::config::CollectorConfig;
use crate::domain::{Bar, SymbolSpec, Timeframe};
use crate::stop::StopFlag;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillSettings {
    pub timeframe: Timeframe,
    pub chunk_size: usize,
    pub max_attempts: usize,
    pub include_optional_columns: bool,
}

impl BackfillSettings {
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            timeframe: config.timeframe,
            chunk_size: config.max_bars_per_request,
            max_attempts: config.max_historical_attempts,
            include_optional_columns: config.include_optional_columns,
        }
    }
}

/// Why the backward paging loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The terminal returned an empty chunk.
    Exhausted,
    /// A chunk's earliest bar did not precede the watermark.
    NoProgress,
    /// Every attempt returned older data.
    AttemptBudget,
}

#[derive(Debug, Clone)]
pub struct BackfillOutcome {
    /// Canonical symbol name from the config.
    pub symbol: String,
    /// Spelling the terminal resolved.
    pub resolved: String,
    pub description: String,
    /// Ascending, unique by timestamp.
    pub bars: Vec<Bar>,
    /// Chunks that contributed bars, the initial one included.
    pub chunks: usize,
    /// Bar requests sent to the terminal.
    pub calls: usize,
    pub stop: StopReason,
    pub duplicates_removed: usize,
}

impl BackfillOutcome {
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }
}

/// Collect the maximum available history for one symbol.
pub fn backfill(
    terminal: &mut dyn Terminal,
    spec: &SymbolSpec,
    settings: &BackfillSettings,
    stop: &StopFlag,
) -> Result<BackfillOutcome, DataError> {
    let info = terminal
        .resolve_symbol(spec)?
        .ok_or_else(|| DataError::SymbolNotFound {
            symbol: spec.name.clone(),
            tried: spec.candidates().join(", "),
        })?;
    let actual = info.name.clone();
    if actual != spec.name {
        tracing::info!(symbol = %spec.name, resolved = %actual, "using broker symbol");
    }

    let initial =
        terminal.fetch_bars_from_position(&actual, settings.timeframe, 0, settings.chunk_size)?;
    let mut calls = 1;

    let Some(mut earliest) = earliest_time(&initial) else {
        return Err(DataError::NotAvailable {
            symbol: spec.name.clone(),
            reason: "initial request returned no bars".into(),
        });
    };
    tracing::debug!(symbol = %actual, bars = initial.len(), "initial chunk");

    // newest first; reversed when flattened
    let mut chunks: Vec<Vec<RawRate>> = vec![initial];
    let mut reason = StopReason::AttemptBudget;

    for attempt in 1..=settings.max_attempts {
        if stop.is_requested() {
            return Err(DataError::Interrupted);
        }

        let anchor = DateTime::from_timestamp(earliest, 0)
            .ok_or_else(|| DataError::Other(format!("watermark out of range: {earliest}")))?
            - Duration::minutes(1);

        let chunk =
            terminal.fetch_bars_from_time(&actual, settings.timeframe, anchor, settings.chunk_size)?;
        calls += 1;

        let Some(chunk_earliest) = earliest_time(&chunk) else {
            tracing::debug!(symbol = %actual, attempt, "history exhausted");
            reason = StopReason::Exhausted;
            break;
        };
        if chunk_earliest >= earliest {
            tracing::debug!(symbol = %actual, attempt, "reached earliest available data");
            reason = StopReason::NoProgress;
            break;
        }

        let older: Vec<RawRate> = chunk.into_iter().filter(|r| r.time < earliest).collect();
        tracing::debug!(symbol = %actual, attempt, bars = older.len(), "older chunk");
        chunks.push(older);
        earliest = chunk_earliest;
    }

    let accepted = chunks.len();
    let rates: Vec<RawRate> = chunks.into_iter().rev().flatten().collect();
    let mut bars = rates_to_bars(&rates)?;
    if !settings.include_optional_columns {
        bars = bars.into_iter().map(Bar::without_optional).collect();
    }
    let (bars, duplicates_removed) = dedup_by_timestamp(bars, KeepStrategy::First);

    tracing::info!(
        symbol = %spec.name,
        bars = bars.len(),
        chunks = accepted,
        calls,
        ?reason,
        "backfill complete"
    );

    Ok(BackfillOutcome {
        symbol: spec.name.clone(),
        resolved: actual,
        description: info.description,
        bars,
        chunks: accepted,
        calls,
        stop: reason,
        duplicates_removed,
    })
}

fn earliest_time(rates: &[RawRate]) -> Option<i64> {
    rates.iter().map(|r| r.time).min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fake::FakeTerminal;
    use crate::domain::Category;
    use chrono::TimeZone;

    fn settings(chunk_size: usize, max_attempts: usize) -> BackfillSettings {
        BackfillSettings {
            timeframe: Timeframe::M1,
            chunk_size,
            max_attempts,
            include_optional_columns: true,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
    }

    #[test]
    fn pages_until_history_is_exhausted() {
        let mut terminal = FakeTerminal::new().with_minute_history("EURUSD", start(), 250);
        let spec = SymbolSpec::new("EURUSD", Category::Fx);

        let outcome = backfill(&mut terminal, &spec, &settings(100, 10), &StopFlag::new()).unwrap();

        assert_eq!(outcome.bars.len(), 250);
        assert_eq!(outcome.stop, StopReason::Exhausted);
        // 100 + 100 + 50, then one empty
        assert_eq!(outcome.chunks, 3);
        assert_eq!(outcome.calls, 4);
        assert_eq!(outcome.first_timestamp(), Some(start()));
        assert!(outcome
            .bars
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn respects_attempt_budget() {
        let mut terminal = FakeTerminal::new().with_minute_history("EURUSD", start(), 1_000);
        let spec = SymbolSpec::new("EURUSD", Category::Fx);

        let outcome = backfill(&mut terminal, &spec, &settings(100, 2), &StopFlag::new()).unwrap();

        assert_eq!(outcome.stop, StopReason::AttemptBudget);
        assert_eq!(outcome.bars.len(), 300);
        assert_eq!(outcome.calls, 3);
    }

    #[test]
    fn stops_when_watermark_does_not_move() {
        let mut terminal = FakeTerminal::new()
            .with_minute_history("EURUSD", start(), 100)
            .with_history_floor("EURUSD");
        let spec = SymbolSpec::new("EURUSD", Category::Fx);

        let outcome = backfill(&mut terminal, &spec, &settings(100, 10), &StopFlag::new()).unwrap();

        assert_eq!(outcome.stop, StopReason::NoProgress);
        assert_eq!(outcome.bars.len(), 100);
        assert_eq!(outcome.calls, 2);
    }

    #[test]
    fn resolves_alternative_spelling() {
        let mut terminal = FakeTerminal::new().with_minute_history("US30.cash", start(), 10);
        let spec = SymbolSpec::new("US30", Category::Indices)
            .with_alternatives(["US30", "US30.cash", "DJ30"]);

        let outcome = backfill(&mut terminal, &spec, &settings(100, 10), &StopFlag::new()).unwrap();

        assert_eq!(outcome.symbol, "US30");
        assert_eq!(outcome.resolved, "US30.cash");
        assert_eq!(outcome.bars.len(), 10);
    }

    #[test]
    fn unknown_symbol_is_not_found() {
        let mut terminal = FakeTerminal::new();
        let spec = SymbolSpec::new("AUDNZD", Category::Fx).with_alternatives(["AUDNZD", "AUDNZDm"]);

        let err = backfill(&mut terminal, &spec, &settings(100, 10), &StopFlag::new()).unwrap_err();
        match err {
            DataError::SymbolNotFound { symbol, tried } => {
                assert_eq!(symbol, "AUDNZD");
                assert_eq!(tried, "AUDNZD, AUDNZDm");
            }
            other => panic!("expected SymbolNotFound, got {other:?}"),
        }
    }

    #[test]
    fn empty_initial_chunk_is_not_available() {
        let mut terminal = FakeTerminal::new().with_minute_history("USDCAD", start(), 0);
        let spec = SymbolSpec::new("USDCAD", Category::Fx);

        let err = backfill(&mut terminal, &spec, &settings(100, 10), &StopFlag::new()).unwrap_err();
        assert!(matches!(err, DataError::NotAvailable { .. }));
    }

    #[test]
    fn interrupt_aborts_paging() {
        let mut terminal = FakeTerminal::new().with_minute_history("EURUSD", start(), 500);
        let spec = SymbolSpec::new("EURUSD", Category::Fx);
        let stop = StopFlag::new();
        stop.request();

        let err = backfill(&mut terminal, &spec, &settings(100, 10), &stop).unwrap_err();
        assert!(matches!(err, DataError::Interrupted));
        assert_eq!(terminal.fetch_calls(), 1);
    }

    #[test]
    fn optional_columns_can_be_dropped() {
        let mut terminal = FakeTerminal::new().with_minute_history("EURUSD", start(), 5);
        let spec = SymbolSpec::new("EURUSD", Category::Fx);
        let mut s = settings(100, 10);
        s.include_optional_columns = false;

        let outcome = backfill(&mut terminal, &spec, &s, &StopFlag::new()).unwrap();
        assert!(outcome.bars.iter().all(|b| b.spread.is_none() && b.real_volume.is_none()));
    }
}
