//! Incremental update of persisted datasets.
//!
//! Loads each symbol's file, fetches a bounded window of recent bars, merges
//! it in (new values win) and replaces the file with backup protection.

use crate::batch::run_batch;
use crate::error::RunError;
use crate::progress::RunProgress;
use crate::summary::{BatchSummary, SymbolDetail};
use balerion_core::data::{merge, rates_to_bars, BarStore, DataError, Terminal};
use balerion_core::domain::{Bar, SymbolSpec, Timeframe};
use balerion_core::{CollectorConfig, StopFlag};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_UPDATE_DAYS: i64 = 7;
/// Largest window the CLI accepts, ten years.
pub const MAX_UPDATE_DAYS: i64 = 3_650;

#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    /// Size of the recent window to fetch, in calendar days.
    pub days: i64,
    /// Fetch even when the dataset is fresh.
    pub force: bool,
    pub now: DateTime<Utc>,
}

impl UpdateOptions {
    pub fn new(days: i64, force: bool) -> Self {
        Self {
            days,
            force,
            now: Utc::now(),
        }
    }
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_DAYS, false)
    }
}

/// Bars to request for a `days` window, allowing for market closures.
pub fn window_bars(days: i64, timeframe: Timeframe, uptime_ratio: f64, buffer: usize) -> usize {
    let expected = days.max(0) as f64 * timeframe.bars_per_day() * uptime_ratio;
    (expected.floor() as usize).saturating_add(buffer)
}

/// Update one symbol's dataset.
pub fn update_symbol(
    terminal: &mut dyn Terminal,
    store: &BarStore,
    spec: &SymbolSpec,
    config: &CollectorConfig,
    options: &UpdateOptions,
) -> Result<SymbolDetail, DataError> {
    let window = Duration::try_days(options.days).ok_or_else(|| {
        DataError::Other(format!("update window of {} days is out of range", options.days))
    })?;
    let existing = store.load_dataset(spec)?;

    if let Some(latest) = existing.bars.iter().map(|b| b.timestamp).max() {
        let age = options.now - latest;
        if !options.force && age < Duration::hours(config.freshness_hours) {
            tracing::info!(symbol = %spec.name, %latest, "dataset is fresh, skipping fetch");
            return Ok(SymbolDetail::Fresh { latest });
        }
    }

    let info = terminal
        .resolve_symbol(spec)?
        .ok_or_else(|| DataError::SymbolNotFound {
            symbol: spec.name.clone(),
            tried: spec.candidates().join(", "),
        })?;

    let count = window_bars(
        options.days,
        config.timeframe,
        config.uptime_ratio,
        config.bar_buffer,
    );
    tracing::debug!(symbol = %info.name, count, "fetching recent window");
    let rates = terminal.fetch_bars_from_position(&info.name, config.timeframe, 0, count)?;
    if rates.is_empty() {
        return Err(DataError::NotAvailable {
            symbol: spec.name.clone(),
            reason: "terminal returned no recent bars".into(),
        });
    }

    let cutoff = options.now - window;
    let recent: Vec<Bar> = rates_to_bars(&rates)?
        .into_iter()
        .filter(|b| b.timestamp >= cutoff)
        .map(|b| {
            if config.include_optional_columns {
                b
            } else {
                b.without_optional()
            }
        })
        .collect();
    if recent.is_empty() {
        return Err(DataError::NotAvailable {
            symbol: spec.name.clone(),
            reason: format!("no bars in the last {} days", options.days),
        });
    }

    let rows_before = existing.bars.len();
    let outcome = merge(existing.bars.clone(), recent);
    if outcome.bars == existing.bars {
        tracing::info!(symbol = %spec.name, rows = rows_before, "no new data");
        return Ok(SymbolDetail::Unchanged { rows: rows_before });
    }

    let path = store.replace(spec, &outcome.bars)?;
    tracing::info!(
        symbol = %spec.name,
        added = outcome.report.rows_added(),
        total = outcome.report.final_count,
        "dataset updated"
    );
    Ok(SymbolDetail::Updated {
        report: outcome.report,
        path,
    })
}

/// Update every configured symbol.
pub fn update_all(
    terminal: &mut dyn Terminal,
    config: &CollectorConfig,
    options: &UpdateOptions,
    stop: &StopFlag,
    progress: &dyn RunProgress,
) -> Result<BatchSummary, RunError> {
    let store = BarStore::from_config(config);

    progress.on_run_start(
        "WEEKLY DATA UPDATE",
        &[
            format!("Fetching last {} days of data", options.days),
            format!("Force update: {}", if options.force { "yes" } else { "no" }),
        ],
    );

    run_batch("update", terminal, config, stop, progress, |terminal, spec| {
        update_symbol(terminal, &store, spec, config, options)
    })
}
