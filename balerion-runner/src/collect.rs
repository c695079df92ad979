//! Initial history collection for every configured symbol.

use crate::batch::run_batch;
use crate::error::RunError;
use crate::progress::RunProgress;
use crate::summary::{BatchSummary, SymbolDetail};
use balerion_core::data::{backfill, BackfillSettings, BarStore, DataError, Terminal};
use balerion_core::domain::SymbolSpec;
use balerion_core::{CollectorConfig, StopFlag};

/// Backfill one symbol and write its dataset.
pub fn collect_symbol(
    terminal: &mut dyn Terminal,
    store: &BarStore,
    spec: &SymbolSpec,
    settings: &BackfillSettings,
    stop: &StopFlag,
) -> Result<SymbolDetail, DataError> {
    let outcome = backfill(terminal, spec, settings, stop)?;
    let (Some(first), Some(last)) = (outcome.first_timestamp(), outcome.last_timestamp()) else {
        return Err(DataError::NotAvailable {
            symbol: spec.name.clone(),
            reason: "backfill produced no bars".into(),
        });
    };
    let path = store.write(spec, &outcome.bars)?;

    Ok(SymbolDetail::Collected {
        resolved: outcome.resolved,
        rows: outcome.bars.len(),
        first,
        last,
        stop: outcome.stop,
        path,
    })
}

/// Collect the maximum available history for every configured symbol.
///
/// Terminal initialization failure aborts the run; any other failure only
/// fails its symbol.
pub fn collect_all(
    terminal: &mut dyn Terminal,
    config: &CollectorConfig,
    stop: &StopFlag,
    progress: &dyn RunProgress,
) -> Result<BatchSummary, RunError> {
    let store = BarStore::from_config(config);
    let settings = BackfillSettings::from_config(config);

    progress.on_run_start(
        "HISTORICAL DATA COLLECTION",
        &[
            format!("Timeframe: {}", settings.timeframe),
            format!("Max bars per request: {}", settings.chunk_size),
            format!("Max historical attempts: {}", settings.max_attempts),
        ],
    );

    run_batch("collect", terminal, config, stop, progress, |terminal, spec| {
        collect_symbol(terminal, &store, spec, &settings, stop)
    })
}
