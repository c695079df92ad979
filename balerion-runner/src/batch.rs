//! Shared per-symbol batch loop for runs that need the terminal.
//!
//! Opens the session, walks the configured symbols category by category,
//! isolates each symbol's failure (panics included) and always closes the
//! session again.

use crate::error::RunError;
use crate::progress::RunProgress;
use crate::summary::{BatchSummary, SymbolDetail, SymbolResult};
use balerion_core::data::{DataError, Terminal};
use balerion_core::domain::{Category, SymbolSpec};
use balerion_core::{CollectorConfig, StopFlag};
use std::panic::{catch_unwind, AssertUnwindSafe};

pub(crate) fn run_batch<F>(
    operation: &'static str,
    terminal: &mut dyn Terminal,
    config: &CollectorConfig,
    stop: &StopFlag,
    progress: &dyn RunProgress,
    mut work: F,
) -> Result<BatchSummary, RunError>
where
    F: FnMut(&mut dyn Terminal, &SymbolSpec) -> Result<SymbolDetail, DataError>,
{
    let info = terminal.initialize().map_err(|e| match e {
        DataError::TerminalInit(message) => RunError::TerminalInit(message),
        other => RunError::TerminalInit(other.to_string()),
    })?;
    tracing::info!(terminal = terminal.name(), server = ?info.server, "terminal initialized");
    progress.on_connected(&info);

    let result = process(operation, terminal, config, stop, progress, &mut work);
    terminal.shutdown();
    tracing::debug!("terminal shut down");

    match result {
        Ok(summary) => {
            progress.on_run_complete(&summary);
            Ok(summary)
        }
        Err(RunError::Interrupted) => {
            progress.on_interrupted();
            Err(RunError::Interrupted)
        }
        Err(e) => Err(e),
    }
}

fn process<F>(
    operation: &'static str,
    terminal: &mut dyn Terminal,
    config: &CollectorConfig,
    stop: &StopFlag,
    progress: &dyn RunProgress,
    work: &mut F,
) -> Result<BatchSummary, RunError>
where
    F: FnMut(&mut dyn Terminal, &SymbolSpec) -> Result<SymbolDetail, DataError>,
{
    let mut summary = BatchSummary::new(operation, &config.data_dir);

    for category in Category::ALL {
        let specs: Vec<&SymbolSpec> = config.symbols_in(category).collect();
        if specs.is_empty() {
            continue;
        }
        progress.on_category(category);

        for (i, spec) in specs.iter().enumerate() {
            if stop.is_requested() {
                return Err(RunError::Interrupted);
            }
            progress.on_symbol_start(&spec.name, i, specs.len());

            let outcome = guarded(&spec.name, || work(&mut *terminal, *spec));
            if matches!(outcome, Err(DataError::Interrupted)) {
                return Err(RunError::Interrupted);
            }
            match &outcome {
                Ok(_) => tracing::info!(symbol = %spec.name, operation, "symbol done"),
                Err(e) => tracing::warn!(symbol = %spec.name, operation, error = %e, "symbol failed"),
            }

            let result = SymbolResult {
                symbol: spec.name.clone(),
                category,
                outcome,
            };
            progress.on_symbol_complete(&result);
            summary.results.push(result);
        }
    }

    Ok(summary)
}

/// Run one symbol's work, turning a panic into a failure for that symbol.
fn guarded<T>(
    symbol: &str,
    work: impl FnOnce() -> Result<T, DataError>,
) -> Result<T, DataError> {
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(symbol, %message, "panic while processing symbol");
            Err(DataError::Other(format!("unexpected failure: {message}")))
        }
    }
}
