//! Dataset validation: the quality rules over each persisted file.

use crate::error::RunError;
use crate::progress::RunProgress;
use balerion_core::data::{BarStore, DataError};
use balerion_core::domain::{Category, SymbolSpec};
use balerion_core::quality::{validate_bars, ValidationReport};
use balerion_core::CollectorConfig;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub reports: Vec<ValidationReport>,
    /// Symbols with no dataset on disk.
    pub skipped: Vec<String>,
}

impl ValidationSummary {
    pub fn passed(&self) -> bool {
        self.reports.iter().all(ValidationReport::passed)
    }

    pub fn passed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.reports.len() - self.passed_count()
    }
}

/// Validate one symbol's dataset. `None` when the file is missing.
pub fn validate_symbol(
    store: &BarStore,
    spec: &SymbolSpec,
    config: &CollectorConfig,
    now: DateTime<Utc>,
) -> Option<ValidationReport> {
    match store.load_dataset(spec) {
        Ok(dataset) => Some(validate_bars(
            &spec.name,
            &dataset.bars,
            dataset.null_count,
            now,
            &config.quality,
        )),
        Err(DataError::NoDataset { .. }) => None,
        Err(e) => {
            tracing::warn!(symbol = %spec.name, error = %e, "dataset failed to load");
            Some(ValidationReport::schema_failure(&spec.name, e.to_string()))
        }
    }
}

/// Validate every configured symbol, or only `only` when given.
pub fn validate_all(
    config: &CollectorConfig,
    only: Option<&str>,
    now: DateTime<Utc>,
    progress: &dyn RunProgress,
) -> Result<ValidationSummary, RunError> {
    let selected: Vec<&SymbolSpec> = match only {
        Some(name) => vec![config
            .find_symbol(name)
            .ok_or_else(|| RunError::UnknownSymbol(name.to_string()))?],
        None => Category::ALL
            .iter()
            .flat_map(|c| config.symbols_in(*c))
            .collect(),
    };

    let store = BarStore::from_config(config);
    progress.on_run_start(
        "DATASET VALIDATION",
        &[format!("Data directory: {}", config.data_dir.display())],
    );

    let mut summary = ValidationSummary::default();
    for spec in selected {
        match validate_symbol(&store, spec, config, now) {
            Some(report) => {
                tracing::info!(symbol = %spec.name, passed = report.passed(), "validated");
                progress.on_validation(&report);
                summary.reports.push(report);
            }
            None => {
                progress.on_validation_skipped(&spec.name, &store.path_for(spec));
                summary.skipped.push(spec.name.clone());
            }
        }
    }

    progress.on_validation_complete(&summary);
    Ok(summary)
}
