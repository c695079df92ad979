//! Read-only quality report over every configured dataset.

use crate::progress::RunProgress;
use balerion_core::data::BarStore;
use balerion_core::domain::Category;
use balerion_core::quality::{check_file, CheckTally, FileCheck};
use balerion_core::CollectorConfig;

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub checks: Vec<FileCheck>,
    pub tally: CheckTally,
}

impl CheckReport {
    pub fn all_ok(&self) -> bool {
        self.tally.all_ok()
    }
}

/// Inspect each symbol's file, category by category. Never modifies data.
pub fn check_all(config: &CollectorConfig, progress: &dyn RunProgress) -> CheckReport {
    let store = BarStore::from_config(config);
    progress.on_run_start(
        "DATA QUALITY CHECK",
        &[format!("Data directory: {}", config.data_dir.display())],
    );

    let mut report = CheckReport::default();
    for category in Category::ALL {
        let specs: Vec<_> = config.symbols_in(category).collect();
        if specs.is_empty() {
            continue;
        }
        progress.on_category(category);

        for spec in specs {
            let check = check_file(&store, spec);
            tracing::debug!(symbol = %check.symbol, passed = check.passed(), "checked");
            progress.on_file_check(&check);
            report.tally.record(&check);
            report.checks.push(check);
        }
    }

    progress.on_check_complete(&report.tally);
    report
}
