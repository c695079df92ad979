//! Quality rules over real collected data.
//!
//! Runs only when `BALERION_DATA_DIR` points at a data directory produced by
//! `balerion collect`; otherwise every test returns immediately.

use balerion_core::CollectorConfig;
use balerion_runner::{validate_all, SilentProgress};
use chrono::Utc;
use std::path::PathBuf;

fn data_dir() -> Option<PathBuf> {
    std::env::var_os("BALERION_DATA_DIR").map(PathBuf::from)
}

#[test]
fn collected_datasets_pass_every_rule() {
    let Some(dir) = data_dir() else {
        return;
    };
    let config = CollectorConfig::default().with_data_dir(dir);

    let summary = validate_all(&config, None, Utc::now(), &SilentProgress).unwrap();

    for report in &summary.reports {
        let failures: Vec<String> = report
            .failures()
            .map(|f| format!("{}: {}", f.rule, f.detail))
            .collect();
        assert!(
            failures.is_empty(),
            "{} failed:\n  {}",
            report.symbol,
            failures.join("\n  ")
        );
    }
}
