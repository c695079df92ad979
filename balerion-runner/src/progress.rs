//! Human-readable run output.
//!
//! Orchestration functions report through `RunProgress` and never print
//! directly, so tests can run them silently.

use crate::summary::{BatchSummary, SymbolDetail, SymbolResult};
use crate::validate::ValidationSummary;
use balerion_core::data::TerminalInfo;
use balerion_core::domain::Category;
use balerion_core::quality::{CheckTally, FileCheck, FileStatus, ValidationReport};
use chrono::Local;
use std::path::Path;

pub trait RunProgress {
    /// Called once before anything else, with extra banner lines.
    fn on_run_start(&self, title: &str, details: &[String]);

    /// Called after the terminal session is open.
    fn on_connected(&self, info: &TerminalInfo);

    /// Called before the symbols of a category are processed.
    fn on_category(&self, category: Category);

    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize);

    fn on_symbol_complete(&self, result: &SymbolResult);

    /// Called when a stop request ends the run early.
    fn on_interrupted(&self);

    fn on_run_complete(&self, summary: &BatchSummary);

    fn on_file_check(&self, check: &FileCheck);

    fn on_check_complete(&self, tally: &CheckTally);

    fn on_validation(&self, report: &ValidationReport);

    fn on_validation_skipped(&self, symbol: &str, path: &Path);

    fn on_validation_complete(&self, summary: &ValidationSummary);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

fn heavy_rule() -> String {
    "=".repeat(80)
}

fn light_rule() -> String {
    "-".repeat(80)
}

fn category_heading(category: Category) -> &'static str {
    match category {
        Category::Fx => "FX SYMBOLS",
        Category::Indices => "INDEX SYMBOLS",
    }
}

impl RunProgress for StdoutProgress {
    fn on_run_start(&self, title: &str, details: &[String]) {
        println!("{}", heavy_rule());
        println!("{title}");
        println!("{}", heavy_rule());
        println!("Started at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        for line in details {
            println!("{line}");
        }
    }

    fn on_connected(&self, info: &TerminalInfo) {
        match (&info.server, info.login) {
            (Some(server), Some(login)) => println!("Connected to: {server} (Account: {login})"),
            (Some(server), None) => println!("Connected to: {server}"),
            _ => println!("Connected to terminal"),
        }
    }

    fn on_category(&self, category: Category) {
        println!("\n{}", heavy_rule());
        println!("{}", category_heading(category));
        println!("{}", heavy_rule());
    }

    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] {symbol}...", index + 1, total);
    }

    fn on_symbol_complete(&self, result: &SymbolResult) {
        let symbol = &result.symbol;
        match &result.outcome {
            Ok(SymbolDetail::Collected {
                resolved,
                rows,
                first,
                last,
                path,
                ..
            }) => {
                if resolved != symbol {
                    println!("  Using broker symbol {resolved}");
                }
                println!("  OK: {symbol}: {rows} bars, {first} to {last}");
                println!("  Saved to {}", path.display());
            }
            Ok(SymbolDetail::Updated { report, path }) => {
                println!(
                    "  OK: {symbol}: added {} rows ({} overlapping rows refreshed), {} total",
                    report.rows_added(),
                    report.duplicates_removed,
                    report.final_count
                );
                println!("  Saved to {}", path.display());
            }
            Ok(SymbolDetail::Unchanged { rows }) => {
                println!("  OK: {symbol}: no new data ({rows} rows)");
            }
            Ok(SymbolDetail::Fresh { latest }) => {
                println!("  OK: {symbol}: data is recent (last bar {latest}), skipped");
                println!("  Use --force to update anyway");
            }
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_interrupted(&self) {
        println!("\nInterrupted by user");
    }

    fn on_run_complete(&self, summary: &BatchSummary) {
        println!("\n{}", heavy_rule());
        println!("{} SUMMARY", summary.operation.to_uppercase());
        println!("{}", heavy_rule());

        for category in Category::ALL {
            let total = summary.in_category(category).count();
            if total == 0 {
                continue;
            }
            let ok = summary.names(category, true);
            let failed = summary.names(category, false);
            println!("\n{} symbols:", category.label());
            println!("  Success: {}/{total}", ok.len());
            if !ok.is_empty() {
                println!("    {}", ok.join(", "));
            }
            if !failed.is_empty() {
                println!("  Failed: {}/{total}", failed.len());
                println!("    {}", failed.join(", "));
            }
        }

        println!(
            "\nOverall: {}/{} symbols succeeded",
            summary.succeeded(),
            summary.total()
        );
        if summary.operation == "collect" {
            println!("\nData saved to:");
            for category in Category::ALL {
                println!("  {}", summary.data_dir.join(category.dir_name()).display());
            }
        }
        println!("\nCompleted at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    }

    fn on_file_check(&self, check: &FileCheck) {
        let name = check.file_name();
        match &check.status {
            FileStatus::Missing => println!("  MISSING: {name}"),
            FileStatus::Unreadable(e) => println!("  ERROR: {name}: {e}\n"),
            FileStatus::Ok(stats) => {
                println!("  OK: {name}");
                println!("    Rows: {}", stats.rows);
                if let (Some(first), Some(last)) = (stats.first, stats.last) {
                    println!("    Date range: {first} to {last}");
                }
                println!(
                    "    Time span: {} days ({:.2} years)",
                    stats.span_days,
                    stats.span_years()
                );
                if let Some(issue) = &stats.schema_warning {
                    println!("    WARN schema: {issue}");
                }
                if stats.duplicates > 0 {
                    println!("    WARN duplicates: {}", stats.duplicates);
                }
                if stats.nulls > 0 {
                    println!("    WARN missing values: {}", stats.nulls);
                }
                if stats.large_gaps > 0 {
                    println!("    INFO large gaps (>2h): {}", stats.large_gaps);
                }
                println!("    File size: {:.2} MB", stats.file_size_mb());
                if let (Some(low), Some(high)) = (stats.min_low, stats.max_high) {
                    println!("    Price range: {low:.4} - {high:.4}");
                }
                println!();
            }
        }
    }

    fn on_check_complete(&self, tally: &CheckTally) {
        println!("{}", heavy_rule());
        println!("SUMMARY");
        println!("{}", heavy_rule());
        for category in Category::ALL {
            let (ok, n) = tally.category(category);
            if n > 0 {
                println!("{}: {ok}/{n} files OK", category.label());
            }
        }
        let (ok, n) = tally.overall();
        println!("Overall: {ok}/{n} files OK");
    }

    fn on_validation(&self, report: &ValidationReport) {
        if report.passed() {
            println!("  PASS: {} ({} rows)", report.symbol, report.rows);
            return;
        }
        println!("  FAIL: {} ({} rows)", report.symbol, report.rows);
        for failure in report.failures() {
            println!(
                "    {} [{} violations]: {}",
                failure.rule, failure.violations, failure.detail
            );
        }
    }

    fn on_validation_skipped(&self, symbol: &str, path: &Path) {
        println!("  SKIP: {symbol}: no data file at {}", path.display());
    }

    fn on_validation_complete(&self, summary: &ValidationSummary) {
        println!("{}", light_rule());
        println!(
            "{} passed, {} failed, {} skipped",
            summary.passed_count(),
            summary.failed_count(),
            summary.skipped.len()
        );
    }
}

/// Progress reporter that discards everything.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn on_run_start(&self, _title: &str, _details: &[String]) {}
    fn on_connected(&self, _info: &TerminalInfo) {}
    fn on_category(&self, _category: Category) {}
    fn on_symbol_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_symbol_complete(&self, _result: &SymbolResult) {}
    fn on_interrupted(&self) {}
    fn on_run_complete(&self, _summary: &BatchSummary) {}
    fn on_file_check(&self, _check: &FileCheck) {}
    fn on_check_complete(&self, _tally: &CheckTally) {}
    fn on_validation(&self, _report: &ValidationReport) {}
    fn on_validation_skipped(&self, _symbol: &str, _path: &Path) {}
    fn on_validation_complete(&self, _summary: &ValidationSummary) {}
}
