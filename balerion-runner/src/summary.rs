//! Per-symbol outcomes of a batch run, grouped by category.

use balerion_core::data::{DataError, MergeReport, StopReason};
use balerion_core::domain::Category;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// What a successful symbol run did.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolDetail {
    /// Full history collected and written.
    Collected {
        resolved: String,
        rows: usize,
        first: DateTime<Utc>,
        last: DateTime<Utc>,
        stop: StopReason,
        path: PathBuf,
    },
    /// Recent bars merged in and the file replaced.
    Updated { report: MergeReport, path: PathBuf },
    /// Recent bars fetched but nothing changed; no write.
    Unchanged { rows: usize },
    /// Newest stored bar is younger than the freshness threshold.
    Fresh { latest: DateTime<Utc> },
}

#[derive(Debug)]
pub struct SymbolResult {
    pub symbol: String,
    pub category: Category,
    pub outcome: Result<SymbolDetail, DataError>,
}

impl SymbolResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug)]
pub struct BatchSummary {
    /// "collect" or "update".
    pub operation: &'static str,
    pub data_dir: PathBuf,
    pub results: Vec<SymbolResult>,
}

impl BatchSummary {
    pub fn new(operation: &'static str, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            operation,
            data_dir: data_dir.into(),
            results: Vec::new(),
        }
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &SymbolResult> {
        self.results.iter().filter(move |r| r.category == category)
    }

    /// Names of the symbols in `category` that succeeded (or failed).
    pub fn names(&self, category: Category, succeeded: bool) -> Vec<&str> {
        self.in_category(category)
            .filter(|r| r.succeeded() == succeeded)
            .map(|r| r.symbol.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(symbol: &str, category: Category, ok: bool) -> SymbolResult {
        SymbolResult {
            symbol: symbol.into(),
            category,
            outcome: if ok {
                Ok(SymbolDetail::Unchanged { rows: 1 })
            } else {
                Err(DataError::Other("boom".into()))
            },
        }
    }

    #[test]
    fn groups_by_category() {
        let mut summary = BatchSummary::new("update", "data");
        summary.results.push(result("EURUSD", Category::Fx, true));
        summary.results.push(result("USDJPY", Category::Fx, false));
        summary.results.push(result("US30", Category::Indices, true));

        assert_eq!(summary.names(Category::Fx, true), vec!["EURUSD"]);
        assert_eq!(summary.names(Category::Fx, false), vec!["USDJPY"]);
        assert_eq!(summary.names(Category::Indices, true), vec!["US30"]);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.all_succeeded());
    }
}
