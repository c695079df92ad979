//! Read-only dataset inspection.
//!
//! Summarises each persisted file without judging it: a file passes as long
//! as it exists and can be read. Schema mismatches, duplicates, missing
//! values and long gaps are reported as warnings.

use crate::data::store::{BarStore, Dataset};
use crate::data::DataError;
use crate::domain::{Bar, Category, SymbolSpec};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Gaps longer than this are counted as "large".
pub const LARGE_GAP_HOURS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    pub rows: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub span_days: i64,
    pub duplicates: usize,
    pub nulls: usize,
    pub large_gaps: usize,
    pub file_size: u64,
    pub min_low: Option<f64>,
    pub max_high: Option<f64>,
    /// Strict schema mismatch on a file that could still be read.
    #[serde(default)]
    pub schema_warning: Option<String>,
}

impl FileStats {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut stats = Self::from_bars(&dataset.bars);
        stats.nulls = dataset.null_count;
        stats.file_size = dataset.file_size;
        stats.schema_warning = dataset.schema_issue.clone();
        stats
    }

    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut times: Vec<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
        times.sort();

        let first = times.first().copied();
        let last = times.last().copied();
        let span_days = match (first, last) {
            (Some(f), Some(l)) => (l - f).num_days(),
            _ => 0,
        };
        let duplicates = times.windows(2).filter(|w| w[0] == w[1]).count();
        let limit = Duration::hours(LARGE_GAP_HOURS);
        let large_gaps = times.windows(2).filter(|w| w[1] - w[0] > limit).count();

        let min_low = bars
            .iter()
            .map(|b| b.low)
            .filter(|v| !v.is_nan())
            .reduce(f64::min);
        let max_high = bars
            .iter()
            .map(|b| b.high)
            .filter(|v| !v.is_nan())
            .reduce(f64::max);

        Self {
            rows: bars.len(),
            first,
            last,
            span_days,
            duplicates,
            nulls: bars.iter().filter(|b| b.is_void()).count(),
            large_gaps,
            file_size: 0,
            min_low,
            max_high,
            schema_warning: None,
        }
    }

    pub fn span_years(&self) -> f64 {
        self.span_days as f64 / 365.25
    }

    pub fn file_size_mb(&self) -> f64 {
        self.file_size as f64 / (1024.0 * 1024.0)
    }

    pub fn has_warnings(&self) -> bool {
        self.duplicates > 0
            || self.nulls > 0
            || self.large_gaps > 0
            || self.schema_warning.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FileStatus {
    Missing,
    Unreadable(String),
    Ok(FileStats),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCheck {
    pub symbol: String,
    pub category: Category,
    pub path: PathBuf,
    pub status: FileStatus,
}

impl FileCheck {
    pub fn passed(&self) -> bool {
        matches!(self.status, FileStatus::Ok(_))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Inspect one symbol's dataset.
pub fn check_file(store: &BarStore, spec: &SymbolSpec) -> FileCheck {
    let path = store.path_for(spec);
    let status = match store.inspect(spec) {
        Ok(dataset) => FileStatus::Ok(FileStats::from_dataset(&dataset)),
        Err(DataError::NoDataset { .. }) => FileStatus::Missing,
        Err(e) => {
            tracing::warn!(symbol = %spec.name, error = %e, "dataset unreadable");
            FileStatus::Unreadable(e.to_string())
        }
    };
    FileCheck {
        symbol: spec.name.clone(),
        category: spec.category,
        path,
        status,
    }
}

/// Pass counts per category and overall.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckTally {
    pub per_category: BTreeMap<Category, (usize, usize)>,
}

impl CheckTally {
    pub fn record(&mut self, check: &FileCheck) {
        let entry = self.per_category.entry(check.category).or_default();
        entry.1 += 1;
        if check.passed() {
            entry.0 += 1;
        }
    }

    /// `(ok, checked)` for one category.
    pub fn category(&self, category: Category) -> (usize, usize) {
        self.per_category.get(&category).copied().unwrap_or_default()
    }

    /// `(ok, checked)` across all categories.
    pub fn overall(&self) -> (usize, usize) {
        self.per_category
            .values()
            .fold((0, 0), |acc, (ok, n)| (acc.0 + ok, acc.1 + n))
    }

    pub fn all_ok(&self) -> bool {
        let (ok, n) = self.overall();
        ok == n
    }
}
