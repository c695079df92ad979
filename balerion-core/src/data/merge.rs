//! Deduplication and merge of bar collections.
//!
//! Two keep strategies exist on purpose. Backfill accumulates chunks that
//! never overlap, so the first copy of a timestamp is authoritative. Updates
//! fetch a window that deliberately overlaps the stored data, so the freshly
//! fetched copy replaces the stored one.

use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Which occurrence of a duplicated timestamp survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepStrategy {
    First,
    Last,
}

/// Row accounting for one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub existing: usize,
    pub new: usize,
    pub duplicates_removed: usize,
    pub final_count: usize,
}

impl MergeReport {
    /// Rows the merge added beyond the existing dataset.
    pub fn rows_added(&self) -> usize {
        self.final_count.saturating_sub(self.existing)
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub bars: Vec<Bar>,
    pub report: MergeReport,
}

/// Sort ascending by timestamp and drop duplicate timestamps.
///
/// Returns the canonical bars and the number of rows removed.
pub fn dedup_by_timestamp(mut bars: Vec<Bar>, keep: KeepStrategy) -> (Vec<Bar>, usize) {
    let before = bars.len();
    // stable: equal timestamps keep their arrival order
    bars.sort_by_key(|b| b.timestamp);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(prev) if prev.timestamp == bar.timestamp => {
                if keep == KeepStrategy::Last {
                    *prev = bar;
                }
            }
            _ => out.push(bar),
        }
    }

    let removed = before - out.len();
    (out, removed)
}

/// Merge freshly fetched bars into an existing dataset. New values win on
/// timestamp collision.
pub fn merge(existing: Vec<Bar>, new: Vec<Bar>) -> MergeOutcome {
    let existing_count = existing.len();
    let new_count = new.len();

    let mut combined = existing;
    combined.extend(new);
    let (bars, duplicates_removed) = dedup_by_timestamp(combined, KeepStrategy::Last);

    let report = MergeReport {
        existing: existing_count,
        new: new_count,
        duplicates_removed,
        final_count: bars.len(),
    };
    tracing::debug!(?report, "merged bars");

    MergeOutcome { bars, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn bar_at(ts: DateTime<Utc>, close: f64) -> Bar {
        Bar {
            timestamp: ts,
            open: close,
            high: close + 0.001,
            low: close - 0.001,
            close,
            volume: 10,
            spread: None,
            real_volume: None,
        }
    }

    fn minute_series(start: DateTime<Utc>, end: DateTime<Utc>, close: f64) -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut ts = start;
        while ts <= end {
            bars.push(bar_at(ts, close));
            ts += Duration::minutes(1);
        }
        bars
    }

    #[test]
    fn dedup_keep_first_prefers_earlier_copy() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bars = vec![bar_at(t, 1.0), bar_at(t, 2.0)];
        let (out, removed) = dedup_by_timestamp(bars, KeepStrategy::First);
        assert_eq!(removed, 1);
        assert_eq!(out[0].close, 1.0);
    }

    #[test]
    fn dedup_keep_last_prefers_later_copy() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bars = vec![bar_at(t, 1.0), bar_at(t, 2.0), bar_at(t, 3.0)];
        let (out, removed) = dedup_by_timestamp(bars, KeepStrategy::Last);
        assert_eq!(removed, 2);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].close, 3.0);
    }

    #[test]
    fn dedup_sorts_ascending() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bars = vec![
            bar_at(t + Duration::minutes(2), 1.0),
            bar_at(t, 1.0),
            bar_at(t + Duration::minutes(1), 1.0),
        ];
        let (out, removed) = dedup_by_timestamp(bars, KeepStrategy::First);
        assert_eq!(removed, 0);
        assert!(out.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn merge_with_empty_new_is_identity() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let existing = minute_series(t, t + Duration::minutes(30), 1.1);
        let outcome = merge(existing.clone(), Vec::new());
        assert_eq!(outcome.bars, existing);
        assert_eq!(outcome.report.duplicates_removed, 0);
        assert_eq!(outcome.report.rows_added(), 0);
    }

    #[test]
    fn merge_new_value_wins_on_collision() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let outcome = merge(vec![bar_at(t, 1.0)], vec![bar_at(t, 2.0)]);
        assert_eq!(outcome.bars.len(), 1);
        assert_eq!(outcome.bars[0].close, 2.0);
    }

    #[test]
    fn merge_overlapping_window_scenario() {
        let existing = minute_series(
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap(),
            1.0,
        );
        let new = minute_series(
            Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 6, 23, 59, 0).unwrap(),
            2.0,
        );

        let outcome = merge(existing, new);
        let last = outcome.bars.last().unwrap();
        assert_eq!(
            last.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 6, 23, 59, 0).unwrap()
        );

        let overlap_start = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        let overlap_end = Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap();
        for bar in &outcome.bars {
            if bar.timestamp >= overlap_start && bar.timestamp <= overlap_end {
                assert_eq!(bar.close, 2.0, "overlap at {} kept stale value", bar.timestamp);
            } else if bar.timestamp < overlap_start {
                assert_eq!(bar.close, 1.0);
            }
        }

        // 720 overlapping minutes collapse
        assert_eq!(outcome.report.existing, 1_440);
        assert_eq!(outcome.report.new, 2_160);
        assert_eq!(outcome.report.duplicates_removed, 720);
        assert_eq!(outcome.report.final_count, 2_880);
        assert_eq!(outcome.report.rows_added(), 1_440);
    }
}
