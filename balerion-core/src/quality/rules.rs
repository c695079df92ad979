//! Dataset quality rules.
//!
//! Each rule is a named boundary check over one symbol's bars that counts
//! its violations. Time-based rules run on a sorted copy so a single
//! misordered row shows up under `sorted` instead of poisoning every gap.

use crate::domain::Bar;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_rows: usize,
    pub min_span_days: i64,
    /// Newest bar may be at most this many whole days old.
    pub max_staleness_days: i64,
    /// Broker server clocks run ahead of UTC; allow this much.
    pub max_future_hours: i64,
    pub spike_multiplier: f64,
    pub spike_window: usize,
    pub spike_min_samples: usize,
    pub max_weekend_gap_hours: i64,
    pub max_intraweek_gap_hours: i64,
    /// `(month, day)` dates on which a gap may start mid-week.
    pub bank_holidays: Vec<(u32, u32)>,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_rows: 100_000,
            min_span_days: 90,
            max_staleness_days: 14,
            max_future_hours: 4,
            spike_multiplier: 20.0,
            spike_window: 200,
            spike_min_samples: 50,
            max_weekend_gap_hours: 55,
            max_intraweek_gap_hours: 4,
            bank_holidays: vec![(12, 24), (12, 25), (12, 26), (12, 31), (1, 1), (1, 2)],
        }
    }
}

impl QualityThresholds {
    pub fn is_bank_holiday(&self, ts: DateTime<Utc>) -> bool {
        self.bank_holidays.contains(&(ts.month(), ts.day()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Schema,
    RowCount,
    Staleness,
    HistorySpan,
    Duplicates,
    Sorted,
    MinuteBoundary,
    Future,
    Nulls,
    Ohlc,
    PositivePrices,
    Spikes,
    IntraweekGaps,
    WeekendGaps,
}

impl Rule {
    pub const ALL: [Rule; 14] = [
        Rule::Schema,
        Rule::RowCount,
        Rule::Staleness,
        Rule::HistorySpan,
        Rule::Duplicates,
        Rule::Sorted,
        Rule::MinuteBoundary,
        Rule::Future,
        Rule::Nulls,
        Rule::Ohlc,
        Rule::PositivePrices,
        Rule::Spikes,
        Rule::IntraweekGaps,
        Rule::WeekendGaps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Schema => "schema",
            Rule::RowCount => "row_count",
            Rule::Staleness => "staleness",
            Rule::HistorySpan => "history_span",
            Rule::Duplicates => "duplicates",
            Rule::Sorted => "sorted",
            Rule::MinuteBoundary => "minute_boundary",
            Rule::Future => "future",
            Rule::Nulls => "nulls",
            Rule::Ohlc => "ohlc",
            Rule::PositivePrices => "positive_prices",
            Rule::Spikes => "spikes",
            Rule::IntraweekGaps => "intraweek_gaps",
            Rule::WeekendGaps => "weekend_gaps",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule: Rule,
    pub violations: usize,
    /// Empty when the rule passed.
    pub detail: String,
}

impl RuleResult {
    fn pass(rule: Rule) -> Self {
        Self {
            rule,
            violations: 0,
            detail: String::new(),
        }
    }

    fn count(rule: Rule, violations: usize, detail: impl FnOnce() -> String) -> Self {
        if violations == 0 {
            Self::pass(rule)
        } else {
            Self {
                rule,
                violations,
                detail: detail(),
            }
        }
    }

    pub fn passed(&self) -> bool {
        self.violations == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub symbol: String,
    pub rows: usize,
    pub results: Vec<RuleResult>,
}

impl ValidationReport {
    /// Report for a file whose columns could not be read as bars.
    pub fn schema_failure(symbol: &str, detail: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            rows: 0,
            results: vec![RuleResult {
                rule: Rule::Schema,
                violations: 1,
                detail: detail.into(),
            }],
        }
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(RuleResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn get(&self, rule: Rule) -> Option<&RuleResult> {
        self.results.iter().find(|r| r.rule == rule)
    }
}

/// Run every rule over one symbol's bars in stored order.
///
/// `null_count` comes from the file; nulls read back as NaN prices.
pub fn validate_bars(
    symbol: &str,
    bars: &[Bar],
    null_count: usize,
    now: DateTime<Utc>,
    thresholds: &QualityThresholds,
) -> ValidationReport {
    let mut sorted: Vec<&Bar> = bars.iter().collect();
    sorted.sort_by_key(|b| b.timestamp);
    let first = sorted.first().map(|b| b.timestamp);
    let last = sorted.last().map(|b| b.timestamp);

    let results = vec![
        RuleResult::pass(Rule::Schema),
        row_count(bars.len(), thresholds),
        staleness(last, now, thresholds),
        history_span(first, last, thresholds),
        duplicates(&sorted),
        order(bars),
        minute_boundary(bars),
        future(bars, now, thresholds),
        nulls(bars, null_count),
        ohlc(bars),
        positive_prices(bars),
        spikes(&sorted, thresholds),
        intraweek_gaps(&sorted, thresholds),
        weekend_gaps(&sorted, thresholds),
    ];

    ValidationReport {
        symbol: symbol.to_string(),
        rows: bars.len(),
        results,
    }
}

fn row_count(rows: usize, t: &QualityThresholds) -> RuleResult {
    RuleResult::count(Rule::RowCount, usize::from(rows < t.min_rows), || {
        format!("only {rows} rows, expected at least {}", t.min_rows)
    })
}

fn staleness(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    t: &QualityThresholds,
) -> RuleResult {
    match last {
        None => RuleResult::count(Rule::Staleness, 1, || "dataset is empty".into()),
        Some(last) => {
            let age = (now - last).num_days();
            RuleResult::count(Rule::Staleness, usize::from(age > t.max_staleness_days), || {
                format!("latest bar {last} is {age} days old")
            })
        }
    }
}

fn history_span(
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    t: &QualityThresholds,
) -> RuleResult {
    let (Some(first), Some(last)) = (first, last) else {
        return RuleResult::count(Rule::HistorySpan, 1, || "dataset is empty".into());
    };
    let span = (last - first).num_days();
    RuleResult::count(Rule::HistorySpan, usize::from(span < t.min_span_days), || {
        format!("history spans {span} days, expected at least {}", t.min_span_days)
    })
}

fn duplicates(sorted: &[&Bar]) -> RuleResult {
    let n = sorted
        .windows(2)
        .filter(|w| w[0].timestamp == w[1].timestamp)
        .count();
    RuleResult::count(Rule::Duplicates, n, || format!("{n} duplicate timestamps"))
}

fn order(bars: &[Bar]) -> RuleResult {
    let n = bars
        .windows(2)
        .filter(|w| w[1].timestamp < w[0].timestamp)
        .count();
    RuleResult::count(Rule::Sorted, n, || {
        format!("{n} rows out of ascending order")
    })
}

fn minute_boundary(bars: &[Bar]) -> RuleResult {
    let n = bars.iter().filter(|b| !b.is_minute_aligned()).count();
    RuleResult::count(Rule::MinuteBoundary, n, || {
        format!("{n} timestamps not on a minute boundary")
    })
}

fn future(bars: &[Bar], now: DateTime<Utc>, t: &QualityThresholds) -> RuleResult {
    let limit = now + Duration::hours(t.max_future_hours);
    let n = bars.iter().filter(|b| b.timestamp > limit).count();
    RuleResult::count(Rule::Future, n, || {
        format!("{n} bars more than {}h ahead of now", t.max_future_hours)
    })
}

fn nulls(bars: &[Bar], null_count: usize) -> RuleResult {
    let void = bars.iter().filter(|b| b.is_void()).count();
    let n = null_count.max(void);
    RuleResult::count(Rule::Nulls, n, || format!("{n} missing values"))
}

fn ohlc(bars: &[Bar]) -> RuleResult {
    let mut n = 0;
    let mut inverted = 0;
    for b in bars.iter().filter(|b| !b.is_void()) {
        let body_top = b.open.max(b.close);
        let body_bottom = b.open.min(b.close);
        if b.high < b.low || b.high < body_top || b.low > body_bottom {
            n += 1;
        }
        if b.high < b.low {
            inverted += 1;
        }
    }
    RuleResult::count(Rule::Ohlc, n, || {
        format!("{n} bars with high/low outside the open/close body ({inverted} with high < low)")
    })
}

fn positive_prices(bars: &[Bar]) -> RuleResult {
    let n = bars
        .iter()
        .filter(|b| [b.open, b.high, b.low, b.close].iter().any(|p| *p <= 0.0))
        .count();
    RuleResult::count(Rule::PositivePrices, n, || {
        format!("{n} bars with a zero or negative price")
    })
}

/// Bars whose range exceeds `spike_multiplier` times the rolling median
/// range of the trailing window (current bar included).
fn spikes(sorted: &[&Bar], t: &QualityThresholds) -> RuleResult {
    let mut window: VecDeque<f64> = VecDeque::with_capacity(t.spike_window + 1);
    let mut ordered: Vec<f64> = Vec::with_capacity(t.spike_window + 1);
    let mut n = 0;
    let mut worst: Option<(DateTime<Utc>, f64)> = None;

    for bar in sorted {
        let range = bar.range();
        window.push_back(range);
        if range.is_finite() {
            let at = ordered.partition_point(|x| *x < range);
            ordered.insert(at, range);
        }
        if window.len() > t.spike_window {
            if let Some(old) = window.pop_front() {
                if old.is_finite() {
                    let at = ordered.partition_point(|x| *x < old);
                    ordered.remove(at);
                }
            }
        }

        if ordered.len() < t.spike_min_samples.max(1) || !range.is_finite() {
            continue;
        }
        let median = median_of_sorted(&ordered);
        if median > 0.0 && range > median * t.spike_multiplier {
            n += 1;
            let ratio = range / median;
            if worst.map_or(true, |(_, r)| ratio > r) {
                worst = Some((bar.timestamp, ratio));
            }
        }
    }

    RuleResult::count(Rule::Spikes, n, || match worst {
        Some((ts, ratio)) => format!(
            "{n} bars with range > {}x rolling median (worst {ratio:.1}x at {ts})",
            t.spike_multiplier
        ),
        None => format!("{n} spikes"),
    })
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Gaps longer than the intraweek limit that start Monday to Thursday on a
/// day that is not a bank holiday.
fn intraweek_gaps(sorted: &[&Bar], t: &QualityThresholds) -> RuleResult {
    let limit = Duration::hours(t.max_intraweek_gap_hours);
    let offending: Vec<(DateTime<Utc>, Duration)> = gaps(sorted)
        .filter(|(start, gap)| {
            *gap > limit
                && start.weekday().num_days_from_monday() < 4
                && !t.is_bank_holiday(*start)
        })
        .collect();
    let n = offending.len();
    RuleResult::count(Rule::IntraweekGaps, n, || {
        format!(
            "{n} mid-week gaps > {}h ({})",
            t.max_intraweek_gap_hours,
            describe_gaps(&offending)
        )
    })
}

fn weekend_gaps(sorted: &[&Bar], t: &QualityThresholds) -> RuleResult {
    let limit = Duration::hours(t.max_weekend_gap_hours);
    let offending: Vec<(DateTime<Utc>, Duration)> =
        gaps(sorted).filter(|(_, gap)| *gap > limit).collect();
    let n = offending.len();
    RuleResult::count(Rule::WeekendGaps, n, || {
        format!(
            "{n} gaps > {}h ({})",
            t.max_weekend_gap_hours,
            describe_gaps(&offending)
        )
    })
}

/// `(start, length)` of every adjacent pair.
fn gaps<'a>(sorted: &'a [&'a Bar]) -> impl Iterator<Item = (DateTime<Utc>, Duration)> + 'a {
    sorted
        .windows(2)
        .map(|w| (w[0].timestamp, w[1].timestamp - w[0].timestamp))
}

fn describe_gaps(gaps: &[(DateTime<Utc>, Duration)]) -> String {
    let shown: Vec<String> = gaps
        .iter()
        .take(3)
        .map(|(start, gap)| format!("{}h from {start}", gap.num_minutes() as f64 / 60.0))
        .collect();
    if gaps.len() > 3 {
        format!("{}, ...", shown.join(", "))
    } else {
        shown.join(", ")
    }
}
