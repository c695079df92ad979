//! Property tests for merge and backfill invariants.
//!
//! Uses proptest to verify:
//! 1. Merge identity: merging nothing into a canonical dataset changes nothing
//! 2. Merge precedence: on a shared timestamp the new bar wins
//! 3. Dedup ordering: output is strictly ascending and unique
//! 4. Backfill termination: k older chunks then empty means exactly k+1 calls

use balerion_core::data::{
    backfill, dedup_by_timestamp, merge, BackfillSettings, FakeTerminal, KeepStrategy, RawRate,
    StopReason,
};
use balerion_core::domain::{Bar, Category, SymbolSpec, Timeframe};
use balerion_core::StopFlag;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

// ── Strategies (proptest) ────────────────────────────────────────────

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn bar(minute: i64, close: f64) -> Bar {
    Bar {
        timestamp: epoch() + Duration::minutes(minute),
        open: close,
        high: close + 0.001,
        low: close - 0.001,
        close,
        volume: 1,
        spread: None,
        real_volume: None,
    }
}

fn arb_bars(max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((0..5_000i64, 0.5..2.0_f64), 0..max_len)
        .prop_map(|pairs| pairs.into_iter().map(|(m, c)| bar(m, c)).collect())
}

fn rate(minute: i64) -> RawRate {
    RawRate {
        time: (epoch() + Duration::minutes(minute)).timestamp(),
        open: 1.1,
        high: 1.2,
        low: 1.0,
        close: 1.15,
        tick_volume: 1,
        spread: 0,
        real_volume: 0,
    }
}

// ── 1. Merge identity ────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_with_nothing_is_identity(bars in arb_bars(200)) {
        let (canonical, _) = dedup_by_timestamp(bars, KeepStrategy::First);
        let outcome = merge(canonical.clone(), Vec::new());
        prop_assert_eq!(outcome.report.duplicates_removed, 0);
        prop_assert_eq!(outcome.bars, canonical);
    }

    #[test]
    fn merge_is_idempotent(existing in arb_bars(100), new in arb_bars(100)) {
        let once = merge(existing, new.clone());
        let twice = merge(once.bars.clone(), new);
        prop_assert_eq!(twice.bars, once.bars);
    }
}

// ── 2. Merge precedence ──────────────────────────────────────────────

proptest! {
    #[test]
    fn new_bar_wins_on_shared_timestamp(
        minutes in prop::collection::hash_set(0..1_000i64, 1..50),
        old_close in 0.5..1.0_f64,
        new_close in 1.5..2.0_f64,
    ) {
        let existing: Vec<Bar> = minutes.iter().map(|m| bar(*m, old_close)).collect();
        let new: Vec<Bar> = minutes.iter().map(|m| bar(*m, new_close)).collect();

        let outcome = merge(existing, new);
        prop_assert_eq!(outcome.bars.len(), minutes.len());
        prop_assert!(outcome.bars.iter().all(|b| b.close == new_close));
        prop_assert_eq!(outcome.report.duplicates_removed, minutes.len());
    }
}

// ── 3. Dedup ordering ────────────────────────────────────────────────

proptest! {
    #[test]
    fn dedup_output_is_strictly_ascending(bars in arb_bars(300), keep_last in any::<bool>()) {
        let unique: HashSet<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
        let keep = if keep_last { KeepStrategy::Last } else { KeepStrategy::First };
        let input_len = bars.len();

        let (out, removed) = dedup_by_timestamp(bars, keep);
        prop_assert_eq!(out.len(), unique.len());
        prop_assert_eq!(out.len() + removed, input_len);
        prop_assert!(out.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}

// ── 4. Backfill termination ──────────────────────────────────────────

proptest! {
    #[test]
    fn backfill_makes_k_plus_one_calls(k in 0usize..8, chunk in 1usize..40) {
        // newest chunk served by position, then k older chunks by time
        let total = (k + 1) * chunk;
        let mut terminal = FakeTerminal::new()
            .with_minute_history("EURUSD", epoch(), total);

        let settings = BackfillSettings {
            timeframe: Timeframe::M1,
            chunk_size: chunk,
            max_attempts: 10,
            include_optional_columns: true,
        };
        let spec = SymbolSpec::new("EURUSD", Category::Fx);
        let outcome = backfill(&mut terminal, &spec, &settings, &StopFlag::new()).unwrap();

        prop_assert_eq!(outcome.stop, StopReason::Exhausted);
        prop_assert_eq!(outcome.calls, k + 2);
        prop_assert_eq!(terminal.fetch_calls(), k + 2);
        prop_assert_eq!(outcome.bars.len(), total);
        prop_assert_eq!(outcome.duplicates_removed, 0);
        prop_assert!(outcome.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn scripted_chunks_terminate_after_empty(k in 0usize..6) {
        // initial chunk covers minutes [1000, 1010); chunk i covers the ten
        // minutes before chunk i-1
        let initial: Vec<RawRate> = (1_000..1_010).map(rate).collect();
        let older: Vec<Vec<RawRate>> = (1..=k as i64)
            .map(|i| (1_000 - 10 * i..1_010 - 10 * i).map(rate).collect())
            .collect();

        let mut terminal = FakeTerminal::new()
            .with_rates("EURUSD", initial)
            .with_scripted_chunks("EURUSD", older);

        let settings = BackfillSettings {
            timeframe: Timeframe::M1,
            chunk_size: 10,
            max_attempts: 10,
            include_optional_columns: false,
        };
        let spec = SymbolSpec::new("EURUSD", Category::Fx);
        let outcome = backfill(&mut terminal, &spec, &settings, &StopFlag::new()).unwrap();

        // k older chunks plus the terminating empty one
        prop_assert_eq!(terminal.time_calls(), k + 1);
        prop_assert_eq!(outcome.calls, k + 2);
        prop_assert_eq!(outcome.chunks, k + 1);
        prop_assert_eq!(outcome.bars.len(), 10 * (k + 1));
    }
}
