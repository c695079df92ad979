//! Balerion Runner: batch orchestration across the configured symbols.
//!
//! This crate builds on `balerion-core` to provide:
//! - `collect`: full history backfill per symbol
//! - `update`: recent-window fetch merged into existing datasets
//! - `check`: read-only per-file quality report
//! - `validate`: the named quality rules over every dataset
//!
//! Per-symbol failures (panics included) are recorded in the summary and the
//! batch moves on; only terminal initialization failure or an interrupt ends
//! a run early.

mod batch;
pub mod check;
pub mod collect;
pub mod error;
pub mod progress;
pub mod summary;
pub mod update;
pub mod validate;

pub use check::{check_all, CheckReport};
pub use collect::{collect_all, collect_symbol};
pub use error::RunError;
pub use progress::{RunProgress, SilentProgress, StdoutProgress};
pub use summary::{BatchSummary, SymbolDetail, SymbolResult};
pub use update::{
    update_all, update_symbol, window_bars, UpdateOptions, DEFAULT_UPDATE_DAYS, MAX_UPDATE_DAYS,
};
pub use validate::{validate_all, validate_symbol, ValidationSummary};
