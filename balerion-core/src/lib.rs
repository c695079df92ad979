//! Balerion Core: bar domain types, terminal access, backfill, merge,
//! dataset storage and quality rules.
//!
//! - Domain types (bars, symbols, timeframes)
//! - `Terminal` capability trait with an HTTP bridge, plus an in-memory fake
//!   behind the `testing` feature
//! - Backward-paging historical backfill and last-wins merge
//! - Parquet/CSV dataset store with backup-then-replace
//! - Read-only file checker and named quality rules

pub mod config;
pub mod data;
pub mod domain;
pub mod quality;
pub mod stop;

pub use config::{BridgeConfig, CollectorConfig, ConfigError};
pub use stop::StopFlag;
