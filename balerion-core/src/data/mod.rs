//! Terminal access, backfill, merge and dataset storage.

pub mod backfill;
pub mod bridge;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod merge;
pub mod provider;
pub mod schema;
pub mod store;

pub use backfill::{backfill, BackfillOutcome, BackfillSettings, StopReason};
pub use bridge::BridgeTerminal;
#[cfg(any(test, feature = "testing"))]
pub use fake::FakeTerminal;
pub use merge::{dedup_by_timestamp, merge, KeepStrategy, MergeOutcome, MergeReport};
pub use provider::{rates_to_bars, DataError, RawRate, SymbolInfo, Terminal, TerminalInfo};
pub use schema::{BarSchema, SchemaError};
pub use store::{BarStore, Dataset, SaveFormat};
