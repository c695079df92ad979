//! Domain types: bars, symbols, timeframes.

pub mod bar;
pub mod symbol;
pub mod timeframe;

pub use bar::Bar;
pub use symbol::{Category, SymbolSpec};
pub use timeframe::Timeframe;
