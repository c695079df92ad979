use balerion_core::data::DataError;
use thiserror::Error;

/// Errors that end a whole run. Per-symbol failures are recorded in the
/// batch summary instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("terminal initialization failed: {0}")]
    TerminalInit(String),

    #[error("interrupted by user")]
    Interrupted,

    #[error("symbol '{0}' is not configured")]
    UnknownSymbol(String),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}
