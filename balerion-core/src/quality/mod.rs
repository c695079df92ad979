//! Dataset inspection and quality rules.

pub mod report;
pub mod rules;

pub use report::{check_file, CheckTally, FileCheck, FileStats, FileStatus, LARGE_GAP_HOURS};
pub use rules::{validate_bars, QualityThresholds, Rule, RuleResult, ValidationReport};
