//! Collector configuration.
//!
//! One explicit value carries the symbol set, directories and tuning knobs
//! into every operation. It loads from TOML; every key is optional and falls
//! back to the built-in defaults, including the default symbol set.

use crate::data::store::SaveFormat;
use crate::domain::{Category, SymbolSpec, Timeframe};
use crate::quality::QualityThresholds;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the terminal bridge listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8765".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Root of the `fx/` and `indices/` directories.
    pub data_dir: PathBuf,
    pub timeframe: Timeframe,
    /// Largest chunk the terminal hands out per request.
    pub max_bars_per_request: usize,
    /// Backward pages to request after the initial chunk.
    pub max_historical_attempts: usize,
    pub save_format: SaveFormat,
    /// Persist `spread` and `real_volume` next to the OHLCV columns.
    pub include_optional_columns: bool,
    /// Updates skip symbols whose newest bar is younger than this.
    pub freshness_hours: i64,
    /// Fraction of calendar time the market is open, used to size the
    /// update window.
    pub uptime_ratio: f64,
    /// Extra bars requested on top of the sized update window.
    pub bar_buffer: usize,
    pub bridge: BridgeConfig,
    /// Limits used by `validate`.
    pub quality: QualityThresholds,
    pub symbols: Vec<SymbolSpec>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            timeframe: Timeframe::M1,
            max_bars_per_request: 99_999,
            max_historical_attempts: 10,
            save_format: SaveFormat::Parquet,
            include_optional_columns: true,
            freshness_hours: 12,
            uptime_ratio: 0.7,
            bar_buffer: 100,
            bridge: BridgeConfig::default(),
            quality: QualityThresholds::default(),
            symbols: default_symbols(),
        }
    }
}

impl CollectorConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bars_per_request == 0 {
            return Err(ConfigError::Invalid(
                "max_bars_per_request must be positive".into(),
            ));
        }
        if !(self.uptime_ratio > 0.0 && self.uptime_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "uptime_ratio must be in (0, 1], got {}",
                self.uptime_ratio
            )));
        }
        if self.freshness_hours < 0 {
            return Err(ConfigError::Invalid(
                "freshness_hours must not be negative".into(),
            ));
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid("no symbols configured".into()));
        }

        let mut seen = HashSet::new();
        for spec in &self.symbols {
            if spec.name.trim().is_empty() {
                return Err(ConfigError::Invalid("symbol with empty name".into()));
            }
            if !seen.insert(spec.name.to_uppercase()) {
                return Err(ConfigError::Invalid(format!(
                    "symbol '{}' configured twice",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Same config rooted at another data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Configured symbols of one category, in config order.
    pub fn symbols_in(&self, category: Category) -> impl Iterator<Item = &SymbolSpec> {
        self.symbols.iter().filter(move |s| s.category == category)
    }

    /// Case-insensitive lookup by canonical name.
    pub fn find_symbol(&self, name: &str) -> Option<&SymbolSpec> {
        self.symbols
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.data_dir.join(category.dir_name())
    }
}

/// The default symbol set: six FX pairs plus the Dow and gold, each with the
/// spellings brokers commonly use.
pub fn default_symbols() -> Vec<SymbolSpec> {
    let fx = ["EURUSD", "USDJPY", "GBPUSD", "EURGBP", "USDCAD", "AUDNZD"];

    let mut symbols: Vec<SymbolSpec> = fx
        .iter()
        .map(|name| {
            SymbolSpec::new(*name, Category::Fx).with_alternatives([
                name.to_string(),
                format!("{name}.a"),
                format!("{name}m"),
                format!("{name}."),
            ])
        })
        .collect();

    symbols.push(
        SymbolSpec::new("US30", Category::Indices)
            .with_alternatives(["US30", "US30.cash", "US30Cash", "USA30", "DJ30", "US30."]),
    );
    symbols.push(
        SymbolSpec::new("XAUUSD", Category::Indices)
            .with_alternatives(["XAUUSD", "XAUUSD.a", "XAUUSDm", "GOLD", "XAUUSD."]),
    );

    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CollectorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.symbols_in(Category::Fx).count(), 6);
        assert_eq!(config.symbols_in(Category::Indices).count(), 2);
    }

    #[test]
    fn toml_roundtrip() {
        let config = CollectorConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = CollectorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = CollectorConfig::from_toml(
            r#"
data_dir = "/tmp/bars"
save_format = "both"

[[symbols]]
name = "EURUSD"
category = "fx"
"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/bars"));
        assert_eq!(config.save_format, SaveFormat::Both);
        assert_eq!(config.max_bars_per_request, 99_999);
        assert_eq!(config.symbols.len(), 1);
        assert_eq!(config.symbols[0].candidates(), vec!["EURUSD"]);
        assert_eq!(config.quality, QualityThresholds::default());
    }

    #[test]
    fn quality_thresholds_can_be_relaxed() {
        let config = CollectorConfig::from_toml(
            r#"
[quality]
min_rows = 50000
bank_holidays = [[12, 25], [1, 1]]
"#,
        )
        .unwrap();
        assert_eq!(config.quality.min_rows, 50_000);
        assert_eq!(config.quality.min_span_days, 90);
        assert_eq!(config.quality.bank_holidays, vec![(12, 25), (1, 1)]);
    }

    #[test]
    fn rejects_unknown_timeframe() {
        let result = CollectorConfig::from_toml(r#"timeframe = "M2""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let result = CollectorConfig::from_toml(
            r#"
[[symbols]]
name = "EURUSD"
category = "fx"

[[symbols]]
name = "eurusd"
category = "fx"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_bad_uptime_ratio() {
        let result = CollectorConfig::from_toml("uptime_ratio = 1.5");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn find_symbol_ignores_case() {
        let config = CollectorConfig::default();
        assert_eq!(config.find_symbol("xauusd").unwrap().name, "XAUUSD");
        assert!(config.find_symbol("BTCUSD").is_none());
    }
}
