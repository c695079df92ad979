//! Symbols and their dataset categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dataset category. Decides the sub-directory a symbol's file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fx,
    Indices,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Fx, Category::Indices];

    /// Directory name under the data root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Fx => "fx",
            Category::Indices => "indices",
        }
    }

    /// Heading used in progress output.
    pub fn label(self) -> &'static str {
        match self {
            Category::Fx => "FX",
            Category::Indices => "Index",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A configured symbol: canonical name, category and the broker spellings to
/// try against the terminal, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl SymbolSpec {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
            alternatives: Vec::new(),
        }
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    /// Spellings to try. Falls back to the canonical name alone.
    pub fn candidates(&self) -> Vec<&str> {
        if self.alternatives.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.alternatives.iter().map(|s| s.as_str()).collect()
        }
    }

    /// File stem: `{symbol_lowercase}_1m`.
    pub fn file_stem(&self) -> String {
        format!("{}_1m", self.name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_fall_back_to_name() {
        let spec = SymbolSpec::new("EURUSD", Category::Fx);
        assert_eq!(spec.candidates(), vec!["EURUSD"]);
    }

    #[test]
    fn candidates_keep_priority_order() {
        let spec = SymbolSpec::new("US30", Category::Indices)
            .with_alternatives(["US30", "US30.cash", "DJ30"]);
        assert_eq!(spec.candidates(), vec!["US30", "US30.cash", "DJ30"]);
    }

    #[test]
    fn file_stem_is_lowercase() {
        let spec = SymbolSpec::new("XAUUSD", Category::Indices);
        assert_eq!(spec.file_stem(), "xauusd_1m");
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Indices).unwrap();
        assert_eq!(json, "\"indices\"");
    }
}
