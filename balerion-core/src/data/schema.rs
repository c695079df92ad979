use polars::prelude::*;

pub const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];
pub const OPTIONAL_COLUMNS: [&str; 2] = ["spread", "real_volume"];
pub const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// Expected schema for persisted bar data
pub struct BarSchema;

impl BarSchema {
    /// Timestamps are stored as UTC milliseconds.
    pub fn timestamp_dtype() -> DataType {
        DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into()))
    }

    /// Get the canonical bar schema (required columns only)
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("timestamp".into(), Self::timestamp_dtype()),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
            Field::new("volume".into(), DataType::UInt64),
        ])
    }

    /// Build the timestamp column from epoch milliseconds.
    pub fn timestamp_column(millis: Vec<i64>) -> PolarsResult<Column> {
        Column::new("timestamp".into(), millis).cast(&Self::timestamp_dtype())
    }

    /// Validate a DataFrame read from disk.
    ///
    /// Files written by other tools may use a different time unit or integer
    /// width, so dtypes are checked by family rather than exactly.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();

        for name in REQUIRED_COLUMNS {
            let dtype = actual
                .get(name)
                .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
            let ok = match name {
                "timestamp" => matches!(dtype, DataType::Datetime(_, _)),
                "volume" => is_integer(dtype) || is_float(dtype),
                _ => is_float(dtype) || is_integer(dtype),
            };
            if !ok {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected: expected_family(name).to_string(),
                    actual: dtype.clone(),
                });
            }
        }

        for name in OPTIONAL_COLUMNS {
            if let Some(dtype) = actual.get(name) {
                if !is_integer(dtype) {
                    return Err(SchemaError::TypeMismatch {
                        column: name.to_string(),
                        expected: "integer".to_string(),
                        actual: dtype.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn expected_family(column: &str) -> &'static str {
    match column {
        "timestamp" => "datetime",
        "volume" => "integer",
        _ => "float",
    }
}

fn is_float(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

fn is_integer(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: DataType,
    },
}
