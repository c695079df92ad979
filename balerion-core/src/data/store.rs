//! Per-symbol dataset files.
//!
//! Layout: `{data_dir}/{fx|indices}/{symbol_lower}_1m.parquet`, with an
//! optional CSV copy next to it.
//!
//! - Every file a write produces is staged as `<name>.tmp` and renamed into
//!   place only once all of them are complete; a failed write removes its
//!   tmp files
//! - Replacing a dataset renames each existing file to `<name>.backup` first
//!   and removes the backups only once every new file is in place
//! - Reads accept foreign time units and numeric widths, see `BarSchema`

use super::provider::DataError;
use super::schema::{BarSchema, OPTIONAL_COLUMNS};
use crate::config::CollectorConfig;
use crate::domain::{Bar, SymbolSpec};
use chrono::{DateTime, SecondsFormat, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which files a write produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Parquet,
    Csv,
    Both,
}

impl SaveFormat {
    pub fn writes_parquet(self) -> bool {
        matches!(self, SaveFormat::Parquet | SaveFormat::Both)
    }

    pub fn writes_csv(self) -> bool {
        matches!(self, SaveFormat::Csv | SaveFormat::Both)
    }
}

/// A dataset read back from disk.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub path: PathBuf,
    /// Ascending as stored; not re-sorted on read.
    pub bars: Vec<Bar>,
    /// Null cells across all columns.
    pub null_count: usize,
    pub file_size: u64,
    /// Why the file fails strict schema validation, when it was loaded
    /// with `inspect`.
    pub schema_issue: Option<String>,
}

pub struct BarStore {
    data_dir: PathBuf,
    format: SaveFormat,
}

impl BarStore {
    pub fn new(data_dir: impl Into<PathBuf>, format: SaveFormat) -> Self {
        Self {
            data_dir: data_dir.into(),
            format,
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(&config.data_dir, config.save_format)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn format(&self) -> SaveFormat {
        self.format
    }

    fn stem_path(&self, spec: &SymbolSpec) -> PathBuf {
        self.data_dir
            .join(spec.category.dir_name())
            .join(spec.file_stem())
    }

    /// `{data_dir}/{category}/{symbol_lower}_1m.parquet`
    pub fn parquet_path(&self, spec: &SymbolSpec) -> PathBuf {
        self.stem_path(spec).with_extension("parquet")
    }

    pub fn csv_path(&self, spec: &SymbolSpec) -> PathBuf {
        self.stem_path(spec).with_extension("csv")
    }

    /// Where `replace` parks the previous file.
    pub fn backup_path(&self, spec: &SymbolSpec) -> PathBuf {
        backup_of(&self.path_for(spec))
    }

    /// Every file the configured format produces for a symbol.
    pub fn artifact_paths(&self, spec: &SymbolSpec) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if self.format.writes_parquet() {
            paths.push(self.parquet_path(spec));
        }
        if self.format.writes_csv() {
            paths.push(self.csv_path(spec));
        }
        paths
    }

    /// The file reads go to: parquet unless the store only writes CSV.
    pub fn path_for(&self, spec: &SymbolSpec) -> PathBuf {
        if self.format.writes_parquet() {
            self.parquet_path(spec)
        } else {
            self.csv_path(spec)
        }
    }

    pub fn exists(&self, spec: &SymbolSpec) -> bool {
        self.path_for(spec).is_file()
    }

    pub fn file_size(&self, spec: &SymbolSpec) -> Option<u64> {
        fs::metadata(self.path_for(spec)).ok().map(|m| m.len())
    }

    /// Load a symbol's dataset with its null count and file size. A file
    /// that fails schema validation is an error.
    pub fn load_dataset(&self, spec: &SymbolSpec) -> Result<Dataset, DataError> {
        self.read_dataset(spec, true)
    }

    /// Load a dataset for inspection. A schema mismatch is recorded in
    /// `schema_issue` instead of failing, as long as the bars can be decoded.
    pub fn inspect(&self, spec: &SymbolSpec) -> Result<Dataset, DataError> {
        self.read_dataset(spec, false)
    }

    fn read_dataset(&self, spec: &SymbolSpec, strict: bool) -> Result<Dataset, DataError> {
        let path = self.path_for(spec);
        if !path.is_file() {
            return Err(DataError::NoDataset {
                symbol: spec.name.clone(),
                path: path.display().to_string(),
            });
        }

        let mut schema_issue = None;
        let (bars, null_count) = if is_csv(&path) {
            read_csv(&path)?
        } else {
            let df = read_frame(&path)?;
            if let Err(e) = BarSchema::validate(&df) {
                if strict {
                    return Err(e.into());
                }
                schema_issue = Some(e.to_string());
            }
            let nulls = count_nulls(&df);
            (frame_to_bars(&df)?, nulls)
        };
        let file_size = fs::metadata(&path)
            .map_err(|e| DataError::Io(format!("stat {}: {e}", path.display())))?
            .len();

        Ok(Dataset {
            path,
            bars,
            null_count,
            file_size,
            schema_issue,
        })
    }

    pub fn load(&self, spec: &SymbolSpec) -> Result<Vec<Bar>, DataError> {
        Ok(self.load_dataset(spec)?.bars)
    }

    /// Write a fresh dataset in the configured format(s), creating the
    /// category directory. Returns the authoritative path.
    ///
    /// Nothing is renamed into place until every file has been staged.
    pub fn write(&self, spec: &SymbolSpec, bars: &[Bar]) -> Result<PathBuf, DataError> {
        if bars.is_empty() {
            return Err(DataError::Other(format!("no bars to write for {}", spec.name)));
        }
        let dir = self.data_dir.join(spec.category.dir_name());
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::Io(format!("create {}: {e}", dir.display())))?;

        let mut staged = Vec::new();
        let result = self
            .stage(spec, bars, &mut staged)
            .and_then(|()| commit(&staged));
        if let Err(e) = result {
            for (tmp, _) in &staged {
                if tmp.is_file() {
                    let _ = fs::remove_file(tmp);
                }
            }
            return Err(e);
        }

        let path = self.path_for(spec);
        tracing::debug!(symbol = %spec.name, rows = bars.len(), path = %path.display(), "dataset written");
        Ok(path)
    }

    /// Write each artifact to its tmp sibling. Pairs are recorded before
    /// writing so the caller can clean up a half-written tmp file.
    fn stage(
        &self,
        spec: &SymbolSpec,
        bars: &[Bar],
        staged: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<(), DataError> {
        if self.format.writes_parquet() {
            let path = self.parquet_path(spec);
            let tmp = tmp_of(&path);
            staged.push((tmp.clone(), path));
            let mut df = bars_to_frame(bars)?;
            write_parquet(&mut df, &tmp)?;
        }
        if self.format.writes_csv() {
            let path = self.csv_path(spec);
            let tmp = tmp_of(&path);
            staged.push((tmp.clone(), path));
            write_csv(bars, &tmp)?;
        }
        Ok(())
    }

    /// Replace an existing dataset, keeping every old file as a backup until
    /// the new ones are written. A failed write removes whatever new files
    /// made it into place and leaves the backups.
    pub fn replace(&self, spec: &SymbolSpec, bars: &[Bar]) -> Result<PathBuf, DataError> {
        if !self.exists(spec) {
            return self.write(spec, bars);
        }

        let backups = self.back_up(spec)?;
        match self.write(spec, bars) {
            Ok(written) => {
                for (_, backup) in &backups {
                    if let Err(e) = fs::remove_file(backup) {
                        tracing::warn!(backup = %backup.display(), error = %e, "could not remove backup");
                    }
                }
                Ok(written)
            }
            Err(e) => {
                for path in self.artifact_paths(spec) {
                    if path.is_file() {
                        let _ = fs::remove_file(&path);
                    }
                }
                tracing::error!(
                    symbol = %spec.name,
                    backups = backups.len(),
                    error = %e,
                    "write failed, backup kept"
                );
                Err(e)
            }
        }
    }

    /// Rename every existing artifact to its backup name. If one rename
    /// fails the earlier ones are moved back.
    fn back_up(&self, spec: &SymbolSpec) -> Result<Vec<(PathBuf, PathBuf)>, DataError> {
        let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
        for path in self.artifact_paths(spec) {
            if !path.is_file() {
                continue;
            }
            let backup = backup_of(&path);
            if let Err(e) = fs::rename(&path, &backup) {
                for (original, backup) in moved.iter().rev() {
                    let _ = fs::rename(backup, original);
                }
                return Err(DataError::Io(format!("backup {}: {e}", path.display())));
            }
            tracing::debug!(backup = %backup.display(), "created backup");
            moved.push((path, backup));
        }
        Ok(moved)
    }
}

/// Rename staged tmp files into place.
fn commit(staged: &[(PathBuf, PathBuf)]) -> Result<(), DataError> {
    for (tmp, path) in staged {
        fs::rename(tmp, path)
            .map_err(|e| DataError::Io(format!("rename into {}: {e}", path.display())))?;
    }
    Ok(())
}

fn is_csv(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("csv")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn backup_of(path: &Path) -> PathBuf {
    with_suffix(path, ".backup")
}

fn tmp_of(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

// ── Parquet ─────────────────────────────────────────────────────────

/// Read a parquet file into a DataFrame.
pub fn read_frame(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path)
        .map_err(|e| DataError::ParquetError(format!("open {}: {e}", path.display())))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read {}: {e}", path.display())))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path)
        .map_err(|e| DataError::ParquetError(format!("create {}: {e}", path.display())))?;
    ParquetWriter::new(file)
        .finish(df)
        .map(|_| ())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))
}

/// Null cells across every column of a frame.
pub fn count_nulls(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

/// Convert bars to the persisted frame. Optional columns are emitted only
/// when at least one bar carries them.
pub fn bars_to_frame(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let millis: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();
    let mut columns = vec![
        BarSchema::timestamp_column(millis)
            .map_err(|e| DataError::ParquetError(format!("timestamp cast: {e}")))?,
        Column::new("open".into(), bars.iter().map(|b| b.open).collect::<Vec<f64>>()),
        Column::new("high".into(), bars.iter().map(|b| b.high).collect::<Vec<f64>>()),
        Column::new("low".into(), bars.iter().map(|b| b.low).collect::<Vec<f64>>()),
        Column::new("close".into(), bars.iter().map(|b| b.close).collect::<Vec<f64>>()),
        Column::new("volume".into(), bars.iter().map(|b| b.volume).collect::<Vec<u64>>()),
    ];

    if bars.iter().any(|b| b.spread.is_some()) {
        let spread: Vec<Option<i32>> = bars.iter().map(|b| b.spread).collect();
        columns.push(Column::new(OPTIONAL_COLUMNS[0].into(), spread));
    }
    if bars.iter().any(|b| b.real_volume.is_some()) {
        let real: Vec<Option<u64>> = bars.iter().map(|b| b.real_volume).collect();
        columns.push(Column::new(OPTIONAL_COLUMNS[1].into(), real));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

/// Convert a persisted frame back to bars.
///
/// Null prices read as NaN and null volumes as zero so the quality rules can
/// still see the row. A null timestamp is an error.
pub fn frame_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let millis = timestamp_millis(df)?;
    let open = cast_column(df, "open", &DataType::Float64)?;
    let high = cast_column(df, "high", &DataType::Float64)?;
    let low = cast_column(df, "low", &DataType::Float64)?;
    let close = cast_column(df, "close", &DataType::Float64)?;
    let volume = cast_column(df, "volume", &DataType::UInt64)?;
    let spread = optional_column(df, OPTIONAL_COLUMNS[0], &DataType::Int32)?;
    let real_volume = optional_column(df, OPTIONAL_COLUMNS[1], &DataType::UInt64)?;

    let type_err = |e: PolarsError| DataError::ParquetError(format!("column type: {e}"));
    let open_ca = open.f64().map_err(type_err)?;
    let high_ca = high.f64().map_err(type_err)?;
    let low_ca = low.f64().map_err(type_err)?;
    let close_ca = close.f64().map_err(type_err)?;
    let vol_ca = volume.u64().map_err(type_err)?;
    let spread_ca = spread.as_ref().map(|c| c.i32()).transpose().map_err(type_err)?;
    let real_ca = real_volume
        .as_ref()
        .map(|c| c.u64())
        .transpose()
        .map_err(type_err)?;

    let mut bars = Vec::with_capacity(df.height());
    for (i, ms) in millis.into_iter().enumerate() {
        let ms = ms.ok_or_else(|| DataError::ParquetError(format!("null timestamp at row {i}")))?;
        let timestamp = DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| DataError::ParquetError(format!("timestamp out of range at row {i}")))?;

        bars.push(Bar {
            timestamp,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
            spread: spread_ca.and_then(|ca| ca.get(i)),
            real_volume: real_ca.and_then(|ca| ca.get(i)),
        });
    }
    Ok(bars)
}

fn cast_column(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Column, DataError> {
    df.column(name)
        .map_err(|e| DataError::ParquetError(format!("column {name}: {e}")))?
        .cast(dtype)
        .map_err(|e| DataError::ParquetError(format!("cast {name}: {e}")))
}

fn optional_column(
    df: &DataFrame,
    name: &str,
    dtype: &DataType,
) -> Result<Option<Column>, DataError> {
    if df.column(name).is_err() {
        return Ok(None);
    }
    cast_column(df, name, dtype).map(Some)
}

/// Timestamp column as epoch milliseconds, whatever unit it was stored in.
fn timestamp_millis(df: &DataFrame) -> Result<Vec<Option<i64>>, DataError> {
    let column = df
        .column("timestamp")
        .map_err(|e| DataError::ParquetError(format!("column timestamp: {e}")))?;
    let divisor = match column.dtype() {
        DataType::Datetime(TimeUnit::Nanoseconds, _) => 1_000_000,
        DataType::Datetime(TimeUnit::Microseconds, _) => 1_000,
        DataType::Datetime(TimeUnit::Milliseconds, _) => 1,
        other => {
            return Err(DataError::ParquetError(format!(
                "timestamp column has type {other:?}"
            )))
        }
    };
    let raw = column
        .cast(&DataType::Int64)
        .map_err(|e| DataError::ParquetError(format!("cast timestamp: {e}")))?;
    let ca = raw
        .i64()
        .map_err(|e| DataError::ParquetError(format!("timestamp column type: {e}")))?;
    Ok(ca.into_iter().map(|v| v.map(|v| v.div_euclid(divisor))).collect())
}

// ── CSV ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
    #[serde(default)]
    spread: Option<i32>,
    #[serde(default)]
    real_volume: Option<u64>,
}

fn write_csv(bars: &[Bar], path: &Path) -> Result<(), DataError> {
    let csv_err = |e: csv::Error| DataError::CsvError(format!("{}: {e}", path.display()));
    let with_spread = bars.iter().any(|b| b.spread.is_some());
    let with_real = bars.iter().any(|b| b.real_volume.is_some());

    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    let mut header = vec!["timestamp", "open", "high", "low", "close", "volume"];
    if with_spread {
        header.push("spread");
    }
    if with_real {
        header.push("real_volume");
    }
    wtr.write_record(&header).map_err(csv_err)?;

    for bar in bars {
        let mut record = vec![
            bar.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ];
        if with_spread {
            record.push(bar.spread.map(|s| s.to_string()).unwrap_or_default());
        }
        if with_real {
            record.push(bar.real_volume.map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record).map_err(csv_err)?;
    }
    wtr.flush()
        .map_err(|e| DataError::CsvError(format!("flush {}: {e}", path.display())))
}

fn read_csv(path: &Path) -> Result<(Vec<Bar>, usize), DataError> {
    let csv_err = |e: csv::Error| DataError::CsvError(format!("{}: {e}", path.display()));
    let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;

    let mut bars = Vec::new();
    let mut nulls = 0;
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| DataError::CsvError(format!("row {i}: bad timestamp: {e}")))?
            .with_timezone(&Utc);

        nulls += [row.open, row.high, row.low, row.close]
            .iter()
            .filter(|v| v.is_none())
            .count();
        nulls += usize::from(row.volume.is_none());

        bars.push(Bar {
            timestamp,
            open: row.open.unwrap_or(f64::NAN),
            high: row.high.unwrap_or(f64::NAN),
            low: row.low.unwrap_or(f64::NAN),
            close: row.close.unwrap_or(f64::NAN),
            volume: row.volume.unwrap_or(0),
            spread: row.spread,
            real_volume: row.real_volume,
        });
    }
    Ok((bars, nulls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use chrono::{Duration, TimeZone};
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_data_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("balerion_store_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn bars(count: usize, base: f64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| Bar {
                timestamp: start + Duration::minutes(i as i64),
                open: base,
                high: base + 0.001,
                low: base - 0.001,
                close: base + 0.0005,
                volume: 10 + i as u64,
                spread: Some(2),
                real_volume: Some(0),
            })
            .collect()
    }

    fn eurusd() -> SymbolSpec {
        SymbolSpec::new("EURUSD", Category::Fx)
    }

    #[test]
    fn paths_follow_category_layout() {
        let store = BarStore::new("/data", SaveFormat::Parquet);
        let spec = SymbolSpec::new("US30", Category::Indices);
        assert_eq!(
            store.parquet_path(&spec),
            PathBuf::from("/data/indices/us30_1m.parquet")
        );
        assert_eq!(
            store.backup_path(&spec),
            PathBuf::from("/data/indices/us30_1m.parquet.backup")
        );
        assert_eq!(store.csv_path(&spec), PathBuf::from("/data/indices/us30_1m.csv"));
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Parquet);
        let original = bars(5, 1.1);

        let path = store.write(&eurusd(), &original).unwrap();
        assert!(path.ends_with("fx/eurusd_1m.parquet"));

        let dataset = store.load_dataset(&eurusd()).unwrap();
        assert_eq!(dataset.bars, original);
        assert_eq!(dataset.null_count, 0);
        assert!(dataset.file_size > 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn persisted_schema_matches() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Parquet);
        store.write(&eurusd(), &bars(3, 1.1)).unwrap();

        let df = read_frame(&store.parquet_path(&eurusd())).unwrap();
        assert_eq!(
            df.column("timestamp").unwrap().dtype(),
            &BarSchema::timestamp_dtype()
        );
        assert_eq!(df.column("volume").unwrap().dtype(), &DataType::UInt64);
        assert_eq!(df.column("spread").unwrap().dtype(), &DataType::Int32);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn optional_columns_are_omitted_when_absent() {
        let stripped: Vec<Bar> = bars(3, 1.1).into_iter().map(Bar::without_optional).collect();
        let df = bars_to_frame(&stripped).unwrap();
        assert_eq!(df.width(), 6);
        assert_eq!(frame_to_bars(&df).unwrap(), stripped);
    }

    #[test]
    fn load_missing_is_no_dataset() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Parquet);
        let err = store.load(&eurusd()).unwrap_err();
        assert!(matches!(err, DataError::NoDataset { .. }));
        assert!(err.to_string().contains("balerion collect"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn replace_removes_backup_on_success() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Parquet);
        store.write(&eurusd(), &bars(3, 1.1)).unwrap();

        store.replace(&eurusd(), &bars(4, 1.2)).unwrap();

        assert!(!store.backup_path(&eurusd()).exists());
        let loaded = store.load(&eurusd()).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[0].open, 1.2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn replace_keeps_backup_when_write_fails() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Parquet);
        store.write(&eurusd(), &bars(3, 1.1)).unwrap();

        // empty input is rejected by write
        assert!(store.replace(&eurusd(), &[]).is_err());

        assert!(store.backup_path(&eurusd()).exists());
        assert!(!store.parquet_path(&eurusd()).exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_csv_write_keeps_every_backup() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Both);
        store.write(&eurusd(), &bars(3, 1.1)).unwrap();

        // a directory squatting on the csv tmp name makes the csv write fail
        let csv_tmp = tmp_of(&store.csv_path(&eurusd()));
        fs::create_dir_all(&csv_tmp).unwrap();

        assert!(store.replace(&eurusd(), &bars(4, 1.2)).is_err());

        let parquet_backup = backup_of(&store.parquet_path(&eurusd()));
        let csv_backup = backup_of(&store.csv_path(&eurusd()));
        let old_parquet = frame_to_bars(&read_frame(&parquet_backup).unwrap()).unwrap();
        let (old_csv, _) = read_csv(&csv_backup).unwrap();
        assert_eq!(old_parquet, bars(3, 1.1));
        assert_eq!(old_csv, bars(3, 1.1));

        assert!(!store.parquet_path(&eurusd()).exists());
        assert!(!store.csv_path(&eurusd()).exists());
        assert!(!tmp_of(&store.parquet_path(&eurusd())).exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_parquet_write_leaves_no_tmp() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Parquet);
        let parquet_tmp = tmp_of(&store.parquet_path(&eurusd()));
        fs::create_dir_all(&parquet_tmp).unwrap();

        assert!(store.write(&eurusd(), &bars(2, 1.1)).is_err());
        assert!(!store.parquet_path(&eurusd()).exists());

        // only the squatting directory remains, no stray file
        assert!(parquet_tmp.is_dir());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn both_format_writes_csv_copy() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Both);
        let original = bars(3, 1.1);
        store.write(&eurusd(), &original).unwrap();

        assert!(store.parquet_path(&eurusd()).exists());
        let (from_csv, nulls) = read_csv(&store.csv_path(&eurusd())).unwrap();
        assert_eq!(from_csv, original);
        assert_eq!(nulls, 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn csv_only_store_reads_csv() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Csv);
        store.write(&eurusd(), &bars(2, 1.1)).unwrap();

        assert!(!store.parquet_path(&eurusd()).exists());
        assert_eq!(store.load(&eurusd()).unwrap().len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn nulls_are_counted_and_read_as_nan() {
        let df = DataFrame::new(vec![
            BarSchema::timestamp_column(vec![0, 60_000]).unwrap(),
            Column::new("open".into(), &[Some(1.0), None]),
            Column::new("high".into(), &[1.1, 1.1]),
            Column::new("low".into(), &[0.9, 0.9]),
            Column::new("close".into(), &[1.0, 1.0]),
            Column::new("volume".into(), &[1u64, 2]),
        ])
        .unwrap();

        assert_eq!(count_nulls(&df), 1);
        let bars = frame_to_bars(&df).unwrap();
        assert!(bars[1].is_void());
    }

    #[test]
    fn inspect_tolerates_what_load_rejects() {
        let dir = temp_data_dir();
        let store = BarStore::new(&dir, SaveFormat::Parquet);
        let mut df = DataFrame::new(vec![
            BarSchema::timestamp_column(vec![0, 60_000]).unwrap(),
            Column::new("open".into(), &[1.0, 1.0]),
            Column::new("high".into(), &[1.1, 1.1]),
            Column::new("low".into(), &[0.9, 0.9]),
            Column::new("close".into(), &[1.0, 1.0]),
            Column::new("volume".into(), &[1u64, 2]),
            Column::new("spread".into(), &[2.0, 3.0]),
        ])
        .unwrap();
        fs::create_dir_all(dir.join("fx")).unwrap();
        write_parquet(&mut df, &store.parquet_path(&eurusd())).unwrap();

        assert!(matches!(store.load_dataset(&eurusd()), Err(DataError::Schema(_))));
        let dataset = store.inspect(&eurusd()).unwrap();
        assert_eq!(dataset.bars.len(), 2);
        assert_eq!(dataset.bars[1].spread, Some(3));
        assert!(dataset.schema_issue.unwrap().contains("spread"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn foreign_time_unit_is_normalised() {
        let ns = Column::new("timestamp".into(), vec![60_000_000_000i64])
            .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))
            .unwrap();
        let df = DataFrame::new(vec![
            ns,
            Column::new("open".into(), &[1.0f32]),
            Column::new("high".into(), &[1.1f32]),
            Column::new("low".into(), &[0.9f32]),
            Column::new("close".into(), &[1.0f32]),
            Column::new("volume".into(), &[3i64]),
        ])
        .unwrap();

        let bars = frame_to_bars(&df).unwrap();
        assert_eq!(bars[0].timestamp, Utc.with_ymd_and_hms(1970, 1, 1, 0, 1, 0).unwrap());
        assert_eq!(bars[0].volume, 3);
    }
}
