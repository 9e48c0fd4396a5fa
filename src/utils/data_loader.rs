//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk table formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Parquet,
    Json,
    JsonLines,
}

impl FileFormat {
    /// Unknown or missing extensions are treated as CSV.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "tsv" => FileFormat::Tsv,
            "parquet" | "pq" => FileFormat::Parquet,
            "json" => FileFormat::Json,
            "jsonl" => FileFormat::JsonLines,
            _ => FileFormat::Csv,
        }
    }

    fn separator(&self) -> u8 {
        match self {
            FileFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Data loader for various file formats
pub struct DataLoader {
    /// Rows used for CSV schema inference
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// Rows scanned to infer CSV column types (`None` scans the whole file)
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a delimited text file with a header row
    pub fn load_csv_with_separator(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let file = open(path)?;

        let parse_opts = CsvParseOptions::default().with_separator(separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| read_error(path, e))
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        self.load_csv_with_separator(path, b',')
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = open(path)?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| read_error(path, e))
    }

    /// Load a JSON array or JSON-lines file
    pub fn load_json(&self, path: &Path, format: JsonFormat) -> Result<DataFrame> {
        let file = open(path)?;

        JsonReader::new(file)
            .with_json_format(format)
            .finish()
            .map_err(|e| read_error(path, e))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path);
        debug!(path = %path.display(), ?format, "Loading dataset");

        match format {
            FileFormat::Csv | FileFormat::Tsv => {
                self.load_csv_with_separator(path, format.separator())
            }
            FileFormat::Parquet => self.load_parquet(path),
            FileFormat::Json => self.load_json(path, JsonFormat::Json),
            FileFormat::JsonLines => self.load_json(path, JsonFormat::JsonLines),
        }
    }
}

/// Writes DataFrames, picking the format from the extension
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV (or TSV)
    pub fn save_csv(df: &mut DataFrame, path: &Path, separator: u8) -> Result<()> {
        write_with(path, |file| {
            CsvWriter::new(file)
                .include_header(true)
                .with_separator(separator)
                .finish(df)
        })
    }

    /// Save to Parquet
    pub fn save_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
        write_with(path, |file| ParquetWriter::new(file).finish(df).map(|_| ()))
    }

    /// Save to JSON
    pub fn save_json(df: &mut DataFrame, path: &Path, format: JsonFormat) -> Result<()> {
        write_with(path, |file| {
            JsonWriter::new(file).with_json_format(format).finish(df)
        })
    }

    /// Save in the format implied by the extension, creating parent directories.
    pub fn save_auto(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match FileFormat::from_path(path) {
            format @ (FileFormat::Csv | FileFormat::Tsv) => {
                Self::save_csv(df, path, format.separator())
            }
            FileFormat::Parquet => Self::save_parquet(df, path),
            FileFormat::Json => Self::save_json(df, path, JsonFormat::Json),
            FileFormat::JsonLines => Self::save_json(df, path, JsonFormat::JsonLines),
        }
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written file.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let tmp = prepare_target(path)?;

    let result = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| std::fs::rename(&tmp, path));

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(PipelineError::IoError(e));
    }
    Ok(())
}

fn write_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> PolarsResult<()>,
{
    let tmp = prepare_target(path)?;

    let outcome = File::create(&tmp)
        .map_err(PipelineError::IoError)
        .and_then(|mut file| {
            write(&mut file).map_err(|e| {
                PipelineError::DataError(format!("failed to write {}: {}", path.display(), e))
            })
        })
        .and_then(|_| std::fs::rename(&tmp, path).map_err(PipelineError::IoError));

    if outcome.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    outcome
}

/// Create parent directories and return the temp path next to `path`.
fn prepare_target(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PipelineError::DataError(format!("{} is not a file path", path.display()))
        })?;
    Ok(path.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id())))
}

fn open(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| PipelineError::DataError(format!("failed to open {}: {}", path.display(), e)))
}

fn read_error(path: &Path, err: PolarsError) -> PipelineError {
    PipelineError::DataError(format!("failed to read {}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_csv(dir: &Path) -> PathBuf {
        let path = dir.join("trips.csv");
        std::fs::write(&path, "a,b,c\n1,2,x\n4,,y\n7,8,z\n").unwrap();
        path
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.parquet")), FileFormat::Parquet);
        assert_eq!(FileFormat::from_path(Path::new("b.PQ")), FileFormat::Parquet);
        assert_eq!(FileFormat::from_path(Path::new("b.tsv")), FileFormat::Tsv);
        assert_eq!(FileFormat::from_path(Path::new("b.jsonl")), FileFormat::JsonLines);
        assert_eq!(FileFormat::from_path(Path::new("b.txt")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("noext")), FileFormat::Csv);
    }

    #[test]
    fn test_load_csv_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let df = DataLoader::new().load_auto(create_test_csv(dir.path())).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataLoader::new()
            .load_auto(dir.path().join("nope.parquet"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
        assert!(err.to_string().contains("nope.parquet"));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut df = DataFrame::new(vec![
            Column::new("a".into(), &[1i64, 2, 3]),
            Column::new("b".into(), &[4.0, 5.0, 6.0]),
        ])
        .unwrap();

        for name in ["out.csv", "out.parquet", "out.json", "out.jsonl", "out.tsv"] {
            let path = dir.path().join("nested").join(name);
            DataSaver::save_auto(&mut df, &path).unwrap();

            let loaded = DataLoader::new().load_auto(&path).unwrap();
            assert_eq!(loaded.height(), 3, "{}", name);
            assert_eq!(loaded.width(), 2, "{}", name);
        }
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
