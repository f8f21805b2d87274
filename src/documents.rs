//! Source document loading and output persistence.
//!
//! `.json` files hold a single JSON value. `.jsonl` files hold one JSON value
//! per line; they are loaded as one document whose value is an array of the
//! file's records, and written back one record per line. A format override
//! replaces the extension rule for every listed file, so line-per-record data
//! stored in `.json` files can be read too.

use crate::error::{ConfigError, PipelineError};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    JsonLines,
}

impl FileFormat {
    /// Format implied by the file extension, or `None` for other files.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            ext if ext.eq_ignore_ascii_case("json") => Some(FileFormat::Json),
            ext if ext.eq_ignore_ascii_case("jsonl") => Some(FileFormat::JsonLines),
            _ => None,
        }
    }
}

impl FromStr for FileFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(FileFormat::Json),
            "jsonl" | "ndjson" => Ok(FileFormat::JsonLines),
            _ => Err(ConfigError::UnknownFileFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Json => write!(f, "json"),
            FileFormat::JsonLines => write!(f, "jsonl"),
        }
    }
}

/// One loaded input file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Path relative to the input directory; reused for the output file
    pub relative_path: PathBuf,
    pub format: FileFormat,
    pub value: Value,
}

impl SourceDocument {
    pub fn name(&self) -> String {
        self.relative_path.display().to_string()
    }
}

/// A file that was excluded from the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<LoadFailure>,
}

/// Load every `.json` / `.jsonl` file directly inside `input_dir`, sorted by name.
///
/// Each file is parsed as `format_override` when given, otherwise by its
/// extension. Unreadable or unparsable files are reported in `failures` and
/// skipped. Only a missing or unreadable directory fails the whole load.
pub fn load_documents(
    input_dir: &Path,
    format_override: Option<FileFormat>,
) -> Result<LoadedDocuments, PipelineError> {
    let input_error = |source| PipelineError::Input {
        path: input_dir.to_path_buf(),
        source,
    };

    let mut files: Vec<(PathBuf, FileFormat)> = fs::read_dir(input_dir)
        .map_err(input_error)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            FileFormat::from_path(&path).map(|detected| (path, format_override.unwrap_or(detected)))
        })
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut loaded = LoadedDocuments::default();
    for (path, format) in files {
        let relative_path = path
            .strip_prefix(input_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());

        let parsed = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read file: {}", e))
            .and_then(|contents| parse_document(&contents, format));

        match parsed {
            Ok(value) => {
                debug!("Loaded {}", relative_path.display());
                loaded.documents.push(SourceDocument {
                    relative_path,
                    format,
                    value,
                });
            }
            Err(reason) => {
                warn!("Skipping {}: {}", path.display(), reason);
                loaded.failures.push(LoadFailure { path, reason });
            }
        }
    }

    Ok(loaded)
}

/// Parse file contents in the given format.
pub fn parse_document(contents: &str, format: FileFormat) -> Result<Value, String> {
    match format {
        FileFormat::Json => {
            serde_json::from_str(contents).map_err(|e| format!("invalid JSON: {}", e))
        }
        FileFormat::JsonLines => contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .map_err(|e| format!("invalid JSON on line {}: {}", i + 1, e))
            })
            .collect::<Result<Vec<Value>, String>>()
            .map(Value::Array),
    }
}

/// Serialize a document the way it was read.
pub fn render_document(value: &Value, format: FileFormat) -> Result<String, serde_json::Error> {
    match format {
        FileFormat::Json => {
            let mut out = serde_json::to_string_pretty(value)?;
            out.push('\n');
            Ok(out)
        }
        FileFormat::JsonLines => {
            let records = match value {
                Value::Array(records) => records.as_slice(),
                other => std::slice::from_ref(other),
            };
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// Write a translated document to `output_dir` under its original relative name.
pub fn write_document(
    output_dir: &Path,
    document: &SourceDocument,
    value: &Value,
) -> Result<PathBuf, PipelineError> {
    let path = output_dir.join(&document.relative_path);
    let output_error = |source| PipelineError::Output {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(output_error)?;
    }
    let rendered = render_document(value, document.format)
        .map_err(|e| output_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    fs::write(&path, rendered).map_err(output_error)?;

    Ok(path)
}
