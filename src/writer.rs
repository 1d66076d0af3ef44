//! CSV output for search results.
//!
//! Results are flattened into [`OutputRecord`]s with a fixed column set and
//! written to a new, timestamped file. Rows go to a temporary file first and
//! are renamed into place only once complete, so a failed write never leaves
//! a partial file behind.

use crate::error::WriteError;
use crate::serpapi::SearchResult;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// CSV column order for every output file
pub const OUTPUT_COLUMNS: &[&str] = &["id", "title", "authors", "publication", "link", "snippet"];

/// Separator placed between author names
pub const AUTHOR_SEPARATOR: &str = ", ";

/// File name prefix
const FILE_PREFIX: &str = "research_results";

/// Timestamp format embedded in file names
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Longest sanitized query kept in a file name
const MAX_QUERY_CHARS: usize = 64;

/// One flattened CSV row.
///
/// Field order matches [`OUTPUT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    /// 1-based rank in the response
    pub id: usize,
    pub title: String,
    pub authors: String,
    pub publication: String,
    pub link: String,
    pub snippet: String,
}

impl OutputRecord {
    /// Flatten one result; absent fields become empty strings.
    pub fn from_result(id: usize, result: &SearchResult) -> Self {
        Self {
            id,
            title: result.title().to_string(),
            authors: result.authors().join(AUTHOR_SEPARATOR),
            publication: result.publication().to_string(),
            link: result.link().to_string(),
            snippet: result.snippet().to_string(),
        }
    }
}

/// Flatten results into rows, keeping the service's order.
pub fn format_results(results: &[SearchResult]) -> Vec<OutputRecord> {
    results
        .iter()
        .enumerate()
        .map(|(idx, result)| OutputRecord::from_result(idx + 1, result))
        .collect()
}

/// Reduce a query to a file-name-safe fragment.
///
/// Alphanumeric characters are kept, every run of anything else becomes a
/// single `_`.
pub fn sanitize_query(query: &str) -> String {
    let mut safe = String::with_capacity(query.len());
    for c in query.trim().chars() {
        if c.is_alphanumeric() {
            safe.push(c);
        } else if !safe.ends_with('_') {
            safe.push('_');
        }
    }

    let safe: String = safe
        .trim_matches('_')
        .chars()
        .take(MAX_QUERY_CHARS)
        .collect();
    let safe = safe.trim_end_matches('_');

    if safe.is_empty() {
        "query".to_string()
    } else {
        safe.to_string()
    }
}

/// File name for a run of `query` started at `timestamp`.
pub fn output_file_name(query: &str, timestamp: &NaiveDateTime) -> String {
    format!(
        "{}_{}_{}.csv",
        FILE_PREFIX,
        sanitize_query(query),
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Writes result sets into a directory, one new file per call.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    /// Create a writer for `output_dir` (created on first write)
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Get the output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `results` to a new file stamped with the current local time.
    ///
    /// An empty result set produces a header-only file.
    pub fn write(&self, results: &[SearchResult], query: &str) -> Result<PathBuf, WriteError> {
        self.write_at(results, query, &Local::now().naive_local())
    }

    /// Write `results` to a new file stamped with `timestamp`.
    ///
    /// # Errors
    ///
    /// * `WriteError::Permission` if the directory or file cannot be created
    /// * `WriteError::Encoding` if a row cannot be serialized
    /// * `WriteError::AlreadyExists` if the target name is taken
    pub fn write_at(
        &self,
        results: &[SearchResult],
        query: &str,
        timestamp: &NaiveDateTime,
    ) -> Result<PathBuf, WriteError> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| WriteError::from_io(&self.output_dir, e))?;

        let path = self.output_dir.join(output_file_name(query, timestamp));
        if path.exists() {
            return Err(WriteError::AlreadyExists(path));
        }

        let records = format_results(results);
        debug!(path = %path.display(), rows = records.len(), "Writing CSV");

        let temp = tempfile::Builder::new()
            .prefix(".research_results_")
            .suffix(".csv.part")
            .tempfile_in(&self.output_dir)
            .map_err(|e| WriteError::from_io(&self.output_dir, e))?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(temp);

        wtr.write_record(OUTPUT_COLUMNS)
            .map_err(|e| csv_error(&path, 0, e))?;
        for record in &records {
            wtr.serialize(record)
                .map_err(|e| csv_error(&path, record.id, e))?;
        }

        let mut temp = wtr.into_inner().map_err(|e| {
            let err = e.error();
            WriteError::from_io(&path, std::io::Error::new(err.kind(), err.to_string()))
        })?;
        temp.flush().map_err(|e| WriteError::from_io(&path, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| WriteError::from_io(&path, e))?;

        // Fails instead of replacing a file that appeared meanwhile; the
        // temporary file is removed when `PersistError` is dropped.
        temp.persist_noclobber(&path)
            .map_err(|e| WriteError::from_io(&path, e.error))?;

        info!(path = %path.display(), rows = records.len(), "Results saved");
        Ok(path)
    }
}

fn csv_error(path: &Path, row: usize, err: csv::Error) -> WriteError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => WriteError::from_io(path, e),
        other => WriteError::Encoding {
            row,
            message: format!("{:?}", other),
        },
    }
}
