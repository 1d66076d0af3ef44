//! Custom error types for scholarcsv.
//!
//! Errors are grouped by the stage that raised them: configuration,
//! fetching from the search service, and writing the CSV file.
//! All functions return `Result<T, ScholarError>` (or the stage error)
//! instead of using `unwrap()`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scholarcsv operations.
///
/// Each variant names the stage that failed so the message shown to the
/// user says where the run stopped.
#[derive(Debug, Error)]
pub enum ScholarError {
    /// Missing or invalid API key, query or result count
    #[error("configuration error: {0}")]
    Config(String),

    /// The search request failed
    #[error("search request failed: {0}")]
    Fetch(#[from] FetchError),

    /// Writing the output file failed
    #[error("writing results failed: {0}")]
    Write(#[from] WriteError),
}

/// Failure of the single outbound search request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service rejected the API key (HTTP 401/403)
    #[error("authentication rejected (HTTP {status}): {message}")]
    Auth {
        /// HTTP status code
        status: u16,
        /// Error text reported by the service
        message: String,
    },

    /// Connection, DNS or transport failure, or an unclassified non-2xx status
    #[error("network error: {0}")]
    Network(String),

    /// The response body is not the JSON shape we can read
    #[error("invalid response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

// reqwest puts the request URL in its message, and the URL carries the key.
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.without_url().to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// Failure while persisting results.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The output location is not writable
    #[error("permission denied: {}", path.display())]
    Permission {
        /// Directory or file that could not be written
        path: PathBuf,
    },

    /// A row could not be serialized as CSV
    #[error("cannot encode row {row}: {message}")]
    Encoding {
        /// 1-based data row number
        row: usize,
        /// Serializer message
        message: String,
    },

    /// The target file name is already taken
    #[error("output file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Any other file system error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => WriteError::Permission { path },
            std::io::ErrorKind::AlreadyExists => WriteError::AlreadyExists(path),
            _ => WriteError::Io { path, source },
        }
    }
}

impl ScholarError {
    /// Whether the run failed only because its output file name was taken.
    pub fn is_name_collision(&self) -> bool {
        matches!(self, ScholarError::Write(WriteError::AlreadyExists(_)))
    }
}

/// Result type alias using `ScholarError`
pub type Result<T> = std::result::Result<T, ScholarError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_stage_is_named_in_message() {
        let err = ScholarError::from(FetchError::Auth {
            status: 401,
            message: "Invalid API key".to_string(),
        });
        let text = err.to_string();
        assert!(text.starts_with("search request failed"));
        assert!(text.contains("401"));
        assert!(text.contains("Invalid API key"));

        let err = ScholarError::Config("SERPAPI_KEY is not set".to_string());
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_write_error_from_io() {
        let err = WriteError::from_io("out", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, WriteError::Permission { .. }));

        let err = WriteError::from_io("out.csv", io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(err, WriteError::AlreadyExists(_)));

        let err = WriteError::from_io("out.csv", io::Error::from(io::ErrorKind::Other));
        assert!(matches!(err, WriteError::Io { .. }));
    }

    #[test]
    fn test_name_collision() {
        let err = ScholarError::from(WriteError::AlreadyExists(PathBuf::from("a.csv")));
        assert!(err.is_name_collision());

        let err = ScholarError::from(WriteError::Permission {
            path: PathBuf::from("out"),
        });
        assert!(!err.is_name_collision());
        assert!(!ScholarError::Config("x".to_string()).is_name_collision());
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(FetchError::Network("connection reset".to_string()).is_transient());
        assert!(!FetchError::Parse("bad json".to_string()).is_transient());
        assert!(!FetchError::Auth {
            status: 403,
            message: String::new()
        }
        .is_transient());
    }
}
