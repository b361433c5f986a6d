use thiserror::Error;

/// Failures from the transport, the server, JSON handling, DuckDB or the filesystem, passed
/// through without retry or recovery.
#[derive(Debug, Error)]
pub enum Error {
    #[error("clickhouse request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("clickhouse returned {status}: {body}")]
    Server {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("column {column}: {reason}")]
    Column { column: String, reason: String },
}

impl Error {
    pub(crate) fn column(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Column {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
