use std::path::PathBuf;

use thiserror::Error;

/// Error type for introspection, generation and caching.
#[derive(Error, Debug)]
pub enum DiagramError {
    /// Invalid configuration (unknown style, zero scale, bad TTL...).
    #[error("Configuration error: {0}")]
    Config(String),
    /// Error raised by sqlx while running an introspection statement.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// Error raised by a caller-supplied query executor.
    #[error("Query '{label}' failed: {message}")]
    Query { label: String, message: String },
    /// Connection error (e.g. unsupported URL scheme or unreachable server).
    #[error("Connection error: {0}")]
    Connection(String),
    /// A foreign key points at a table the schema does not contain.
    #[error("Table '{table}' references unknown table '{referenced}'")]
    UnknownTable { table: String, referenced: String },
    /// The cache destination could not be read or written.
    #[error("Cache error on {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An existing cache file is not a valid cache entry.
    #[error("Could not decode cache entry {}: {source}", path.display())]
    CacheDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The rendering service could not be reached or answered with an error.
    #[error("Transport error {code}: {message}")]
    Transport { code: u16, message: String },
}

impl DiagramError {
    pub fn query(label: &str, message: impl Into<String>) -> Self {
        DiagramError::Query {
            label: label.to_string(),
            message: message.into(),
        }
    }
}
