//! Error taxonomy shared across the library.
//!
//! Resolver misses (`NotFound`, ambiguity) are data results on the query
//! surfaces and only become errors at operation boundaries that require a
//! unique answer.

use thiserror::Error;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("note '{0}' not found")]
    NotFound(String),

    #[error("'{text}' is ambiguous; candidates: {candidates:?}")]
    Ambiguous {
        text: String,
        candidates: Vec<String>,
    },

    #[error("invalid note id '{0}' (expected [A-Za-z0-9_-]+)")]
    InvalidId(String),

    #[error("unterminated header: opening '---' without a closing '---'")]
    MalformedHeader,

    #[error("header is not valid YAML: {0}")]
    InvalidHeaderValue(String),

    #[error("index corrupted: {0}")]
    Corruption(String),

    #[error("index schema v{0} is newer than this zkn expects (v{1}); upgrade zkn or delete the index")]
    SchemaNewer(i64, i64),

    #[error("index write lock busy (timed out after {0} ms)")]
    Busy(u64),

    #[error("index is empty or stale. Run: zkn reindex")]
    EmptyIndex,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        // SQLITE_BUSY surfaces only after the connection's busy_timeout has
        // elapsed; report it as a distinct condition so callers can retry.
        if let sqlx::Error::Database(ref db) = e {
            if db.code().as_deref() == Some("5") {
                return Error::Busy(crate::store::BUSY_TIMEOUT_MS);
            }
        }
        Error::Db(e)
    }
}
