use thiserror::Error;

/// Errors produced by the store, auth and domain layers.
///
/// JSON reads never surface these: [`crate::storage::read_json`] reports a
/// missing or unreadable key as absent. Only writes to the durable backend and the domain checks in
/// [`crate::lifelink`] can fail.
#[derive(Error, Debug)]
pub enum StoreError {
    /// LMDB environment, transaction or write failure.
    #[error("LMDB error: {0}")]
    Lmdb(#[from] lmdb::Error),

    /// Filesystem error while preparing the database directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure on a write path.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value under `key` is not valid UTF-8.
    #[error("Value under {key} is not UTF-8: {source}")]
    InvalidUtf8 {
        key: String,
        source: std::str::Utf8Error,
    },

    /// An operation needed a signed-in user and there was no session.
    #[error("No active session")]
    NotAuthenticated,

    /// A row could not be read back as the typed record it should hold.
    #[error("Invalid {table} record: {reason}")]
    InvalidRecord { table: String, reason: String },

    /// Configuration could not be parsed or is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
