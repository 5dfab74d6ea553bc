//! Error types shared by every storage engine

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Declared index schema is invalid or could not be applied
    #[error("schema error: {0}")]
    Schema(String),

    /// The declared schema differs from the store but no upgrade transaction is available
    #[error("cannot modify index \"{index}\" for the current version, bump the version to {version}")]
    VersionBumpRequired { index: String, version: u32 },

    /// Requested version is older than the version on disk
    #[error("requested version {requested} is lower than the existing version {existing}")]
    VersionDowngrade { requested: u32, existing: u32 },

    /// Key range descriptor could not be built
    #[error("invalid key range: {0}")]
    InvalidKeyRange(#[from] KeyRangeError),

    /// Failure opening or advancing a cursor
    #[error("cursor error: {0}")]
    Cursor(String),

    /// Transaction aborted, errored, or completed without a result
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Mutation attempted through a read-only transaction
    #[error("transaction is read-only: {0}")]
    ReadOnly(String),

    /// Unique index or key constraint violated
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Value is not a valid key, or a key could not be derived from a record
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Configuration rejected during validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage backend error (engine not available, unexpected engine state)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors raised synchronously while building a key range.
///
/// These are caller contract violations, never runtime conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyRangeError {
    #[error("neither a lower nor an upper bound was supplied")]
    NoBounds,

    #[error("`only` cannot be combined with lower or upper bounds")]
    OnlyWithBounds,

    #[error("lower bound is greater than upper bound")]
    LowerAboveUpper,

    #[error("equal bounds exclude every key")]
    Empty,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
