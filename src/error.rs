//! Error types for social-dl
//!
//! This module provides the error taxonomy of the acquisition core:
//! - Configuration errors (fatal before any network call)
//! - Signing errors (fatal for the affected request, never retried)
//! - Fetch errors (classified as retryable or not)
//! - Storage and database errors (item-fatal, or run-fatal when the store is unreachable)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for social-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for social-dl
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "naming")
        key: Option<String>,
    },

    /// Request signing failed
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    /// HTTP request failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Filesystem operation on the download tree failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled before the operation completed
    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    /// Build a configuration error for `key`
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error must abort the whole run rather than a single item
    ///
    /// Invalid configuration, signing failures and an unreachable store are run-fatal.
    /// Everything else is isolated to the item that produced it.
    pub fn is_run_fatal(&self) -> bool {
        match self {
            Error::Config { .. } | Error::Signing(_) | Error::Cancelled => true,
            Error::Database(e) => matches!(
                e,
                DatabaseError::ConnectionFailed(_) | DatabaseError::MigrationFailed(_)
            ),
            Error::Sqlx(e) => matches!(
                e,
                sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)
            ),
            Error::Fetch(_)
            | Error::Storage(_)
            | Error::Io(_)
            | Error::Serialization(_) => false,
        }
    }

    /// Machine-readable error code, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Signing(e) => match e {
                SigningError::MissingField { .. } => "signing_missing_field",
                SigningError::Malformed { .. } => "signing_malformed",
                SigningError::UnsupportedVersion { .. } => "signing_unsupported_version",
            },
            Error::Fetch(e) => match e {
                FetchError::Timeout { .. } => "timeout",
                FetchError::RateLimited { .. } => "rate_limited",
                FetchError::ServerError { .. } => "server_error",
                FetchError::ClientError { .. } => "client_error",
                FetchError::Connect { .. } => "connect_error",
                FetchError::Decode { .. } => "decode_error",
                FetchError::Cancelled => "cancelled",
            },
            Error::Storage(e) => match e {
                StorageError::CreateFolder { .. } => "create_folder_failed",
                StorageError::RenameFailed { .. } => "rename_failed",
                StorageError::FolderCollision { .. } => "folder_collision",
                StorageError::WriteFailed { .. } => "write_failed",
            },
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Cancelled => "cancelled",
        }
    }
}

/// Request signing errors
///
/// These always indicate a configuration defect (missing credentials, stale algorithm
/// parameters) and are never retried.
#[derive(Debug, Error)]
pub enum SigningError {
    /// A context field required by the algorithm is absent
    #[error("{algorithm} signature requires `{field}`")]
    MissingField {
        /// The signing algorithm
        algorithm: &'static str,
        /// The missing field
        field: &'static str,
    },

    /// A context field is present but unusable
    #[error("malformed `{field}`: {reason}")]
    Malformed {
        /// The malformed field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The configured algorithm version is not implemented
    #[error("{algorithm} signature version {version} is not supported")]
    UnsupportedVersion {
        /// The signing algorithm
        algorithm: &'static str,
        /// The requested version
        version: u32,
    },
}

/// HTTP fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL
        url: String,
    },

    /// The platform answered HTTP 429
    #[error("rate limited by {url}")]
    RateLimited {
        /// Requested URL
        url: String,
        /// Delay requested by the server via `Retry-After`
        retry_after: Option<Duration>,
    },

    /// The platform answered with HTTP 5xx
    #[error("server error {status} from {url}")]
    ServerError {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The platform answered with HTTP 4xx (other than 429)
    #[error("client error {status} from {url}")]
    ClientError {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Connection could not be established or was reset
    #[error("connection to {url} failed: {reason}")]
    Connect {
        /// Requested URL
        url: String,
        /// Underlying transport error
        reason: String,
    },

    /// The response body could not be interpreted
    #[error("unexpected response from {url}: {reason}")]
    Decode {
        /// Requested URL
        url: String,
        /// What was wrong with the body
        reason: String,
    },

    /// The run was cancelled while the request was queued or in flight
    #[error("request cancelled")]
    Cancelled,
}

/// Filesystem errors on the download tree
#[derive(Debug, Error)]
pub enum StorageError {
    /// A user folder could not be created
    #[error("failed to create folder {path}: {reason}")]
    CreateFolder {
        /// The folder that could not be created
        path: PathBuf,
        /// The underlying error
        reason: String,
    },

    /// Renaming a user folder failed; the persisted record is unchanged
    #[error("failed to rename {from} to {to}: {reason}")]
    RenameFailed {
        /// Current folder
        from: PathBuf,
        /// Requested folder
        to: PathBuf,
        /// The underlying error
        reason: String,
    },

    /// The folder a user would be renamed to is already in use
    #[error("folder {path} already exists")]
    FolderCollision {
        /// The conflicting folder
        path: PathBuf,
    },

    /// Writing a downloaded file failed
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// The destination path
        path: PathBuf,
        /// The underlying error
        reason: String,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}
