//! Database layer for social-dl
//!
//! Handles SQLite persistence of per-user state: folder identity, downloaded items and
//! listing cursors. One database file exists per platform.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`users`]: User records (remote id → nickname, folder)
//! - [`items`]: Downloaded-item records (dedup and resume)
//! - [`cursors`]: Last-seen listing cursors

use crate::error::DatabaseError;
use crate::types::ItemStatus;
use crate::Error;
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod cursors;
mod items;
mod migrations;
mod users;

/// User record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    /// Stable remote user id
    pub uid: String,
    /// Last observed display name
    pub nickname: String,
    /// Local folder holding the user's files
    pub folder_path: String,
    /// Unix timestamp when the user was first seen
    pub created_at: i64,
    /// Unix timestamp of the last change
    pub updated_at: i64,
}

impl UserRecord {
    /// Folder as a path
    pub fn folder(&self) -> PathBuf {
        PathBuf::from(&self.folder_path)
    }
}

/// Item to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDownloadItem {
    /// Remote item id
    pub item_id: String,
    /// Media URLs that were (or were to be) fetched
    pub media_urls: Vec<String>,
    /// File stem the item was written under
    pub file_name: String,
    /// SHA-256 over all written bytes, hex
    pub sha256: Option<String>,
    /// Total bytes written
    pub size_bytes: u64,
    /// Outcome
    pub status: ItemStatus,
    /// Error message for failed items
    pub error_message: Option<String>,
}

/// Downloaded-item record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct DownloadItemRow {
    /// Owning user id
    pub uid: String,
    /// Remote item id
    pub item_id: String,
    /// JSON array of media URLs
    pub media_urls: String,
    /// File stem
    pub file_name: String,
    /// SHA-256 checksum, hex
    pub sha256: Option<String>,
    /// Total bytes
    pub size_bytes: i64,
    /// Status code (see [`ItemStatus`])
    pub status: i32,
    /// Error message for failed items
    pub error_message: Option<String>,
    /// Unix timestamp of the last write
    pub recorded_at: i64,
}

/// Downloaded-item record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    /// Owning user id
    pub uid: String,
    /// Remote item id
    pub item_id: String,
    /// Media URLs
    pub media_urls: Vec<String>,
    /// File stem
    pub file_name: String,
    /// SHA-256 checksum, hex
    pub sha256: Option<String>,
    /// Total bytes
    pub size_bytes: u64,
    /// Status
    pub status: ItemStatus,
    /// Error message for failed items
    pub error_message: Option<String>,
    /// Unix timestamp of the last write
    pub recorded_at: i64,
}

impl From<DownloadItemRow> for DownloadItem {
    fn from(row: DownloadItemRow) -> Self {
        DownloadItem {
            uid: row.uid,
            item_id: row.item_id,
            media_urls: serde_json::from_str(&row.media_urls).unwrap_or_default(),
            file_name: row.file_name,
            sha256: row.sha256,
            size_bytes: row.size_bytes.max(0) as u64,
            status: ItemStatus::from_i32(row.status),
            error_message: row.error_message,
            recorded_at: row.recorded_at,
        }
    }
}

/// Database handle for social-dl
pub struct Database {
    pool: SqlitePool,
}

/// Map a query failure, treating a closed or exhausted pool as a lost connection
fn query_error(context: &str, e: sqlx::Error) -> Error {
    let message = format!("{}: {}", context, e);
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            Error::Database(DatabaseError::ConnectionFailed(message))
        }
        _ => Error::Database(DatabaseError::QueryFailed(message)),
    }
}
