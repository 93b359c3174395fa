//! Downloaded-item records used for dedup and resume.

use crate::types::ItemStatus;
use crate::Result;

use super::{Database, DownloadItem, DownloadItemRow, NewDownloadItem, query_error};

impl Database {
    /// Insert or replace the record of `(uid, item.item_id)`
    ///
    /// Each call commits on its own so a recorded item survives interruption.
    pub async fn upsert_item(&self, uid: &str, item: &NewDownloadItem) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let media_urls = serde_json::to_string(&item.media_urls)?;

        sqlx::query(
            r#"
            INSERT INTO downloaded_items (
                uid, item_id, media_urls, file_name, sha256, size_bytes,
                status, error_message, recorded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(uid, item_id) DO UPDATE SET
                media_urls = excluded.media_urls,
                file_name = excluded.file_name,
                sha256 = excluded.sha256,
                size_bytes = excluded.size_bytes,
                status = excluded.status,
                error_message = excluded.error_message,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(uid)
        .bind(&item.item_id)
        .bind(media_urls)
        .bind(&item.file_name)
        .bind(&item.sha256)
        .bind(item.size_bytes as i64)
        .bind(item.status.to_i32())
        .bind(&item.error_message)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to record item", e))?;

        Ok(())
    }

    /// Get the record of one item
    pub async fn get_item(&self, uid: &str, item_id: &str) -> Result<Option<DownloadItem>> {
        let row = sqlx::query_as::<_, DownloadItemRow>(
            r#"
            SELECT uid, item_id, media_urls, file_name, sha256, size_bytes,
                   status, error_message, recorded_at
            FROM downloaded_items
            WHERE uid = ? AND item_id = ?
            "#,
        )
        .bind(uid)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get item", e))?;

        Ok(row.map(DownloadItem::from))
    }

    /// Whether the item was completely downloaded by an earlier run
    pub async fn is_item_complete(&self, uid: &str, item_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM downloaded_items
            WHERE uid = ? AND item_id = ? AND status = ?
            "#,
        )
        .bind(uid)
        .bind(item_id)
        .bind(ItemStatus::Complete.to_i32())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to check item", e))?;

        Ok(found.is_some())
    }

    /// Number of records for a user, optionally restricted to one status
    pub async fn count_items(&self, uid: &str, status: Option<ItemStatus>) -> Result<i64> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM downloaded_items WHERE uid = ? AND status = ?",
                )
                .bind(uid)
                .bind(status.to_i32())
                .fetch_one(&self.pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM downloaded_items WHERE uid = ?")
                    .bind(uid)
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| query_error("Failed to count items", e))?;

        Ok(count)
    }

    /// Number of records across all users
    pub async fn count_all_items(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloaded_items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error("Failed to count items", e))?;

        Ok(count)
    }
}
