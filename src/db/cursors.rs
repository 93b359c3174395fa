//! Last-seen listing cursors, one per user and mode.

use crate::Result;

use super::{Database, query_error};

impl Database {
    /// Persist the continuation token of an unfinished listing
    pub async fn save_cursor(&self, uid: &str, mode: &str, cursor: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO listing_cursors (uid, mode, cursor, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(uid, mode) DO UPDATE SET cursor = excluded.cursor, updated_at = excluded.updated_at
            "#,
        )
        .bind(uid)
        .bind(mode)
        .bind(cursor)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to save cursor", e))?;

        Ok(())
    }

    /// Continuation token saved by an interrupted listing
    pub async fn get_cursor(&self, uid: &str, mode: &str) -> Result<Option<String>> {
        let cursor: Option<String> =
            sqlx::query_scalar("SELECT cursor FROM listing_cursors WHERE uid = ? AND mode = ?")
                .bind(uid)
                .bind(mode)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("Failed to get cursor", e))?;

        Ok(cursor)
    }

    /// Forget the cursor once a listing has been walked to its end
    pub async fn clear_cursor(&self, uid: &str, mode: &str) -> Result<()> {
        sqlx::query("DELETE FROM listing_cursors WHERE uid = ? AND mode = ?")
            .bind(uid)
            .bind(mode)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to clear cursor", e))?;

        Ok(())
    }
}
