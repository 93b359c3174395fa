//! User records: stable remote id → display name and local folder.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, UserRecord, query_error};

impl Database {
    /// Insert a user unless one with the same uid or folder already exists
    ///
    /// Returns `true` when a row was inserted. A `false` return with no record for `uid`
    /// means another user already owns `folder_path`.
    pub async fn insert_user_if_absent(
        &self,
        uid: &str,
        nickname: &str,
        folder_path: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO users (uid, nickname, folder_path, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(uid)
        .bind(nickname)
        .bind(folder_path)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to insert user", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a user by remote id
    pub async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT uid, nickname, folder_path, created_at, updated_at
            FROM users
            WHERE uid = ?
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get user", e))?;

        Ok(row)
    }

    /// Find the user that owns `folder_path`, if any
    pub async fn find_user_by_folder(&self, folder_path: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT uid, nickname, folder_path, created_at, updated_at
            FROM users
            WHERE folder_path = ?
            "#,
        )
        .bind(folder_path)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to find user by folder", e))?;

        Ok(row)
    }

    /// Point a user at a new folder and display name
    pub async fn update_user_folder(
        &self,
        uid: &str,
        nickname: &str,
        folder_path: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET nickname = ?, folder_path = ?, updated_at = ?
            WHERE uid = ?
            "#,
        )
        .bind(nickname)
        .bind(folder_path)
        .bind(now)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to update user folder", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "user {} not found",
                uid
            ))));
        }

        Ok(())
    }

    /// Record a new display name without touching the folder
    pub async fn update_user_nickname(&self, uid: &str, nickname: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE users SET nickname = ?, updated_at = ? WHERE uid = ?")
            .bind(nickname)
            .bind(now)
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to update user nickname", e))?;

        Ok(())
    }

    /// Number of known users
    pub async fn count_users(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error("Failed to count users", e))?;

        Ok(count)
    }
}
