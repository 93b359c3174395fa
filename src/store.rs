//! Per-user state: folder identity, downloaded-item records and listing cursors
//!
//! [`UserStateStore`] is the only writer of the user database. It adds folder semantics on
//! top of [`Database`]: every user gets one folder under the run's output directory, named
//! after the user's display name, and the folder follows the user when the name changes.
//! All mutations for one user id are serialized through a per-user lock.

use crate::db::{Database, NewDownloadItem, UserRecord};
use crate::error::{Result, StorageError};
use crate::naming;
use crate::types::{Event, Mode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};

type LockMap = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Moves a user folder on disk
#[async_trait::async_trait]
pub trait FolderMover: Send + Sync {
    /// Rename `from` to `to`; `to` must not exist
    async fn move_folder(&self, from: &Path, to: &Path) -> std::io::Result<()>;
}

/// [`FolderMover`] using a plain filesystem rename
#[derive(Clone, Copy, Debug, Default)]
pub struct FsFolderMover;

#[async_trait::async_trait]
impl FolderMover for FsFolderMover {
    async fn move_folder(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await
    }
}

/// Held per-user lock; the map entry goes away with the last holder or waiter
struct UserGuard<'a> {
    locks: &'a LockMap,
    uid: String,
    lock: Arc<Mutex<()>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        self.held = None;
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.uid);
        }
    }
}

/// Durable per-user record store for one platform and mode
pub struct UserStateStore {
    db: Arc<Database>,
    root: PathBuf,
    mode: Mode,
    mover: Arc<dyn FolderMover>,
    locks: LockMap,
    event_tx: broadcast::Sender<Event>,
}

impl UserStateStore {
    /// Store placing user folders directly under `root`
    pub fn new(
        db: Arc<Database>,
        root: PathBuf,
        mode: Mode,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            db,
            root,
            mode,
            mover: Arc::new(FsFolderMover),
            locks: LockMap::default(),
            event_tx,
        }
    }

    /// Replace the folder mover
    pub fn with_mover(mut self, mover: Arc<dyn FolderMover>) -> Self {
        self.mover = mover;
        self
    }

    /// Directory holding the user folders
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Underlying database
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Exclusive access to `uid`'s state until the guard is dropped
    async fn lock_user(&self, uid: &str) -> UserGuard<'_> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let mut guard = UserGuard {
            locks: &self.locks,
            uid: uid.to_string(),
            lock,
            held: None,
        };
        guard.held = Some(guard.lock.clone().lock_owned().await);
        guard
    }

    /// Users with a live lock entry
    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Existing record for `uid`, or a new one with a freshly allocated folder
    ///
    /// The folder is created on disk. Concurrent calls for the same uid return the same
    /// record; a folder name already owned by another user gets a `_{uid}` suffix.
    pub async fn get_or_create(&self, uid: &str, nickname: &str) -> Result<UserRecord> {
        let _guard = self.lock_user(uid).await;

        if let Some(record) = self.db.get_user(uid).await? {
            if record.folder().parent() == Some(self.root.as_path()) {
                create_folder(&record.folder()).await?;
                return Ok(record);
            }

            // Known user, first seen under another output directory or mode
            let folder = self.allocate_folder(uid, nickname).await?;
            create_folder(&folder).await?;
            self.db
                .update_user_folder(uid, nickname, &path_string(&folder))
                .await?;
            tracing::info!(uid, folder = %folder.display(), "Relocated user folder record");
            return self.require_user(uid).await;
        }

        for _ in 0..2 {
            let folder = self.allocate_folder(uid, nickname).await?;
            create_folder(&folder).await?;
            if self
                .db
                .insert_user_if_absent(uid, nickname, &path_string(&folder))
                .await?
            {
                tracing::info!(uid, nickname, folder = %folder.display(), "Created user folder");
                return self.require_user(uid).await;
            }
            if let Some(record) = self.db.get_user(uid).await? {
                return Ok(record);
            }
            // Folder claimed by another user in between; allocate again
        }

        Err(StorageError::FolderCollision {
            path: self.root.join(naming::folder_name(nickname, uid)),
        }
        .into())
    }

    async fn allocate_folder(&self, uid: &str, nickname: &str) -> Result<PathBuf> {
        let preferred = self.root.join(naming::folder_name(nickname, uid));
        match self.db.find_user_by_folder(&path_string(&preferred)).await? {
            Some(owner) if owner.uid != uid => Ok(self.suffixed_folder(uid, nickname)),
            _ => Ok(preferred),
        }
    }

    fn suffixed_folder(&self, uid: &str, nickname: &str) -> PathBuf {
        let base = naming::folder_name(nickname, uid);
        self.root
            .join(naming::sanitize_component(&format!("{base}_{uid}")))
    }

    async fn require_user(&self, uid: &str) -> Result<UserRecord> {
        self.db.get_user(uid).await?.ok_or_else(|| {
            crate::Error::Database(crate::DatabaseError::NotFound(format!(
                "user {} vanished after write",
                uid
            )))
        })
    }

    /// Move the user's folder when the display name no longer matches it
    ///
    /// The folder is renamed first and the record updated second. A failed rename leaves
    /// both untouched ([`StorageError::RenameFailed`]); a failed update moves the folder
    /// back. A rename onto a folder that already exists is refused
    /// ([`StorageError::FolderCollision`]).
    pub async fn rename_if_changed(
        &self,
        record: &UserRecord,
        nickname: &str,
    ) -> Result<UserRecord> {
        let _guard = self.lock_user(&record.uid).await;

        let current = match self.db.get_user(&record.uid).await? {
            Some(current) => current,
            None => record.clone(),
        };
        let from = current.folder();
        let to = self.root.join(naming::folder_name(nickname, &current.uid));

        if from == to || from == self.suffixed_folder(&current.uid, nickname) {
            if current.nickname != nickname {
                self.db.update_user_nickname(&current.uid, nickname).await?;
                return self.require_user(&current.uid).await;
            }
            return Ok(current);
        }

        let taken_by_other = matches!(
            self.db.find_user_by_folder(&path_string(&to)).await?,
            Some(ref owner) if owner.uid != current.uid
        );
        if taken_by_other || tokio::fs::try_exists(&to).await.unwrap_or(true) {
            return Err(StorageError::FolderCollision { path: to }.into());
        }

        let moved = tokio::fs::try_exists(&from).await.unwrap_or(false);
        if moved {
            self.mover.move_folder(&from, &to).await.map_err(|e| {
                StorageError::RenameFailed {
                    from: from.clone(),
                    to: to.clone(),
                    reason: e.to_string(),
                }
            })?;
        } else {
            create_folder(&to).await?;
        }

        if let Err(e) = self
            .db
            .update_user_folder(&current.uid, nickname, &path_string(&to))
            .await
        {
            if moved && let Err(rollback) = self.mover.move_folder(&to, &from).await {
                tracing::error!(
                    uid = %current.uid,
                    from = %to.display(),
                    to = %from.display(),
                    error = %rollback,
                    "Failed to roll back folder rename"
                );
            }
            return Err(e);
        }

        tracing::info!(
            uid = %current.uid,
            from = %from.display(),
            to = %to.display(),
            "Renamed user folder"
        );
        self.event_tx
            .send(Event::FolderRenamed {
                uid: current.uid.clone(),
                from,
                to,
            })
            .ok();

        self.require_user(&current.uid).await
    }

    /// Whether the item was completely downloaded for this user
    pub async fn has_item(&self, uid: &str, item_id: &str) -> Result<bool> {
        self.db.is_item_complete(uid, item_id).await
    }

    /// Record an item outcome; committed before returning
    pub async fn record_item(&self, uid: &str, item: &NewDownloadItem) -> Result<()> {
        let _guard = self.lock_user(uid).await;
        self.db.upsert_item(uid, item).await
    }

    /// Persist the listing position of an unfinished run
    pub async fn save_cursor(&self, uid: &str, cursor: &str) -> Result<()> {
        self.db.save_cursor(uid, self.mode.as_str(), cursor).await
    }

    /// Listing position saved by an interrupted run
    pub async fn cursor(&self, uid: &str) -> Result<Option<String>> {
        self.db.get_cursor(uid, self.mode.as_str()).await
    }

    /// Forget the listing position once the listing is exhausted
    pub async fn clear_cursor(&self, uid: &str) -> Result<()> {
        self.db.clear_cursor(uid, self.mode.as_str()).await
    }
}

async fn create_folder(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        StorageError::CreateFolder {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
