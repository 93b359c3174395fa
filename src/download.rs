//! Item download pipeline
//!
//! [`DownloadManager::handle`] takes one decoded item from dedup check to recorded outcome:
//! resolve the owner's folder, render the file stem, skip items already complete, fetch and
//! atomically write each media file, then record the item.
//!
//! A stem is claimed before any file is written. When another item already owns it, on disk
//! or in flight, the item id is appended so no item ever replaces another item's files.

use crate::config::Config;
use crate::db::NewDownloadItem;
use crate::error::{Error, FetchError, Result, StorageError};
use crate::fetcher::Fetcher;
use crate::naming;
use crate::platform::PlatformApi;
use crate::store::UserStateStore;
use crate::types::{Author, DownloadOutcome, Event, ItemMetadata, ItemStatus, MediaKind};
use crate::utils::{extension_from_url, write_atomically};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Files written for one item
struct Written {
    files: Vec<PathBuf>,
    bytes: u64,
    sha256: String,
}

/// Downloads items into the per-user folder layout
pub struct DownloadManager {
    config: Arc<Config>,
    api: Arc<PlatformApi>,
    fetcher: Arc<Fetcher>,
    store: Arc<UserStateStore>,
    event_tx: broadcast::Sender<Event>,
    claimed: Mutex<HashSet<PathBuf>>,
}

/// A file stem reserved in one folder until dropped
struct StemClaim<'a> {
    claimed: &'a Mutex<HashSet<PathBuf>>,
    key: PathBuf,
    stem: String,
}

impl Drop for StemClaim<'_> {
    fn drop(&mut self) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl DownloadManager {
    /// Build a manager sharing the run's fetcher and store
    pub fn new(
        config: Arc<Config>,
        api: Arc<PlatformApi>,
        fetcher: Arc<Fetcher>,
        store: Arc<UserStateStore>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            config,
            api,
            fetcher,
            store,
            event_tx,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Download `item` on behalf of `owner`, the user whose folder receives it
    ///
    /// Returns [`DownloadOutcome::Skipped`] when the item is already recorded as complete.
    /// A failed item is recorded as failed so a later run retries it.
    pub async fn handle(&self, owner: &Author, item: &ItemMetadata) -> Result<DownloadOutcome> {
        let folder = self.resolve_folder(owner).await?;
        let stem = naming::render(&self.config.output.naming, self.config.platform, item);

        if self.store.has_item(&owner.uid, &item.item_id).await? {
            tracing::debug!(item_id = %item.item_id, "Item already downloaded, skipping");
            self.event_tx
                .send(Event::ItemSkipped {
                    item_id: item.item_id.clone(),
                })
                .ok();
            return Ok(DownloadOutcome::Skipped);
        }

        let claim = self.claim_stem(&folder, stem, item);
        let stem = claim.stem.clone();
        let written = if item.media.is_empty() {
            Err(FetchError::Decode {
                url: self.config.target.url.clone(),
                reason: format!("item {} has no downloadable media", item.item_id),
            }
            .into())
        } else {
            self.write_item(&folder, &stem, item).await
        };

        match written {
            Ok(written) => {
                self.store
                    .record_item(
                        &owner.uid,
                        &NewDownloadItem {
                            item_id: item.item_id.clone(),
                            media_urls: media_urls(item),
                            file_name: stem,
                            sha256: Some(written.sha256),
                            size_bytes: written.bytes,
                            status: ItemStatus::Complete,
                            error_message: None,
                        },
                    )
                    .await?;

                tracing::info!(
                    item_id = %item.item_id,
                    files = written.files.len(),
                    bytes = written.bytes,
                    "Item downloaded"
                );
                self.event_tx
                    .send(Event::ItemDownloaded {
                        item_id: item.item_id.clone(),
                        files: written.files.clone(),
                        bytes: written.bytes,
                    })
                    .ok();

                Ok(DownloadOutcome::Downloaded {
                    files: written.files,
                    bytes: written.bytes,
                })
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(Error::Fetch(FetchError::Cancelled)) => Err(Error::Cancelled),
            Err(e) => {
                tracing::error!(item_id = %item.item_id, error = %e, "Item download failed");

                let failed = NewDownloadItem {
                    item_id: item.item_id.clone(),
                    media_urls: media_urls(item),
                    file_name: stem,
                    sha256: None,
                    size_bytes: 0,
                    status: ItemStatus::Failed,
                    error_message: Some(e.to_string()),
                };
                if let Err(record_err) = self.store.record_item(&owner.uid, &failed).await {
                    tracing::error!(
                        item_id = %item.item_id,
                        error = %record_err,
                        "Failed to record item failure"
                    );
                }

                self.event_tx
                    .send(Event::ItemFailed {
                        item_id: item.item_id.clone(),
                        error: e.to_string(),
                    })
                    .ok();
                Err(e)
            }
        }
    }

    /// Folder receiving `owner`'s files
    async fn resolve_folder(&self, owner: &Author) -> Result<PathBuf> {
        if !self.config.output.folderize {
            let root = self.store.root().to_path_buf();
            tokio::fs::create_dir_all(&root)
                .await
                .map_err(|e| StorageError::CreateFolder {
                    path: root.clone(),
                    reason: e.to_string(),
                })?;
            return Ok(root);
        }

        let record = self.store.get_or_create(&owner.uid, &owner.nickname).await?;
        if owner.nickname.trim().is_empty() || owner.nickname == record.nickname {
            return Ok(record.folder());
        }

        match self.store.rename_if_changed(&record, &owner.nickname).await {
            Ok(renamed) => Ok(renamed.folder()),
            // The item still lands in the current folder
            Err(Error::Storage(
                e @ (StorageError::RenameFailed { .. } | StorageError::FolderCollision { .. }),
            )) => {
                tracing::warn!(uid = %owner.uid, error = %e, "Keeping user folder after failed rename");
                Ok(record.folder())
            }
            Err(e) => Err(e),
        }
    }

    /// Reserve `stem` in `folder`, or `{stem}_{item_id}` when another item holds it
    fn claim_stem(&self, folder: &Path, stem: String, item: &ItemMetadata) -> StemClaim<'_> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        let taken = claimed.contains(&folder.join(&stem))
            || self
                .planned_files(folder, &stem, item)
                .iter()
                .any(|path| path.exists());

        let stem = if taken {
            let unique = naming::sanitize_component(&format!("{}_{}", stem, item.item_id));
            tracing::debug!(
                item_id = %item.item_id,
                stem = %unique,
                "File name taken by another item, appending item id"
            );
            unique
        } else {
            stem
        };

        let key = folder.join(&stem);
        claimed.insert(key.clone());
        StemClaim {
            claimed: &self.claimed,
            key,
            stem,
        }
    }

    /// Every path the item writes under `stem`
    fn planned_files(&self, folder: &Path, stem: &str, item: &ItemMetadata) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = file_names(stem, item)
            .into_iter()
            .map(|name| folder.join(name))
            .collect();
        if self.config.output.write_desc {
            paths.push(folder.join(desc_name(stem)));
        }
        paths
    }

    async fn write_item(&self, folder: &Path, stem: &str, item: &ItemMetadata) -> Result<Written> {
        let mut written = Written {
            files: Vec::with_capacity(item.media.len()),
            bytes: 0,
            sha256: String::new(),
        };

        match self.write_files(folder, stem, item, &mut written).await {
            Ok(()) => Ok(written),
            Err(e) => {
                // Leave nothing behind under a name this item may not get again
                for path in &written.files {
                    if let Err(remove_err) = tokio::fs::remove_file(path).await {
                        tracing::warn!(
                            path = %path.display(),
                            error = %remove_err,
                            "Failed to remove file of failed item"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn write_files(
        &self,
        folder: &Path,
        stem: &str,
        item: &ItemMetadata,
        written: &mut Written,
    ) -> Result<()> {
        let mut hasher = Sha256::new();

        for (media, name) in item.media.iter().zip(file_names(stem, item)) {
            let response = self.fetcher.fetch(self.api.media_request(&media.url)).await?;
            let path = folder.join(name);

            write_atomically(&path, &response.body).await?;
            hasher.update(&response.body);
            written.bytes += response.body.len() as u64;
            written.files.push(path);
        }

        if self.config.output.write_desc {
            let path = folder.join(desc_name(stem));
            write_atomically(&path, item.desc.as_bytes()).await?;
        }

        written.sha256 = format!("{:x}", hasher.finalize());
        Ok(())
    }
}

/// Media file names: `{stem}.{ext}` for one file, `{stem}_{kind}_{n}.{ext}` otherwise
fn file_names(stem: &str, item: &ItemMetadata) -> Vec<String> {
    let multi = item.media.len() > 1;
    let mut index = [0usize; 3];

    item.media
        .iter()
        .map(|media| {
            let extension = extension_from_url(&media.url)
                .unwrap_or_else(|| media.kind.default_extension().to_string());
            if multi {
                let n = &mut index[kind_slot(media.kind)];
                *n += 1;
                format!("{}_{}_{}.{}", stem, media.kind.as_str(), n, extension)
            } else {
                format!("{}.{}", stem, extension)
            }
        })
        .collect()
}

fn desc_name(stem: &str) -> String {
    format!("{}_desc.txt", stem)
}

fn kind_slot(kind: MediaKind) -> usize {
    match kind {
        MediaKind::Video => 0,
        MediaKind::Image => 1,
        MediaKind::Audio => 2,
    }
}

fn media_urls(item: &ItemMetadata) -> Vec<String> {
    item.media.iter().map(|m| m.url.clone()).collect()
}
