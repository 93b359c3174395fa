//! Utility functions for file operations and URL handling

use crate::error::{Result, StorageError};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Suffix of in-progress files
pub const PART_SUFFIX: &str = ".part";

/// Path of the temporary file used while writing `path`
///
/// # Examples
///
/// ```
/// use social_dl::utils::part_path;
/// use std::path::Path;
///
/// assert_eq!(part_path(Path::new("/d/a.mp4")), Path::new("/d/a.mp4.part"));
/// ```
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Write `bytes` to `path` without ever exposing a partial file at `path`
///
/// Data goes to `<path>.part`, is flushed to disk, then renamed into place. On failure the
/// temporary file is removed and nothing is left at `path`.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = part_path(path);

    let written = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await
            && cleanup.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %tmp.display(), error = %cleanup, "Failed to remove partial file");
        }
        return Err(StorageError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into());
    }

    Ok(())
}

/// File extension carried by the last URL path segment, if it looks like one
///
/// Only short alphanumeric extensions are accepted so CDN path noise is ignored.
///
/// # Examples
///
/// ```
/// use social_dl::utils::extension_from_url;
///
/// assert_eq!(extension_from_url("https://cdn.example/a/b/photo.webp?x=1"), Some("webp".to_string()));
/// assert_eq!(extension_from_url("https://cdn.example/play/?video_id=1"), None);
/// ```
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last_segment).ok()?;
    let extension = Path::new(decoded.as_ref()).extension()?.to_str()?;

    if (1..=5).contains(&extension.len()) && extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(extension.to_ascii_lowercase())
    } else {
        None
    }
}

/// Value of cookie `name` in a `k=v; k2=v2` cookie string
///
/// # Examples
///
/// ```
/// use social_dl::utils::cookie_value;
///
/// assert_eq!(cookie_value("a=1; ct0=abc; b=2", "ct0"), Some("abc"));
/// assert_eq!(cookie_value("a=1", "ct0"), None);
/// ```
pub fn cookie_value<'a>(cookie: &'a str, name: &str) -> Option<&'a str> {
    cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
