//! # social-dl
//!
//! Acquisition core for downloading posts, media and metadata from social platforms
//! (Douyin, TikTok, Weibo, Twitter/X).
//!
//! ## Design Philosophy
//!
//! social-dl is designed to be:
//! - **Idempotent** - Every downloaded item is recorded per user; repeated runs skip it
//! - **Bounded** - Item pipelines and HTTP exchanges have independent concurrency ceilings
//! - **Library-first** - No CLI; callers hand over a resolved [`Config`]
//! - **Event-driven** - Consumers subscribe to [`Event`]s, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use social_dl::{Acquisition, Config, Mode, Platform};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.platform = Platform::Douyin;
//!     config.target.url = "https://www.douyin.com/user/MS4wLjABAAAA".to_string();
//!     config.target.mode = Mode::Post;
//!     config.network.cookie = Some("sessionid=...".to_string());
//!
//!     let acquisition = Acquisition::new(config).await?;
//!
//!     let mut events = acquisition.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = acquisition.run().await?;
//!     println!("{} downloaded, {} skipped", summary.succeeded, summary.skipped);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Run orchestration
pub mod acquisition;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Item download pipeline
pub mod download;
/// Error types
pub mod error;
/// Concurrency-bounded HTTP execution
pub mod fetcher;
/// File naming templates and sanitization
pub mod naming;
/// Cursor-based pagination policy
pub mod paginator;
/// Platform endpoints, targets and response decoding
pub mod platform;
/// Retry logic with exponential backoff
pub mod retry;
/// Per-platform request signing
pub mod signing;
/// Per-user state: folders, dedup records, cursors
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use acquisition::Acquisition;
pub use config::Config;
pub use db::Database;
pub use error::{DatabaseError, Error, FetchError, Result, SigningError, StorageError};
pub use types::{DownloadOutcome, Event, ItemMetadata, Mode, Platform, RunSummary};

use tokio_util::sync::CancellationToken;

/// Run an acquisition, cancelling it when a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Cancellation stops new work immediately; in-flight items drain within the
/// configured request timeout and partial files never reach their final paths.
///
/// # Example
///
/// ```no_run
/// use social_dl::{Acquisition, Config, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let acquisition = Acquisition::new(Config::default()).await?;
///     let summary = run_until_signal(&acquisition).await?;
///     println!("{summary:?}");
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(acquisition: &Acquisition) -> Result<RunSummary> {
    let watcher = cancel_on_signal(acquisition.cancellation_token());
    let result = acquisition.run().await;
    watcher.abort();
    result
}

/// Spawn a task that cancels `token` on the first termination signal.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("Cancelling run after termination signal");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
