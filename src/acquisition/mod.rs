//! Run orchestration split into focused submodules.
//!
//! The `Acquisition` struct wires configuration, fetcher, store and download pipeline
//! together; its methods are organized by domain:
//! - [`run`] - Listing and single-item run loops, summary accounting

mod run;


use crate::config::Config;
use crate::db::Database;
use crate::download::DownloadManager;
use crate::error::Result;
use crate::fetcher::{FetchStats, Fetcher, HttpTransport, ReqwestTransport};
use crate::platform::{PlatformApi, Target};
use crate::store::UserStateStore;
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// One configured acquisition (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Acquisition {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Parsed target link
    pub(crate) target: Target,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Endpoint descriptions and decoders for the configured platform
    pub(crate) api: Arc<PlatformApi>,
    /// Shared HTTP executor bounded by `max_connections`
    pub(crate) fetcher: Arc<Fetcher>,
    /// Per-user state, sole writer of the database
    pub(crate) store: Arc<UserStateStore>,
    /// Item pipeline
    pub(crate) downloads: Arc<DownloadManager>,
    /// Semaphore bounding concurrent item pipelines (`max_tasks`)
    pub(crate) task_limit: Arc<Semaphore>,
    /// Run-wide cancellation
    pub(crate) cancel: CancellationToken,
}

impl Acquisition {
    /// Create a new acquisition for `config`
    ///
    /// This validates the configuration and the target link, opens (and migrates) the
    /// platform database and builds the HTTP client. No request is sent.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.network)?;
        Self::with_transport(config, Arc::new(transport)).await
    }

    /// Create an acquisition that sends its requests through `transport`
    pub async fn with_transport(config: Config, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        let target = Target::parse(config.platform, config.target.mode, &config.target.url)?;

        let db = Database::new(&config.database_path()).await?;

        // Broadcast channel with a 1000-event buffer per subscriber
        let (event_tx, _rx) = broadcast::channel(1000);
        let cancel = CancellationToken::new();

        let config = Arc::new(config);
        let fetcher = Arc::new(Fetcher::new(transport, &config.network, cancel.clone()));
        let store = Arc::new(UserStateStore::new(
            Arc::new(db),
            config.output_dir(),
            config.target.mode,
            event_tx.clone(),
        ));
        let api = Arc::new(PlatformApi::new(&config));
        let downloads = Arc::new(DownloadManager::new(
            config.clone(),
            api.clone(),
            fetcher.clone(),
            store.clone(),
            event_tx.clone(),
        ));

        tracing::info!(
            platform = %config.platform,
            mode = %config.target.mode,
            target = %target.id,
            "Acquisition ready"
        );

        Ok(Self {
            task_limit: Arc::new(Semaphore::new(config.network.max_tasks.max(1))),
            config,
            target,
            event_tx,
            api,
            fetcher,
            store,
            downloads,
            cancel,
        })
    }

    /// Subscribe to run events
    ///
    /// Each subscriber receives every event sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that cancels the run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop submitting new work and abort in-flight requests
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Parsed target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Fetcher counters (requests, retries, concurrency peak)
    pub fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    /// Per-user state store
    pub fn store(&self) -> &Arc<UserStateStore> {
        &self.store
    }

    /// Platform database
    pub fn database(&self) -> &Arc<Database> {
        self.store.database()
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
