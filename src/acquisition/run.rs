//! Listing and single-item run loops

use super::Acquisition;
use crate::error::{Error, FetchError, Result};
use crate::fetcher::FetchRequest;
use crate::paginator::{PageCursor, PageOutcome, Paginator, StopReason};
use crate::platform::{Page, Profile};
use crate::signing::{RequestParams, SigningContext};
use crate::types::{DownloadOutcome, Event, ItemFailure, ItemMetadata, RunSummary};
use std::collections::HashSet;
use tokio::task::{JoinError, JoinSet};

type ItemResult = (String, Result<DownloadOutcome>);

impl Acquisition {
    /// Run the acquisition to completion
    ///
    /// Per-item failures are counted in the returned [`RunSummary`] and never abort the
    /// run. Signing failures and an unreachable store are run-fatal and returned as
    /// errors. Cancellation stops new work and returns the partial summary with
    /// [`StopReason::Cancelled`].
    pub async fn run(&self) -> Result<RunSummary> {
        self.emit(Event::RunStarted {
            platform: self.config.platform,
            mode: self.config.target.mode,
            url: self.config.target.url.clone(),
        });

        let result = if self.config.target.mode.is_listing() {
            self.run_listing().await
        } else {
            self.run_single().await
        };

        match result {
            Ok(summary) => {
                tracing::info!(
                    attempted = summary.attempted,
                    succeeded = summary.succeeded,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    cancelled = summary.cancelled,
                    page_failures = summary.page_failures,
                    pages = summary.pages,
                    stop_reason = ?summary.stop_reason,
                    "Run finished"
                );
                self.emit(Event::RunFinished {
                    summary: summary.clone(),
                });
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, code = e.code(), "Run aborted");
                Err(e)
            }
        }
    }

    /// Sign `params` with a fresh timestamp
    fn signed(&self, params: RequestParams) -> Result<FetchRequest> {
        let ctx = SigningContext::from_config(&self.config, chrono::Utc::now().timestamp());
        Ok(self.api.request(params, &ctx)?)
    }

    async fn run_single(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let item_id = self.target.id.clone();

        let request = self.signed(self.api.item_params(&item_id))?;
        let item = match self.fetch_item(request).await {
            Ok(item) => item,
            Err(Error::Fetch(FetchError::Cancelled)) => {
                summary.stop_reason = Some(StopReason::Cancelled);
                return Ok(summary);
            }
            Err(e) => {
                tracing::error!(item_id = %item_id, error = %e, "Failed to fetch item details");
                record_lookup_failure(&mut summary, &item_id, &e);
                return Ok(summary);
            }
        };

        summary.attempted = 1;
        let owner = item.author.clone();
        let result = self.downloads.handle(&owner, &item).await;
        if let Some(fatal) = tally(&mut summary, Ok((item.item_id.clone(), result))) {
            return Err(fatal);
        }
        if self.cancel.is_cancelled() {
            summary.stop_reason = Some(StopReason::Cancelled);
        }
        Ok(summary)
    }

    async fn fetch_item(&self, request: FetchRequest) -> Result<ItemMetadata> {
        let response = self.fetcher.fetch(request).await?;
        Ok(self.api.decode_item(&response)?)
    }

    async fn fetch_profile(&self) -> Result<Profile> {
        let request = self.signed(self.api.profile_params(&self.target))?;
        let response = self.fetcher.fetch(request).await?;
        Ok(self.api.decode_profile(&response)?)
    }

    async fn fetch_page(&self, request: FetchRequest) -> Result<Page> {
        let response = self.fetcher.fetch(request).await?;
        Ok(self.api.decode_page(&response)?)
    }

    async fn run_listing(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        // The listed user owns every folder of the run, whoever authored the items
        let profile = match self.fetch_profile().await {
            Ok(profile) => profile,
            Err(Error::Fetch(FetchError::Cancelled)) => {
                summary.stop_reason = Some(StopReason::Cancelled);
                return Ok(summary);
            }
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(user = %self.target.id, error = %e, "Failed to fetch profile");
                record_lookup_failure(&mut summary, "", &e);
                summary.stop_reason = Some(StopReason::PageFailed);
                return Ok(summary);
            }
        };
        let owner = profile.author.clone();
        tracing::info!(uid = %owner.uid, nickname = %owner.nickname, "Listing user");

        let paginator = Paginator::new(
            self.config.listing.page_counts,
            self.config.platform.max_page_size(),
            self.config.listing.max_counts,
        );
        let mut cursor = PageCursor::start();
        if self.config.listing.resume
            && let Some(token) = self.store.cursor(&owner.uid).await?
        {
            tracing::info!(uid = %owner.uid, cursor = %token, "Resuming listing");
            cursor = PageCursor::resume(token);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut tasks: JoinSet<ItemResult> = JoinSet::new();
        let mut fatal: Option<Error> = None;
        let mut stop = None;

        while let Some((request, advanced)) = paginator.next(&cursor) {
            while let Some(joined) = tasks.try_join_next() {
                if let Some(e) = tally(&mut summary, joined) {
                    fatal.get_or_insert(e);
                }
            }
            if fatal.is_some() {
                break;
            }
            if self.cancel.is_cancelled() {
                stop = Some(StopReason::Cancelled);
                break;
            }

            let page_request = match self.signed(self.api.page_params(
                self.config.target.mode,
                &profile,
                &request,
            )) {
                Ok(page_request) => page_request,
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            };

            let page = match self.fetch_page(page_request).await {
                Ok(page) => page,
                Err(Error::Fetch(FetchError::Cancelled)) => {
                    stop = Some(StopReason::Cancelled);
                    break;
                }
                Err(e) => {
                    tracing::error!(page = request.page, error = %e, "Failed to fetch listing page");
                    record_lookup_failure(&mut summary, "", &e);
                    stop = Some(StopReason::PageFailed);
                    break;
                }
            };
            summary.pages += 1;

            let fetched = page.items.len();
            let fresh: Vec<ItemMetadata> = page
                .items
                .into_iter()
                .filter(|item| seen.insert(item.item_id.clone()))
                .collect();
            let step = paginator.accept(
                advanced,
                &PageOutcome {
                    next_token: page.next_cursor,
                    has_more: page.has_more,
                    fetched,
                    new_items: fresh.len(),
                },
            );

            tracing::debug!(
                page = request.page,
                fetched,
                new_items = fresh.len(),
                take = step.take,
                has_more = page.has_more,
                "Listing page decoded"
            );
            self.emit(Event::PageFetched {
                page: request.page,
                items: fetched,
                new_items: fresh.len(),
                has_more: page.has_more,
            });

            for item in fresh.into_iter().take(step.take) {
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    permit = self.task_limit.clone().acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    stop = Some(StopReason::Cancelled);
                    break;
                };

                summary.attempted += 1;
                let downloads = self.downloads.clone();
                let owner = owner.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let result = downloads.handle(&owner, &item).await;
                    (item.item_id, result)
                });
            }
            if stop.is_some() {
                break;
            }

            // Resume restarts from the page just listed; dedup skips what completed
            let saved = if step.stop == Some(StopReason::Exhausted) {
                self.store.clear_cursor(&owner.uid).await
            } else if let Some(token) = &request.cursor {
                self.store.save_cursor(&owner.uid, token).await
            } else {
                Ok(())
            };
            if let Err(e) = saved {
                fatal = Some(e);
                break;
            }

            cursor = step.cursor;
            if let Some(reason) = step.stop {
                stop = Some(reason);
                break;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Some(e) = tally(&mut summary, joined) {
                fatal.get_or_insert(e);
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        if self.cancel.is_cancelled() {
            stop = Some(StopReason::Cancelled);
        }
        summary.stop_reason = stop;
        Ok(summary)
    }
}

fn failure(item_id: &str, error: &Error) -> ItemFailure {
    ItemFailure {
        item_id: item_id.to_string(),
        code: error.code().to_string(),
        error: error.to_string(),
    }
}

fn record_failure(summary: &mut RunSummary, item_id: &str, error: &Error) {
    summary.failed += 1;
    summary.failures.push(failure(item_id, error));
}

/// A lookup that failed before any item reached the pipeline
fn record_lookup_failure(summary: &mut RunSummary, item_id: &str, error: &Error) {
    summary.page_failures += 1;
    summary.failures.push(failure(item_id, error));
}

/// Count one finished item; returns the error when it must abort the run
fn tally(
    summary: &mut RunSummary,
    joined: std::result::Result<ItemResult, JoinError>,
) -> Option<Error> {
    match joined {
        Ok((_, Ok(DownloadOutcome::Downloaded { .. }))) => summary.succeeded += 1,
        Ok((_, Ok(DownloadOutcome::Skipped))) => summary.skipped += 1,
        Ok((_, Err(Error::Cancelled))) => summary.cancelled += 1,
        Ok((item_id, Err(e))) => {
            record_failure(summary, &item_id, &e);
            if e.is_run_fatal() {
                return Some(e);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Item task panicked");
            summary.failed += 1;
            summary.failures.push(ItemFailure {
                item_id: String::new(),
                code: "task_failed".to_string(),
                error: e.to_string(),
            });
        }
    }
    None
}
