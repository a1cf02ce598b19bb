//! Change-feed poller
//!
//! Walks the NSoT change feed newest-first and drops cached assets whose
//! device changed remotely.
//!
//! The feed only offers forward pagination through an opaque `next` link and
//! cannot be filtered by id. When changes arrive faster than they are
//! drained, records already seen on page 1 get pushed onto page 2 while newer
//! ones take their place, so a later page can carry ids above the first
//! page's head. The checkpoint is therefore only ever advanced to the id of
//! the first record read in a cycle: newer changes may be rescanned next
//! cycle, but none are skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use assetlens_client::{GatewayError, RemoteGateway};

use crate::cache::CacheStore;

/// Summary of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Pages fetched
    pub pages: usize,
    /// Records newer than the checkpoint
    pub scanned: usize,
    /// IPs collected for invalidation, in feed order
    pub invalidated: Vec<String>,
    /// Cached assets actually dropped
    pub removed: usize,
    /// Checkpoint after the cycle
    pub checkpoint: i64,
    /// False if a fetch failed and the walk ended early
    pub completed: bool,
}

/// Periodic change-feed walker
#[derive(Clone)]
pub struct ChangePoller {
    gateway: Arc<dyn RemoteGateway>,
    cache: Arc<CacheStore>,
    page_size: usize,
    /// Held for a whole cycle so cycles never overlap
    cycle: Arc<Mutex<()>>,
}

impl ChangePoller {
    /// Create a poller fetching `page_size` changes per page
    pub fn new(gateway: Arc<dyn RemoteGateway>, cache: Arc<CacheStore>, page_size: usize) -> Self {
        Self {
            gateway,
            cache,
            page_size,
            cycle: Arc::new(Mutex::new(())),
        }
    }

    /// Set the checkpoint to the newest change id so history is not rescanned
    ///
    /// # Errors
    /// Returns an error if the change feed cannot be fetched.
    #[instrument(skip(self))]
    pub async fn prime(&self) -> Result<i64, GatewayError> {
        let url = self.gateway.first_changes_url(1)?;
        let page = self.gateway.fetch_changes_page(&url).await?;

        let newest = if page.count > 0 {
            page.head_id().unwrap_or(0)
        } else {
            0
        };
        let checkpoint = self.cache.advance_checkpoint(newest).await;

        info!(checkpoint, "change feed checkpoint primed");
        Ok(checkpoint)
    }

    /// Run a single poll cycle
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> PollOutcome {
        let _cycle = self.cycle.lock().await;
        let checkpoint = self.cache.checkpoint().await;
        let mut outcome = PollOutcome {
            completed: true,
            ..PollOutcome::default()
        };
        let mut head_id = None;

        let mut url = match self.gateway.first_changes_url(self.page_size) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build change feed url");
                outcome.completed = false;
                outcome.checkpoint = checkpoint;
                return outcome;
            }
        };

        'walk: loop {
            let page = match self.gateway.fetch_changes_page(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, pages = outcome.pages, "change feed fetch failed");
                    outcome.completed = false;
                    break;
                }
            };
            outcome.pages += 1;

            if page.count == 0 {
                break;
            }

            for record in &page.results {
                if head_id.is_none() {
                    head_id = Some(record.id);
                }
                if record.id <= checkpoint {
                    break 'walk;
                }

                outcome.scanned += 1;
                if !record.is_device() {
                    continue;
                }
                if let Some(ip) = record.ip_address() {
                    outcome.invalidated.push(ip.to_string());
                }
            }

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        // a failed walk keeps the old checkpoint so the next cycle rescans
        let head_id = if outcome.completed { head_id } else { None };
        let applied = self
            .cache
            .apply_invalidations(head_id, &outcome.invalidated)
            .await;

        outcome.removed = applied.removed;
        outcome.checkpoint = applied.checkpoint;

        debug!(
            pages = outcome.pages,
            scanned = outcome.scanned,
            removed = outcome.removed,
            checkpoint = outcome.checkpoint,
            "poll cycle finished"
        );

        outcome
    }

    /// Run poll cycles every `period` on a background task
    ///
    /// The first cycle runs one period after spawning. Ticks missed while a
    /// cycle is running are skipped, so cycles never overlap.
    #[must_use]
    pub fn spawn(self, period: Duration) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;

            info!(period = ?period, "change poller started");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.changed() => break,
                            outcome = self.poll_once() => {
                                if outcome.removed > 0 {
                                    info!(
                                        removed = outcome.removed,
                                        checkpoint = outcome.checkpoint,
                                        "invalidated cached assets"
                                    );
                                }
                            }
                        }
                    }
                }
            }

            info!("change poller stopped");
        });

        PollerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running [`ChangePoller`] task
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the poller, cancelling an in-flight cycle, and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "change poller task failed");
        }
    }

    /// Whether the background task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
