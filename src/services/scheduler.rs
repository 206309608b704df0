// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic sync scheduler.
//!
//! Every `interval` (measured start to start) the scheduler takes a snapshot
//! of all user ids and queues one job per user on a bounded queue. A fixed
//! pool of workers drains the queue and reports each outcome on a
//! completion channel. A collector turns those reports into a
//! [`CycleSummary`] per cycle.
//!
//! The dispatch loop never waits for fetches to finish; a full queue only
//! delays the next enqueue.

use crate::db::SharedStore;
use crate::services::stats::{FetchOutcome, StatsFetcher};
use crate::time_utils::format_utc_rfc3339;
use futures_util::FutureExt;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Sizing and timing for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Time between the starts of consecutive cycles
    pub interval: Duration,
    /// Number of concurrent fetch workers
    pub workers: usize,
    /// Maximum queued jobs before dispatch waits
    pub queue_capacity: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            interval: Duration::from_secs(config.sync_interval_secs),
            workers: config.sync_workers,
            queue_capacity: config.sync_queue_capacity,
        }
    }
}

/// Result of one completed sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub started_at: String,
    pub dispatched: usize,
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the user list could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Latest completed cycle, if any.
pub type SyncStatus = watch::Receiver<Option<CycleSummary>>;

#[derive(Debug)]
struct SyncJob {
    cycle: u64,
    athlete_id: u64,
}

#[derive(Debug, Clone, Copy)]
enum JobResult {
    Stored,
    Skipped,
    Failed,
}

#[derive(Debug)]
enum PoolEvent {
    /// All jobs for `cycle` are queued.
    Dispatched {
        cycle: u64,
        started_at: String,
        dispatched: usize,
        error: Option<String>,
    },
    Finished {
        cycle: u64,
        result: JobResult,
    },
}

#[derive(Debug, Default)]
struct CycleProgress {
    started_at: String,
    dispatched: Option<usize>,
    stored: usize,
    skipped: usize,
    failed: usize,
    error: Option<String>,
}

impl CycleProgress {
    fn is_complete(&self) -> bool {
        self.dispatched
            .is_some_and(|n| self.stored + self.skipped + self.failed >= n)
    }

    fn into_summary(self, cycle: u64) -> CycleSummary {
        CycleSummary {
            cycle,
            started_at: self.started_at,
            dispatched: self.dispatched.unwrap_or_default(),
            stored: self.stored,
            skipped: self.skipped,
            failed: self.failed,
            error: self.error,
        }
    }
}

/// Background sync of every known user.
pub struct SyncScheduler {
    store: SharedStore,
    fetcher: StatsFetcher,
    settings: SchedulerSettings,
}

impl SyncScheduler {
    pub fn new(store: SharedStore, fetcher: StatsFetcher, settings: SchedulerSettings) -> Self {
        Self {
            store,
            fetcher,
            settings,
        }
    }

    /// Spawn the worker pool, the collector and the dispatch loop.
    ///
    /// The first cycle starts immediately.
    pub fn start(self) -> SchedulerHandle {
        let workers = self.settings.workers.max(1);
        let interval = if self.settings.interval.is_zero() {
            tracing::warn!("Zero sync interval, using the default");
            Duration::from_secs(crate::config::DEFAULT_SYNC_INTERVAL_SECS)
        } else {
            self.settings.interval
        };
        let (job_tx, job_rx) = mpsc::channel::<SyncJob>(self.settings.queue_capacity.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel::<PoolEvent>();
        let (summary_tx, summary_rx) = watch::channel(None);

        let job_rx = Arc::new(Mutex::new(job_rx));
        for worker_id in 0..workers {
            tokio::spawn(run_worker(
                worker_id,
                job_rx.clone(),
                self.fetcher.clone(),
                event_tx.clone(),
            ));
        }

        tokio::spawn(collect_results(event_rx, summary_tx));

        let loop_task = tokio::spawn(run_loop(
            self.store,
            interval,
            job_tx,
            event_tx,
        ));

        tracing::info!(
            interval_secs = interval.as_secs(),
            workers,
            "Sync scheduler started"
        );

        SchedulerHandle {
            summaries: summary_rx,
            loop_task,
        }
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    summaries: SyncStatus,
    loop_task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Receiver for cycle summaries (for `/health`).
    pub fn subscribe(&self) -> SyncStatus {
        self.summaries.clone()
    }

    /// Most recently completed cycle.
    pub fn last_cycle(&self) -> Option<CycleSummary> {
        self.summaries.borrow().clone()
    }

    /// Wait until cycle `cycle` (or a later one) has completed.
    ///
    /// Returns `None` if the scheduler stopped first.
    pub async fn wait_for_cycle(&self, cycle: u64) -> Option<CycleSummary> {
        let mut summaries = self.summaries.clone();
        let done = summaries
            .wait_for(|s| s.as_ref().is_some_and(|s| s.cycle >= cycle))
            .await
            .ok()?;
        (*done).clone()
    }

    /// Stop dispatching. Queued jobs still run; workers exit once the queue
    /// is empty.
    ///
    /// A cycle cut short mid-dispatch never publishes a summary; the
    /// collector logs and discards it once the workers are gone.
    pub fn shutdown(&self) {
        self.loop_task.abort();
        tracing::info!("Sync scheduler stopped");
    }
}

async fn run_loop(
    store: SharedStore,
    interval: Duration,
    jobs: mpsc::Sender<SyncJob>,
    events: mpsc::UnboundedSender<PoolEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycle = 0u64;
    loop {
        ticker.tick().await;
        cycle += 1;
        dispatch_cycle(cycle, &store, &jobs, &events).await;
    }
}

/// Queue one job per distinct user id in the current snapshot.
async fn dispatch_cycle(
    cycle: u64,
    store: &SharedStore,
    jobs: &mpsc::Sender<SyncJob>,
    events: &mpsc::UnboundedSender<PoolEvent>,
) {
    let started_at = format_utc_rfc3339(chrono::Utc::now());

    let users = match store.list_users().await {
        Ok(users) => users,
        Err(e) => {
            tracing::error!(cycle, error = %e, "Failed to enumerate users, skipping cycle");
            let _ = events.send(PoolEvent::Dispatched {
                cycle,
                started_at,
                dispatched: 0,
                error: Some(e.to_string()),
            });
            return;
        }
    };

    let mut seen = HashSet::with_capacity(users.len());
    let mut dispatched = 0usize;
    for user in users {
        if !seen.insert(user.id) {
            continue;
        }
        let job = SyncJob {
            cycle,
            athlete_id: user.id,
        };
        if jobs.send(job).await.is_err() {
            tracing::warn!(cycle, "Job queue closed, stopping dispatch");
            break;
        }
        dispatched += 1;
    }

    tracing::info!(cycle, dispatched, "Sync cycle dispatched");

    let _ = events.send(PoolEvent::Dispatched {
        cycle,
        started_at,
        dispatched,
        error: None,
    });
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<SyncJob>>>,
    fetcher: StatsFetcher,
    events: mpsc::UnboundedSender<PoolEvent>,
) {
    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };
        let athlete_id = job.athlete_id;

        let result = match AssertUnwindSafe(fetcher.fetch_and_store(athlete_id))
            .catch_unwind()
            .await
        {
            Ok(Ok(FetchOutcome::Stored)) => JobResult::Stored,
            Ok(Ok(FetchOutcome::Skipped(reason))) => {
                tracing::info!(athlete_id, ?reason, "Skipped user");
                JobResult::Skipped
            }
            Ok(Err(e)) => {
                tracing::warn!(athlete_id, error = %e, "Stats sync failed");
                JobResult::Failed
            }
            Err(_) => {
                tracing::error!(athlete_id, worker_id, "Stats sync panicked");
                JobResult::Failed
            }
        };

        if events
            .send(PoolEvent::Finished {
                cycle: job.cycle,
                result,
            })
            .is_err()
        {
            break;
        }
    }

    tracing::debug!(worker_id, "Sync worker exiting");
}

/// Runs until every event sender is gone and returns the number of cycles
/// that never completed.
async fn collect_results(
    mut events: mpsc::UnboundedReceiver<PoolEvent>,
    summaries: watch::Sender<Option<CycleSummary>>,
) -> usize {
    let mut cycles: HashMap<u64, CycleProgress> = HashMap::new();

    while let Some(event) = events.recv().await {
        let cycle = match event {
            PoolEvent::Dispatched {
                cycle,
                started_at,
                dispatched,
                error,
            } => {
                let progress = cycles.entry(cycle).or_default();
                progress.started_at = started_at;
                progress.dispatched = Some(dispatched);
                progress.error = error;
                cycle
            }
            PoolEvent::Finished { cycle, result } => {
                let progress = cycles.entry(cycle).or_default();
                match result {
                    JobResult::Stored => progress.stored += 1,
                    JobResult::Skipped => progress.skipped += 1,
                    JobResult::Failed => progress.failed += 1,
                }
                cycle
            }
        };

        if !cycles.get(&cycle).is_some_and(CycleProgress::is_complete) {
            continue;
        }
        if let Some(progress) = cycles.remove(&cycle) {
            let summary = progress.into_summary(cycle);
            tracing::info!(
                cycle,
                dispatched = summary.dispatched,
                stored = summary.stored,
                skipped = summary.skipped,
                failed = summary.failed,
                "Sync cycle complete"
            );
            summaries.send_replace(Some(summary));
        }
    }

    let mut abandoned: Vec<u64> = cycles.into_keys().collect();
    abandoned.sort_unstable();
    if !abandoned.is_empty() {
        tracing::warn!(?abandoned, "Scheduler stopped with incomplete sync cycles");
    }
    abandoned.len()
}
