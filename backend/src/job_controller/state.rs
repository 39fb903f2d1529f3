//! Applies progress reports from transfer workers in the background.
//!
//! Workers report fire-and-forget: the HTTP handler (see
//! `services/associations/progress.rs`) only pushes the report onto a channel and
//! answers `202 Accepted`. The updater task drains the channel and applies each
//! report through `AssociationStore::record_progress`, off the async runtime.
//!
//! The main components are:
//! - `ReportQueue`: a clonable handle holding the sending side of the channel.
//!   It is injected into the Actix application state in `main.rs`.
//! - `start_report_updater`: the long-running task that owns the receiving side.
//!   It fans reports out to a fixed number of lanes. All reports for one
//!   (pool, template) pair land on the same lane and are applied in arrival
//!   order, while different pairs proceed in parallel.
//!
//! A report that hits a transient storage failure (for example the database
//! lock outlasting the busy timeout) is retried with backoff on its lane. It
//! has already been acknowledged to the worker, so dropping it would lose it.

use crate::store::{AssociationStore, StoreError};
use common::jobs::{ProgressOutcome, ProgressReport};
use log::{debug, error, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Reports buffered per lane before the dispatcher waits on it.
const LANE_CAPACITY: usize = 32;
/// Attempts per report, the first one included.
const MAX_ATTEMPTS: u32 = 6;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Sending side of the progress report channel.
#[derive(Clone)]
pub struct ReportQueue {
    pub tx: mpsc::Sender<ProgressReport>,
}

impl ReportQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressReport>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queues a report. Fails only once the updater has stopped.
    pub async fn submit(&self, report: ProgressReport) -> Result<(), String> {
        self.tx
            .send(report)
            .await
            .map_err(|_| "progress updater is not running".to_string())
    }
}

/// Starts the progress updater with `lanes` concurrent appliers (at least one).
///
/// Spawned once as a long-running task (see `main.rs`). It returns when every
/// `ReportQueue` has been dropped and all queued reports have been applied or
/// given up on.
///
/// # Arguments
/// * `store` - The store reports are written to.
/// * `rx` - Receiving side of the channel created by `ReportQueue::new`.
/// * `lanes` - How many reports may be applied at the same time.
pub async fn start_report_updater(
    store: AssociationStore,
    mut rx: mpsc::Receiver<ProgressReport>,
    lanes: usize,
) {
    let lanes = lanes.max(1);
    let mut senders = Vec::with_capacity(lanes);
    let mut appliers = JoinSet::new();
    for _ in 0..lanes {
        let (tx, lane_rx) = mpsc::channel(LANE_CAPACITY);
        senders.push(tx);
        appliers.spawn(run_lane(store.clone(), lane_rx));
    }

    while let Some(report) = rx.recv().await {
        let lane = lane_for(report.pool_id, report.template_id, lanes);
        if senders[lane].send(report).await.is_err() {
            error!("Report lane {} stopped, dropping its reports", lane);
        }
    }

    drop(senders);
    while let Some(joined) = appliers.join_next().await {
        if let Err(e) = joined {
            error!("Report lane panicked: {}", e);
        }
    }
}

/// Picks the lane for a pair. Stable for the lifetime of the updater.
fn lane_for(pool_id: i64, template_id: i64, lanes: usize) -> usize {
    let key = pool_id.wrapping_mul(31).wrapping_add(template_id);
    key.rem_euclid(lanes as i64) as usize
}

async fn run_lane(store: AssociationStore, mut rx: mpsc::Receiver<ProgressReport>) {
    while let Some(report) = rx.recv().await {
        apply_with_retry(&store, report).await;
    }
}

/// Applies one report, retrying transient storage failures with exponential
/// backoff. Rejected reports are logged and skipped.
async fn apply_with_retry(store: &AssociationStore, report: ProgressReport) {
    let pool_id = report.pool_id;
    let template_id = report.template_id;
    let mut backoff = INITIAL_BACKOFF;

    for attempt in 1..=MAX_ATTEMPTS {
        let store = store.clone();
        let report = report.clone();
        let handle = tokio::task::spawn_blocking(move || store.record_progress(&report));

        let err: StoreError = match handle.await {
            Ok(Ok(ProgressOutcome::Applied | ProgressOutcome::Stale)) => {
                if attempt > 1 {
                    debug!(
                        "Report for pool {}, template {} applied after {} attempts",
                        pool_id, template_id, attempt
                    );
                }
                return;
            }
            Ok(Err(e)) => e,
            Err(join_err) => {
                error!(
                    "Report for pool {}, template {} panicked: {}",
                    pool_id, template_id, join_err
                );
                return;
            }
        };

        if !err.is_retryable() {
            warn!(
                "Dropped report for pool {}, template {}: {}",
                pool_id, template_id, err
            );
            return;
        }
        if attempt == MAX_ATTEMPTS {
            error!(
                "Gave up on report for pool {}, template {} after {} attempts: {}",
                pool_id, template_id, attempt, err
            );
            return;
        }
        warn!(
            "Report for pool {}, template {} failed (attempt {}), retrying in {:?}: {}",
            pool_id, template_id, attempt, backoff, err
        );
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
