//! Rate-limited priority queue for outbound provider calls
//!
//! Every Allium request funnels through one queue instance so the whole
//! process respects the plan's request spacing:
//! - Jobs dispatch highest priority first, FIFO within a priority class.
//! - Dispatches are spaced by a minimum start-to-start interval.
//! - HTTP 429 failures retry with exponential backoff. The backoff sleep
//!   runs inline in the worker, pausing all traffic until the provider
//!   cools down, and the retried job rejoins the back of its own
//!   priority class.

use crate::config::QueueConfig;
use crate::error::{AppError, AppResult};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant};

/// Priority levels for queued requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Background enrichment (balance snapshots)
    Low = 1,
    /// Steady-state polling (wallet transactions)
    Medium = 2,
    /// Price lookups feeding live evaluation
    High = 3,
    /// Explorer SQL legs; a stalled run blocks discovery
    Critical = 4,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "LOW"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::High => write!(f, "HIGH"),
            Priority::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Queue counters, monotonic except `depth`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct QueueStats {
    /// Every call handed to `submit`
    pub submitted: u64,
    /// Calls that resolved successfully
    pub succeeded: u64,
    /// 429 responses that earned a retry
    pub rate_limited: u64,
    /// Calls that failed terminally (includes exhausted retries)
    pub errored: u64,
    /// Jobs currently waiting for dispatch
    pub depth: u64,
}

type JobCall = Arc<dyn Fn() -> BoxFuture<'static, AppResult<Value>> + Send + Sync>;

/// What `submit` hands to the worker
struct PendingJob {
    call: JobCall,
    priority: Priority,
    label: String,
    respond: oneshot::Sender<AppResult<Value>>,
}

/// A job admitted to the dispatch heap
struct QueuedJob {
    call: JobCall,
    priority: Priority,
    label: String,
    respond: oneshot::Sender<AppResult<Value>>,
    retries: u32,
    seq: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    /// Max-heap order: higher priority first, then older seq first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueCounters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    rate_limited: AtomicU64,
    errored: AtomicU64,
    depth: AtomicU64,
}

/// The shared request queue
///
/// Cheap to clone behind an `Arc`; the worker task lives until every
/// handle is dropped and the backlog drains.
pub struct RequestQueue {
    submit_tx: mpsc::UnboundedSender<PendingJob>,
    counters: Arc<QueueCounters>,
}

impl RequestQueue {
    /// Create the queue and spawn its worker task.
    pub fn new(config: QueueConfig) -> Arc<Self> {
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(QueueCounters::default());
        tokio::spawn(run_worker(submit_rx, counters.clone(), config));
        Arc::new(Self {
            submit_tx,
            counters,
        })
    }

    /// Enqueue a call and wait for its result.
    ///
    /// `call` must be re-invokable: the worker calls it once per attempt
    /// when the provider answers 429.
    pub async fn submit<F, Fut>(
        &self,
        priority: Priority,
        label: impl Into<String>,
        call: F,
    ) -> AppResult<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult<Value>> + Send + 'static,
    {
        let label = label.into();
        let call: JobCall = Arc::new(move || Box::pin(call()));
        let (respond, result_rx) = oneshot::channel();

        self.counters.submitted.fetch_add(1, AtomicOrdering::Relaxed);
        self.counters.depth.fetch_add(1, AtomicOrdering::Relaxed);

        self.submit_tx
            .send(PendingJob {
                call,
                priority,
                label,
                respond,
            })
            .map_err(|_| AppError::Internal("request queue worker is gone".to_string()))?;

        result_rx
            .await
            .map_err(|_| AppError::Internal("request queue dropped the call".to_string()))?
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.counters.submitted.load(AtomicOrdering::Relaxed),
            succeeded: self.counters.succeeded.load(AtomicOrdering::Relaxed),
            rate_limited: self.counters.rate_limited.load(AtomicOrdering::Relaxed),
            errored: self.counters.errored.load(AtomicOrdering::Relaxed),
            depth: self.counters.depth.load(AtomicOrdering::Relaxed),
        }
    }
}

fn admit(pending: PendingJob, next_seq: &mut u64) -> QueuedJob {
    *next_seq += 1;
    QueuedJob {
        call: pending.call,
        priority: pending.priority,
        label: pending.label,
        respond: pending.respond,
        retries: 0,
        seq: *next_seq,
    }
}

fn drain_into(
    rx: &mut mpsc::UnboundedReceiver<PendingJob>,
    heap: &mut BinaryHeap<QueuedJob>,
    next_seq: &mut u64,
) {
    while let Ok(pending) = rx.try_recv() {
        heap.push(admit(pending, next_seq));
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<PendingJob>,
    counters: Arc<QueueCounters>,
    config: QueueConfig,
) {
    let min_interval = Duration::from_millis(config.min_interval_ms);
    let mut heap: BinaryHeap<QueuedJob> = BinaryHeap::new();
    let mut last_dispatch: Option<Instant> = None;
    let mut next_seq: u64 = 0;

    loop {
        // Block for work when idle; channel closure ends the worker
        if heap.is_empty() {
            match rx.recv().await {
                Some(pending) => heap.push(admit(pending, &mut next_seq)),
                None => break,
            }
        }
        drain_into(&mut rx, &mut heap, &mut next_seq);

        // Start-to-start spacing; the very first dispatch goes immediately
        if let Some(last) = last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }
        // Arrivals during the wait compete for the pop below
        drain_into(&mut rx, &mut heap, &mut next_seq);

        let Some(mut job) = heap.pop() else {
            continue;
        };
        counters.depth.fetch_sub(1, AtomicOrdering::Relaxed);
        last_dispatch = Some(Instant::now());

        tracing::debug!(
            label = %job.label,
            priority = %job.priority,
            retries = job.retries,
            backlog = heap.len(),
            "Dispatching request"
        );

        match (job.call)().await {
            Ok(value) => {
                counters.succeeded.fetch_add(1, AtomicOrdering::Relaxed);
                let _ = job.respond.send(Ok(value));
            }
            Err(err) if err.is_rate_limited() && job.retries < config.max_retries => {
                counters.rate_limited.fetch_add(1, AtomicOrdering::Relaxed);
                job.retries += 1;
                let backoff = Duration::from_millis(
                    config
                        .backoff_base_ms
                        .saturating_mul(2u64.saturating_pow(job.retries)),
                );
                tracing::warn!(
                    label = %job.label,
                    retry = job.retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                // The whole queue pauses while the provider cools down
                sleep(backoff).await;
                counters.depth.fetch_add(1, AtomicOrdering::Relaxed);
                next_seq += 1;
                job.seq = next_seq;
                heap.push(job);
            }
            Err(err) if err.is_rate_limited() => {
                counters.errored.fetch_add(1, AtomicOrdering::Relaxed);
                tracing::error!(
                    label = %job.label,
                    retries = job.retries,
                    "Rate limit retries exhausted"
                );
                let _ = job.respond.send(Err(AppError::RetriesExhausted {
                    label: job.label.clone(),
                    retries: job.retries,
                }));
            }
            Err(err) => {
                counters.errored.fetch_add(1, AtomicOrdering::Relaxed);
                tracing::debug!(label = %job.label, error = %err, "Request failed");
                let _ = job.respond.send(Err(err));
            }
        }
    }
}
