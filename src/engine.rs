// Indexer engine
//
// Owns every piece of state that outlives a flush cycle: the intake queue,
// the destinations, the index-name cache and the per-destination transports.
//
// Flush cycle: drain -> route -> render selectors -> build body -> dispatch.
// Draining and building happen on the caller (the scheduler task); each
// destination group is then sent on its own task, so slow destinations never
// hold up the next tick or each other.

use crate::bulk::BulkPayloadBuilder;
use crate::config::{Config, ConfigError, DestinationConfig};
use crate::dispatcher::Dispatcher;
use crate::index_namer::IndexNamer;
use crate::queue::RecordQueue;
use crate::record::IncomingRecord;
use crate::router::{DroppedGroup, Router};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Running totals since the engine was created.
#[derive(Debug, Default)]
pub struct IndexerStats {
    records_submitted: AtomicU64,
    records_dropped: AtomicU64,
    batches_dispatched: AtomicU64,
    batches_indexed: AtomicU64,
    batches_failed: AtomicU64,
    records_indexed: AtomicU64,
    records_failed: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub records_submitted: u64,
    /// Records discarded because their identifier has no destination.
    pub records_dropped: u64,
    pub batches_dispatched: u64,
    pub batches_indexed: u64,
    pub batches_failed: u64,
    pub records_indexed: u64,
    pub records_failed: u64,
}

impl IndexerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_submitted: self.records_submitted.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_indexed: self.batches_indexed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_indexed: self.records_indexed.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
        }
    }

    fn batch_indexed(&self, records: usize) {
        self.batches_indexed.fetch_add(1, Ordering::Relaxed);
        self.records_indexed.fetch_add(records as u64, Ordering::Relaxed);
    }

    fn batch_failed(&self, records: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.records_failed.fetch_add(records as u64, Ordering::Relaxed);
    }
}

/// What one flush cycle did with the drained batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub drained: usize,
    /// (identifier, record count) per group handed to the dispatcher.
    pub dispatched: Vec<(String, usize)>,
    pub dropped: Vec<DroppedGroup>,
}

pub struct Indexer {
    queue: RecordQueue,
    router: Router,
    namer: IndexNamer,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<IndexerStats>,
    in_flight: TaskTracker,
    flush_interval: Duration,
    stopped: AtomicBool,
}

impl Indexer {
    pub fn new(
        destinations: Vec<Arc<DestinationConfig>>,
        dispatcher: Dispatcher,
        flush_interval: Duration,
    ) -> Self {
        info!(
            interval_ms = flush_interval.as_millis() as u64,
            destinations = destinations.len(),
            "indexer configured"
        );
        for destination in &destinations {
            info!(
                identifier = %destination.identifier,
                host = %destination.host,
                port = destination.port,
                index_mode = ?destination.index_mode,
                index_name_or_pattern = %destination.index_name_or_pattern,
                ssl = destination.use_tls,
                trust_all = destination.trust_all_certificates,
                "destination"
            );
        }

        Self {
            queue: RecordQueue::new(),
            router: Router::new(destinations),
            namer: IndexNamer::new(),
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(IndexerStats::default()),
            in_flight: TaskTracker::new(),
            flush_interval,
            stopped: AtomicBool::new(false),
        }
    }

    /// Resolves the configuration and opens one HTTP client per destination.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let flush_interval = config.flush_interval()?;
        let destinations: Vec<Arc<DestinationConfig>> =
            config.destinations()?.into_iter().map(Arc::new).collect();
        let dispatcher = Dispatcher::connect(&destinations)?;
        Ok(Self::new(destinations, dispatcher, flush_interval))
    }

    /// Enqueues one record. Never blocks beyond the queue lock and never
    /// rejects.
    pub fn submit(&self, record: IncomingRecord) {
        self.stats.records_submitted.fetch_add(1, Ordering::Relaxed);
        self.queue.submit(record);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs one flush cycle over everything queued so far. Dispatches are
    /// spawned and not awaited; use [`Indexer::wait_in_flight`] to wait.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn flush(&self) -> FlushReport {
        let batch = self.queue.drain();
        let mut report = FlushReport {
            drained: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            return report;
        }

        let routed = self.router.route(batch);
        self.stats
            .records_dropped
            .fetch_add(routed.dropped_records() as u64, Ordering::Relaxed);
        report.dropped = routed.dropped;

        let flush_time = Utc::now();
        let builder = BulkPayloadBuilder::new(&self.namer);

        for group in routed.groups {
            let identifier = group.destination.identifier.clone();
            let count = group.records.len();

            let payload = match builder.build_at(&group.destination, &group.records, flush_time) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(identifier = %identifier, count, error = %err, "failed to build bulk body");
                    self.stats.batch_failed(count);
                    continue;
                }
            };

            self.stats.batches_dispatched.fetch_add(1, Ordering::Relaxed);
            report.dispatched.push((identifier, count));

            let dispatcher = Arc::clone(&self.dispatcher);
            let stats = Arc::clone(&self.stats);
            let destination = Arc::clone(&group.destination);
            self.in_flight.spawn(async move {
                match dispatcher.dispatch(&destination, payload).await {
                    Ok(()) => {
                        debug!(identifier = %destination.identifier, count, "indexed records");
                        stats.batch_indexed(count);
                    }
                    Err(err) => {
                        match err.response_body() {
                            Some(body) => warn!(
                                identifier = %destination.identifier,
                                count,
                                error = %err,
                                response = %body,
                                "failed to index records"
                            ),
                            None => warn!(
                                identifier = %destination.identifier,
                                count,
                                error = %err,
                                "failed to index records"
                            ),
                        }
                        stats.batch_failed(count);
                    }
                }
            });
        }

        report
    }

    /// Waits until every dispatch spawned so far has finished.
    pub async fn wait_in_flight(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }

    /// Final drain, then waits for in-flight sends and closes the
    /// transports. Later calls do nothing. Callers outside the crate stop
    /// through [`Scheduler::shutdown`], which cancels the timer first.
    pub(crate) async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stopping indexer");

        let remaining = self.queue.len();
        if remaining > 0 {
            info!(remaining, "draining queue");
            self.flush();
            info!("finished queue draining");
        } else {
            info!("no items left in queue");
        }

        self.wait_in_flight().await;

        info!("closing destination clients");
        self.dispatcher.close().await;
    }

    /// Starts the periodic flush timer.
    pub fn start(self: Arc<Self>) -> Scheduler {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_timer(Arc::clone(&self), cancel.clone()));
        Scheduler {
            indexer: self,
            cancel,
            task,
        }
    }
}

async fn run_timer(indexer: Arc<Indexer>, cancel: CancellationToken) {
    let period = indexer.flush_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !indexer.queue.is_empty() {
                    let report = indexer.flush();
                    debug!(
                        drained = report.drained,
                        groups = report.dispatched.len(),
                        dropped_groups = report.dropped.len(),
                        "flush cycle"
                    );
                }
            }
        }
    }
}

/// Handle to a running flush timer.
pub struct Scheduler {
    indexer: Arc<Indexer>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Stops ticking, forces one final flush and closes the transports.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            error!(error = %err, "flush timer task failed");
        }
        self.indexer.shutdown().await;
    }
}
