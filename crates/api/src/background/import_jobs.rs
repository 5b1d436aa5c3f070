//! Background import runs.
//!
//! Each upload becomes one spawned task that drives the batch importer on
//! its own transactional store session. The registry keeps a view of every
//! run, a [`CancellationToken`] per run and a broadcast channel of progress
//! events for streaming subscribers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use roster_core::error::CoreError;
use roster_core::import_source::SourceFormat;
use roster_core::import_status::ImportRunStatus;
use roster_core::importer::{
    load_and_import, ImportAccounting, ImportError, ImportObserver, ImportProgress, RowOutcome,
};
use roster_core::store::StoreProvider;
use roster_core::types::{DbId, Timestamp};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Capacity of each run's progress channel. Slow subscribers skip events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Finished runs kept for status queries unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Snapshot of one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRunView {
    pub id: DbId,
    pub format: SourceFormat,
    pub status: ImportRunStatus,
    pub processed: usize,
    pub total_rows: usize,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub accounting: Option<ImportAccounting>,
    pub summary: Option<String>,
    pub error: Option<String>,
}

/// Event published on a run's progress channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEvent {
    Progress {
        processed: usize,
        total: usize,
        fraction: f64,
        row_number: usize,
        outcome: RowOutcome,
    },
    Finished {
        status: ImportRunStatus,
        summary: Option<String>,
        error: Option<String>,
    },
}

impl ImportEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Finished { .. } => "finished",
        }
    }
}

#[derive(Default)]
struct Counters {
    processed: AtomicUsize,
    total: AtomicUsize,
}

struct JobEntry {
    view: ImportRunView,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    /// Dropped when the run finishes so subscriber streams end.
    events: Option<broadcast::Sender<ImportEvent>>,
}

impl JobEntry {
    fn snapshot(&self) -> ImportRunView {
        let mut view = self.view.clone();
        if view.status == ImportRunStatus::Running {
            view.processed = self.counters.processed.load(Ordering::Relaxed);
            view.total_rows = self.counters.total.load(Ordering::Relaxed);
        }
        view
    }
}

/// Registry of import runs.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` and shared through
/// application state. Running imports are always kept; only the newest
/// `history_limit` finished runs are.
pub struct ImportJobs {
    jobs: RwLock<HashMap<DbId, JobEntry>>,
    next_id: AtomicI64,
    tasks: TaskTracker,
    history_limit: usize,
}

impl Default for ImportJobs {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportJobs {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            tasks: TaskTracker::new(),
            history_limit,
        }
    }

    /// Register a run and spawn its task. Returns the initial view.
    pub async fn start(
        self: &Arc<Self>,
        store: Arc<dyn StoreProvider>,
        format: SourceFormat,
        data: String,
    ) -> ImportRunView {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let view = ImportRunView {
            id,
            format,
            status: ImportRunStatus::Running,
            processed: 0,
            total_rows: 0,
            started_at: Utc::now(),
            finished_at: None,
            accounting: None,
            summary: None,
            error: None,
        };

        self.jobs.write().await.insert(
            id,
            JobEntry {
                view: view.clone(),
                cancel: cancel.clone(),
                counters: Arc::clone(&counters),
                events: Some(events.clone()),
            },
        );
        tracing::info!(import_id = id, format = format.as_str(), bytes = data.len(), "Import queued");

        let jobs = Arc::clone(self);
        self.tasks.spawn(async move {
            let result = execute(store, format, &data, &counters, &events, &cancel).await;
            drop(events);
            jobs.finish(id, result).await;
        });

        view
    }

    /// All runs, newest first.
    pub async fn list(&self) -> Vec<ImportRunView> {
        let mut views: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .map(JobEntry::snapshot)
            .collect();
        views.sort_by(|a, b| b.id.cmp(&a.id));
        views
    }

    pub async fn get(&self, id: DbId) -> Result<ImportRunView, CoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .map(JobEntry::snapshot)
            .ok_or(CoreError::NotFound {
                entity: "Import",
                id,
            })
    }

    /// Request cancellation of a running import.
    pub async fn cancel(&self, id: DbId) -> Result<ImportRunView, CoreError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id).ok_or(CoreError::NotFound {
            entity: "Import",
            id,
        })?;
        if entry.view.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Import {id} is already {}",
                entry.view.status
            )));
        }
        entry.cancel.cancel();
        tracing::info!(import_id = id, "Import cancellation requested");
        Ok(entry.snapshot())
    }

    /// Current view plus a receiver for subsequent events. The receiver is
    /// `None` once the run has finished.
    pub async fn subscribe(
        &self,
        id: DbId,
    ) -> Result<(ImportRunView, Option<broadcast::Receiver<ImportEvent>>), CoreError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id).ok_or(CoreError::NotFound {
            entity: "Import",
            id,
        })?;
        Ok((
            entry.snapshot(),
            entry.events.as_ref().map(broadcast::Sender::subscribe),
        ))
    }

    /// Cancel every running import. Called on shutdown.
    pub async fn cancel_all(&self) {
        let jobs = self.jobs.read().await;
        let mut cancelled = 0usize;
        for entry in jobs.values().filter(|e| !e.view.status.is_terminal()) {
            entry.cancel.cancel();
            cancelled += 1;
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled running imports");
        }
    }

    /// Wait for `signal`, then cancel every running import.
    ///
    /// Used as the server's graceful-shutdown future so runs stop before the
    /// server waits on open progress streams.
    pub async fn cancel_on(&self, signal: impl Future<Output = ()>) {
        signal.await;
        self.cancel_all().await;
    }

    /// Cancel running imports and wait up to `grace` for their rollbacks.
    pub async fn shutdown(&self, grace: Duration) {
        self.cancel_all().await;
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Imports still running at shutdown"
            );
        }
    }

    async fn finish(&self, id: DbId, result: Result<ImportAccounting, ImportError>) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };

        let view = &mut entry.view;
        view.finished_at = Some(Utc::now());
        view.processed = entry.counters.processed.load(Ordering::Relaxed);
        view.total_rows = entry.counters.total.load(Ordering::Relaxed);
        match result {
            Ok(accounting) => {
                view.status = ImportRunStatus::Completed;
                view.processed = accounting.processed();
                view.total_rows = accounting.total_rows;
                view.summary = Some(accounting.summary());
                view.accounting = Some(accounting);
            }
            Err(ImportError::Cancelled { processed }) => {
                view.status = ImportRunStatus::Cancelled;
                view.processed = processed;
                view.error = Some(ImportError::Cancelled { processed }.to_string());
            }
            Err(e) => {
                view.status = ImportRunStatus::Failed;
                view.error = Some(e.to_string());
            }
        }
        tracing::info!(import_id = id, status = %view.status, "Import finished");

        if let Some(events) = entry.events.take() {
            let _ = events.send(ImportEvent::Finished {
                status: view.status,
                summary: view.summary.clone(),
                error: view.error.clone(),
            });
        }

        prune_history(&mut jobs, self.history_limit);
    }
}

/// Drop the oldest finished runs beyond `limit`.
fn prune_history(jobs: &mut HashMap<DbId, JobEntry>, limit: usize) {
    let mut finished: Vec<DbId> = jobs
        .iter()
        .filter(|(_, entry)| entry.view.status.is_terminal())
        .map(|(id, _)| *id)
        .collect();
    if finished.len() <= limit {
        return;
    }
    finished.sort_unstable();
    let excess = finished.len() - limit;
    for id in &finished[..excess] {
        jobs.remove(id);
    }
    tracing::debug!(removed = excess, "Pruned finished imports");
}

/// Mirrors importer progress into the run's counters and event channel.
struct JobObserver<'a> {
    counters: &'a Counters,
    events: &'a broadcast::Sender<ImportEvent>,
}

impl ImportObserver for JobObserver<'_> {
    fn started(&mut self, total: usize) {
        self.counters.total.store(total, Ordering::Relaxed);
    }

    fn on_row(&mut self, progress: &ImportProgress) {
        self.counters
            .processed
            .store(progress.processed, Ordering::Relaxed);
        // No subscribers is fine.
        let _ = self.events.send(ImportEvent::Progress {
            processed: progress.processed,
            total: progress.total,
            fraction: progress.fraction(),
            row_number: progress.row_number,
            outcome: progress.outcome.clone(),
        });
    }
}

/// Open an import session and run the importer, publishing progress.
async fn execute(
    store: Arc<dyn StoreProvider>,
    format: SourceFormat,
    data: &str,
    counters: &Counters,
    events: &broadcast::Sender<ImportEvent>,
    cancel: &CancellationToken,
) -> Result<ImportAccounting, ImportError> {
    let mut session = store.import_session().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to open import session");
        ImportError::Unavailable(e.to_string())
    })?;

    let mut observer = JobObserver { counters, events };

    load_and_import(session.as_mut(), format, data, &mut observer, cancel).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
