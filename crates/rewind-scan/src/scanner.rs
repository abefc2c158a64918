//! Bounded-concurrency scanner over a versioned bucket.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use rewind_core::{
    FolderTask, ObjectVersionRecord, RecordConsumer, ScanConfig, ScanError, ScanOutcome,
    ScanStatistics, ScanWarning, StatsSnapshot, WarningKind,
};

use crate::lister::{ListError, ListVersionsPage, ListVersionsRequest, VersionLister, VersioningStatus};
use crate::progress::{ProgressTracker, ScanProgress};
use crate::traversal::Traversal;

/// Walks every folder of a bucket with at most `max_concurrent_scans`
/// listings in flight, handing each record to a [`RecordConsumer`].
pub struct Scanner<L: ?Sized> {
    lister: Arc<L>,
    config: ScanConfig,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl<L> Scanner<L>
where
    L: VersionLister + ?Sized + 'static,
{
    /// Create a new scanner.
    pub fn new(lister: Arc<L>, config: ScanConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            lister,
            config,
            progress_tx,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// The configuration this scanner runs with.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan the bucket.
    ///
    /// Fails only when the configuration is invalid, the bucket cannot be
    /// queried, or versioning is not enabled. Everything that goes wrong
    /// after traversal starts is reported as a warning in the outcome.
    /// Cancelling `cancel` stops scheduling new folders and interrupts
    /// in-flight listings; records already consumed stay consumed.
    pub async fn scan(
        &self,
        consumer: Arc<dyn RecordConsumer>,
        cancel: CancellationToken,
    ) -> Result<ScanOutcome, ScanError> {
        let start = Instant::now();
        let config = &self.config;
        config
            .validate()
            .map_err(|message| ScanError::InvalidConfig { message })?;

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(ScanOutcome {
                    stats: StatsSnapshot::default(),
                    warnings: Vec::new(),
                    cancelled: true,
                    duration: start.elapsed(),
                });
            }
            status = self.lister.versioning_status(&config.bucket) => status,
        };
        let status = status.map_err(|err| ScanError::Remote {
            bucket: config.bucket.clone(),
            message: err.to_string(),
        })?;

        if status != VersioningStatus::Enabled {
            return Err(ScanError::NotVersioned {
                bucket: config.bucket.clone(),
                status: status.to_string(),
            });
        }

        let roots = config.normalized_roots();
        info!(
            bucket = %config.bucket,
            target_time = %config.target_time,
            roots = roots.len(),
            workers = config.max_concurrent_scans,
            "starting scan"
        );

        let (traversal, mut queue) =
            Traversal::new(config.separator, config.flat_depth, config.exclusion_matcher());
        let ctx = Arc::new(FolderContext {
            lister: Arc::clone(&self.lister),
            bucket: config.bucket.clone(),
            record_buffer: config.record_buffer,
            traversal,
            consumer,
            stats: ScanStatistics::new(),
            warnings: Mutex::new(Vec::new()),
            cancel: cancel.clone(),
            progress_tx: self.progress_tx.clone(),
            tracker: ProgressTracker::new(),
        });

        let seeded = ctx.traversal.seed(&roots);
        debug!(seeded, "seeded scan roots");

        let slots = Arc::new(Semaphore::new(config.max_concurrent_scans));
        let mut workers = JoinSet::new();
        let mut cancelled = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = queue.recv() => next,
            };
            let Some(task) = next else {
                break;
            };

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    ctx.traversal.complete(&task);
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&slots).acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                ctx.traversal.complete(&task);
                break;
            };

            workers.spawn(Arc::clone(&ctx).fetch_folder(task, permit));

            while let Some(result) = workers.try_join_next() {
                log_join_error(result);
            }
        }

        // Late discoveries from draining workers are refused from here on.
        drop(queue);
        while let Some(result) = workers.join_next().await {
            log_join_error(result);
        }

        let stats = ctx.stats.snapshot();
        let warnings = std::mem::take(&mut *ctx.warnings.lock());
        let duration = start.elapsed();

        if cancelled {
            warn!(pages = stats.pages, objects = stats.objects, "scan cancelled");
        } else {
            info!(
                pages = stats.pages,
                objects = stats.objects,
                folders = stats.folders,
                warnings = warnings.len(),
                elapsed_ms = duration.as_millis() as u64,
                "scan complete"
            );
        }

        Ok(ScanOutcome {
            stats,
            warnings,
            cancelled,
            duration,
        })
    }
}

/// State shared by all folder workers of one scan.
struct FolderContext<L: ?Sized> {
    lister: Arc<L>,
    bucket: String,
    record_buffer: usize,
    traversal: Traversal,
    consumer: Arc<dyn RecordConsumer>,
    stats: ScanStatistics,
    warnings: Mutex<Vec<ScanWarning>>,
    cancel: CancellationToken,
    progress_tx: broadcast::Sender<ScanProgress>,
    tracker: ProgressTracker,
}

impl<L> FolderContext<L>
where
    L: VersionLister + ?Sized + 'static,
{
    /// Process one folder: list it, feed its records to a companion task,
    /// enqueue its children.
    async fn fetch_folder(self: Arc<Self>, task: FolderTask, permit: OwnedSemaphorePermit) {
        let guard = CompletionGuard {
            ctx: Arc::clone(&self),
            task: task.clone(),
        };

        let (records_tx, records_rx) = mpsc::channel(self.record_buffer);
        let companion = tokio::spawn(Arc::clone(&self).consume_records(records_rx));

        let result = self.list_folder(&task, &records_tx).await;
        drop(permit);
        drop(records_tx);

        match result {
            Ok(()) => trace!(prefix = %task.prefix, "folder listed"),
            Err(ListError::Cancelled) => debug!(prefix = %task.prefix, "listing cancelled"),
            Err(err) => {
                warn!(prefix = %task.prefix, error = %err, "failed to fetch prefix");
                self.push_warning(ScanWarning::list_failed(task.prefix.as_str(), &err));
            }
        }

        if let Err(err) = companion.await {
            error!(prefix = %task.prefix, error = %err, "record consumer task failed");
            self.push_warning(ScanWarning::new(
                task.prefix.as_str(),
                err.to_string(),
                WarningKind::WorkerFailed,
            ));
        }

        self.stats.add_folders(1);
        drop(guard);
        self.broadcast_progress();
    }

    /// Fetch every page of one folder.
    async fn list_folder(
        &self,
        task: &FolderTask,
        records: &mpsc::Sender<ObjectVersionRecord>,
    ) -> Result<(), ListError> {
        let matcher = self.traversal.matcher();
        let mut request = ListVersionsRequest::new(self.bucket.as_str(), task.prefix.as_str(), task.delimiter);

        loop {
            let page = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ListError::Cancelled),
                page = self.lister.list_versions(&request) => page?,
            };

            self.stats.add_pages(1);
            self.stats.add_objects(page.record_count() as u64);

            let ListVersionsPage {
                delete_markers,
                versions,
                common_prefixes,
                truncated,
                next_key_marker,
                next_version_id_marker,
                ..
            } = page;

            for record in delete_markers.into_iter().chain(versions) {
                if matcher.should_skip_object(&record.key) {
                    trace!(key = %record.key, "object excluded");
                    continue;
                }
                if records.send(record).await.is_err() {
                    // Companion is gone; nothing left to hand records to.
                    break;
                }
            }

            if task.is_grouped() {
                for prefix in common_prefixes {
                    if prefix.len() <= task.prefix.len() || !prefix.starts_with(&task.prefix) {
                        warn!(parent = %task.prefix, prefix = %prefix, "ignoring prefix outside its parent");
                        continue;
                    }
                    self.traversal.discover(task, prefix);
                }
            }

            if !truncated {
                return Ok(());
            }
            if next_key_marker.is_none() && next_version_id_marker.is_none() {
                return Err(ListError::MissingMarker {
                    prefix: task.prefix.clone(),
                });
            }
            request = request.next_page(next_key_marker, next_version_id_marker);
        }
    }

    /// Companion task: hand records to the consumer one at a time.
    ///
    /// A failing or panicking consumer costs only the record it failed on.
    async fn consume_records(self: Arc<Self>, mut records: mpsc::Receiver<ObjectVersionRecord>) {
        while let Some(record) = records.recv().await {
            match panic::catch_unwind(AssertUnwindSafe(|| self.consumer.consume(&record))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(key = %record.key, error = %err, "failed to resolve record");
                    self.push_warning(ScanWarning::resolve_failed(&err));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(key = %record.key, panic = %message, "record consumer panicked");
                    self.push_warning(ScanWarning::consumer_panicked(record.key.as_str(), message));
                }
            }
        }
    }

    fn push_warning(&self, warning: ScanWarning) {
        self.warnings.lock().push(warning);
    }

    fn broadcast_progress(&self) {
        let errors = self.warnings.lock().len();
        let progress = self
            .tracker
            .snapshot(&self.stats, self.traversal.pending(), errors);
        // No subscribers is fine.
        let _ = self.progress_tx.send(progress);
    }
}

/// Marks a folder task complete when dropped, including on unwind.
struct CompletionGuard<L: ?Sized> {
    ctx: Arc<FolderContext<L>>,
    task: FolderTask,
}

impl<L: ?Sized> Drop for CompletionGuard<L> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.ctx.warnings.lock().push(ScanWarning::new(
                self.task.prefix.as_str(),
                "folder worker panicked",
                WarningKind::WorkerFailed,
            ));
        }
        self.ctx.traversal.complete(&self.task);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        error!(error = %err, "folder worker failed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
