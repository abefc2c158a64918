//! Traversal state: scan roots, the folder work queue and termination.
//!
//! Every enqueued folder bumps an outstanding-task counter; every folder
//! whose processing has fully finished (including enqueueing its children)
//! drops it. The queue is closed exactly once, by whoever observes the
//! counter reach zero. Completion of any particular task, such as a root,
//! means nothing on its own.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use rewind_core::{ExclusionMatcher, FolderTask};

/// Shared state of one traversal.
#[derive(Debug)]
pub(crate) struct Traversal {
    separator: char,
    flat_depth: Option<u32>,
    matcher: ExclusionMatcher,
    pending: AtomicUsize,
    queue: Mutex<Option<mpsc::UnboundedSender<FolderTask>>>,
}

impl Traversal {
    /// Create the state and the receiving end of its work queue.
    pub fn new(
        separator: char,
        flat_depth: Option<u32>,
        matcher: ExclusionMatcher,
    ) -> (Self, mpsc::UnboundedReceiver<FolderTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let traversal = Self {
            separator,
            flat_depth,
            matcher,
            pending: AtomicUsize::new(0),
            queue: Mutex::new(Some(tx)),
        };
        (traversal, rx)
    }

    pub fn matcher(&self) -> &ExclusionMatcher {
        &self.matcher
    }

    /// Enqueue one root task per scan root not excluded at bucket level.
    ///
    /// Closes the queue right away when nothing was seeded.
    pub fn seed(&self, roots: &[String]) -> usize {
        // Hold one count while seeding so an early completion cannot close the queue.
        self.pending.fetch_add(1, Ordering::AcqRel);

        let mut seeded = 0;
        for root in roots {
            if self.matcher.should_skip_bucket(root) {
                debug!(prefix = %root, "scan root excluded");
                continue;
            }
            if self.enqueue(FolderTask::root(root.as_str(), self.separator)) {
                seeded += 1;
            }
        }

        self.release();
        seeded
    }

    /// Enqueue a child folder reported while listing `parent`, unless pruned.
    pub fn discover(&self, parent: &FolderTask, prefix: String) -> bool {
        if self.matcher.should_skip_root_folder(&prefix) {
            debug!(prefix = %prefix, "folder excluded");
            return false;
        }
        self.enqueue(parent.child(prefix, self.separator, self.flat_depth))
    }

    /// Mark a dequeued task as fully processed.
    ///
    /// Returns true when this was the last outstanding task.
    pub fn complete(&self, task: &FolderTask) -> bool {
        trace!(prefix = %task.prefix, "folder complete");
        self.release()
    }

    /// Number of enqueued tasks not yet completed.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the work queue has been closed.
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.queue.lock().is_none()
    }

    fn enqueue(&self, task: FolderTask) -> bool {
        let queue = self.queue.lock();
        let Some(tx) = queue.as_ref() else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(task).is_err() {
            // Receiver gone: the scan is shutting down.
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    fn release(&self) -> bool {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("no outstanding folders, closing work queue");
            self.queue.lock().take();
            true
        } else {
            false
        }
    }
}
