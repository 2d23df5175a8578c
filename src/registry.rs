//! Registry of dispatched handler tasks
//!
//! Tracks the join handles of per-connection handler tasks so shutdown can
//! wait for in-flight work. Entries are appended by the accept loop;
//! already-finished handles are pruned on each append so the registry does
//! not grow with the total connection count.

use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::logger::log;

/// Ordered collection of handler task handles
///
/// Lock discipline: the mutex is only held for push/prune/take, never across
/// an await point.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// Set once `drain` has taken the list; later registrations are refused
    /// so no task can slip in unsupervised behind the shutdown join.
    closed: std::sync::atomic::AtomicBool,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a dispatched task handle, pruning completed entries first.
    ///
    /// A registration arriving after `drain` has started is refused: the
    /// handle is dropped (the task keeps running detached, it is never
    /// cancelled) and a warning is logged.
    pub fn register(&self, handle: JoinHandle<()>) {
        use std::sync::atomic::Ordering;

        let mut handles = self.handles.lock().expect("registry lock poisoned");
        if self.closed.load(Ordering::SeqCst) {
            log::warn!("Registry already drained, refusing late task registration");
            return;
        }
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tracked (possibly finished) handles
    pub fn len(&self) -> usize {
        self.handles.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every tracked task to finish, bounded by `timeout` overall.
    ///
    /// Tasks that outlive the bound are left running (never cancelled) and an
    /// escalation is logged. Returns the number of tasks still pending when
    /// the bound expired. The registry is empty afterwards.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let handles = {
            let mut guard = self.handles.lock().expect("registry lock poisoned");
            // Close while holding the lock: a concurrent register sees either
            // an open registry (and lands in the taken list) or a closed one.
            self.closed
                .store(true, std::sync::atomic::Ordering::SeqCst);
            std::mem::take(&mut *guard)
        };

        let total = handles.len();
        let deadline = Instant::now() + timeout;
        let mut pending = 0usize;

        for (i, handle) in handles.into_iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!(task = i, error = %e, "Handler task panicked before shutdown join");
                }
                Err(_) => {
                    pending += 1;
                    log::warn!(
                        task = i,
                        timeout = ?timeout,
                        "Handler task still running after drain timeout, leaving it behind"
                    );
                }
            }
        }

        log::debug!(total = total, pending = pending, "Task registry drained");
        pending
    }
}
