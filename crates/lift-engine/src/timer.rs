use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lift_core::LiftRequestId;

use crate::lifecycle::RequestLifecycle;

/// A scheduled completion. Dropping the handle leaves the task running.
pub struct CompletionHandle {
    request_id: LiftRequestId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CompletionHandle {
    pub fn request_id(&self) -> &LiftRequestId {
        &self.request_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the completion task to finish or be cancelled.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(request_id = %self.request_id, error = %e, "completion task failed");
        }
    }
}

/// Completes requests after a fixed travel delay, off the consumer's path.
pub struct CompletionTimer {
    lifecycle: Arc<RequestLifecycle>,
    delay: Duration,
    root: CancellationToken,
    // request id -> (schedule sequence, token)
    pending: Arc<DashMap<LiftRequestId, (u64, CancellationToken)>>,
    seq: AtomicU64,
}

impl CompletionTimer {
    pub fn new(lifecycle: Arc<RequestLifecycle>, delay: Duration) -> Self {
        Self {
            lifecycle,
            delay,
            root: CancellationToken::new(),
            pending: Arc::new(DashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Complete `request_id` once the delay elapses unless cancelled first.
    /// Failures are logged; the request then stays queued.
    pub fn schedule(&self, request_id: &LiftRequestId) -> CompletionHandle {
        let token = self.root.child_token();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        if let Some((_, previous)) = self.pending.insert(request_id.clone(), (seq, token.clone())) {
            debug!(request_id = %request_id, "replacing pending completion");
            previous.cancel();
        }

        let id = request_id.clone();
        let lifecycle = Arc::clone(&self.lifecycle);
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    debug!(request_id = %id, "completion cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = lifecycle.complete_lift_request(&id) {
                        warn!(request_id = %id, error = %e, kind = e.kind(), "failed to complete lift request");
                    }
                }
            }
            pending.remove_if(&id, |_, (s, _)| *s == seq);
        });

        CompletionHandle {
            request_id: request_id.clone(),
            cancel: token,
            task,
        }
    }

    /// Abort a pending completion. Returns false if none was pending.
    pub fn cancel(&self, request_id: &LiftRequestId) -> bool {
        match self.pending.remove(request_id) {
            Some((_, (_, token))) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Cancel every pending completion.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.pending.clear();
    }
}
