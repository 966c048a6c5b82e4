use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lift_core::{LiftError, LiftRequest, LiftRequestEvent, LiftResult};
use lift_telemetry::MetricsRecorder;

/// Processes one dequeued event. Errors are logged by the consumer and
/// never stop it.
#[async_trait]
pub trait DispatchHandler: Send + Sync {
    async fn handle(&self, event: LiftRequestEvent) -> LiftResult<()>;
}

/// Bounded FIFO between request admission and the single dispatch
/// consumer. Ordering is global across sessions.
pub struct DispatchQueue {
    tx: mpsc::Sender<LiftRequestEvent>,
    rx: Mutex<Option<mpsc::Receiver<LiftRequestEvent>>>,
    capacity: usize,
    admission_margin: usize,
    metrics: Arc<MetricsRecorder>,
}

impl DispatchQueue {
    pub fn new(capacity: usize, admission_margin: usize, metrics: Arc<MetricsRecorder>) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            capacity,
            admission_margin,
            metrics,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events waiting to be consumed.
    pub fn occupancy(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Refuse new work once occupancy reaches `capacity - margin`. Advisory:
    /// a caller that passes may still wait in [`enqueue`](Self::enqueue).
    pub fn check_admission(&self) -> LiftResult<()> {
        let occupancy = self.occupancy();
        let limit = self.capacity.saturating_sub(self.admission_margin);
        if occupancy >= limit {
            self.metrics.counter_inc("dispatch.admission.refused", &[], 1);
            warn!(occupancy, capacity = self.capacity, "dispatch queue near capacity, refusing");
            return Err(LiftError::Busy(format!(
                "dispatch queue is full ({occupancy}/{})",
                self.capacity
            )));
        }
        Ok(())
    }

    /// Append an event, waiting for room when the queue is full.
    pub async fn enqueue(&self, event: LiftRequestEvent) -> LiftResult<()> {
        let request_id = event.id.clone();
        self.tx
            .send(event)
            .await
            .map_err(|_| LiftError::Busy("dispatch consumer has stopped".into()))?;
        self.record_depth();
        debug!(request_id = %request_id, occupancy = self.occupancy(), "event enqueued");
        Ok(())
    }

    /// Re-enqueue persisted queued requests, oldest first. Replayed events
    /// have no originating observer. Waits for room like `enqueue`, so start
    /// the consumer first when the backlog may exceed capacity.
    pub async fn replay(&self, requests: Vec<LiftRequest>) -> LiftResult<usize> {
        let count = requests.len();
        for request in &requests {
            self.enqueue(LiftRequestEvent::from_request(request, None)).await?;
        }
        if count > 0 {
            info!(count, "replayed queued requests");
        }
        Ok(count)
    }

    /// Run the consumer loop until `cancel` fires. Events are handled one
    /// at a time in FIFO order. Only one consumer can run per queue.
    pub async fn consume(&self, handler: Arc<dyn DispatchHandler>, cancel: CancellationToken) {
        let Some(mut rx) = self.rx.lock().take() else {
            error!("dispatch consumer already started");
            return;
        };
        info!(capacity = self.capacity, "dispatch consumer started");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.record_depth();

            let request_id = event.id.clone();
            let session_id = event.session_id.clone();
            match handler.handle(event).await {
                Ok(()) => {
                    self.metrics.counter_inc("dispatch.events.processed", &[], 1);
                }
                Err(e) => {
                    self.metrics.counter_inc("dispatch.handler.errors", &[("kind", e.kind())], 1);
                    error!(
                        request_id = %request_id,
                        session_id = %session_id,
                        error = %e,
                        "dispatch handler failed"
                    );
                }
            }
        }

        info!("dispatch consumer stopped");
    }

    /// Spawn [`consume`](Self::consume) on the runtime.
    pub fn spawn_consumer(
        self: &Arc<Self>,
        handler: Arc<dyn DispatchHandler>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.consume(handler, cancel).await })
    }

    fn record_depth(&self) {
        self.metrics.gauge_set("dispatch.queue.depth", &[], self.occupancy() as f64);
    }
}
