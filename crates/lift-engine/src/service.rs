use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lift_core::{LiftRequestEvent, LiftRequestView, LiftResult, ObserverId, SessionId, SessionView};
use lift_settings::LiftSettings;
use lift_store::DomainStore;
use lift_telemetry::MetricsRecorder;

use crate::handler::LiftMovedHandler;
use crate::lifecycle::RequestLifecycle;
use crate::pool::{spawn_pool, PoolHandle};
use crate::queue::DispatchQueue;
use crate::timer::CompletionTimer;

/// Entry point for the transport layer.
pub struct LiftService {
    lifecycle: Arc<RequestLifecycle>,
    queue: Arc<DispatchQueue>,
    pool: PoolHandle,
}

impl LiftService {
    pub fn new(lifecycle: Arc<RequestLifecycle>, queue: Arc<DispatchQueue>, pool: PoolHandle) -> Self {
        Self {
            lifecycle,
            queue,
            pool,
        }
    }

    /// Admit, persist and enqueue a lift call. `requester` is the observer
    /// that made the call, if any; it will not see its own `lift_moved`.
    /// A call that cannot be enqueued is withdrawn before the error returns.
    pub async fn call_lift(
        &self,
        session_id: &SessionId,
        floor: i64,
        requester: Option<ObserverId>,
    ) -> LiftResult<LiftRequestView> {
        self.queue.check_admission()?;
        let view = self.lifecycle.create_lift_request(session_id, floor)?;
        let event = LiftRequestEvent::from_request(&view.request, requester);
        if let Err(e) = self.queue.enqueue(event).await {
            // Nothing will dispatch it, so give the lift back.
            if let Err(undo) = self.lifecycle.withdraw_lift_request(&view.request.id) {
                warn!(request_id = %view.request.id, error = %undo, "failed to withdraw undispatched request");
            }
            return Err(e);
        }
        Ok(view)
    }

    pub fn create_session(&self, floors: i64, lifts: i64) -> LiftResult<SessionView> {
        self.lifecycle.create_session(floors, lifts)
    }

    pub fn get_session(&self, session_id: &SessionId) -> LiftResult<SessionView> {
        self.lifecycle.get_session(session_id)
    }

    pub fn get_lift_requests(
        &self,
        session_id: Option<&SessionId>,
        status: Option<&str>,
    ) -> LiftResult<Vec<LiftRequestView>> {
        self.lifecycle.get_lift_requests(session_id, status)
    }

    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }
}

/// The wired dispatch core: service, pool actor, consumer task and timer.
pub struct LiftEngine {
    service: Arc<LiftService>,
    lifecycle: Arc<RequestLifecycle>,
    queue: Arc<DispatchQueue>,
    timer: Arc<CompletionTimer>,
    cancel: CancellationToken,
    consumer: Option<JoinHandle<()>>,
}

impl LiftEngine {
    /// Build every component and start the pool actor and the consumer.
    /// Must be called inside a tokio runtime.
    pub fn start(
        store: Arc<dyn DomainStore>,
        settings: &LiftSettings,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let dispatch = &settings.dispatch;
        let lifecycle = Arc::new(RequestLifecycle::new(
            store,
            settings.limits.clone(),
            dispatch.default_request_filter,
            Arc::clone(&metrics),
        ));
        let queue = Arc::new(DispatchQueue::new(
            dispatch.queue_capacity,
            dispatch.admission_margin,
            Arc::clone(&metrics),
        ));
        let pool = spawn_pool(Arc::clone(&metrics));
        let timer = Arc::new(CompletionTimer::new(
            Arc::clone(&lifecycle),
            Duration::from_millis(dispatch.completion_delay_ms),
        ));

        let cancel = CancellationToken::new();
        let handler = Arc::new(LiftMovedHandler::new(pool.clone(), Arc::clone(&timer)));
        let consumer = queue.spawn_consumer(handler, cancel.child_token());

        let service = Arc::new(LiftService::new(
            Arc::clone(&lifecycle),
            Arc::clone(&queue),
            pool,
        ));

        info!(
            capacity = dispatch.queue_capacity,
            margin = dispatch.admission_margin,
            delay_ms = dispatch.completion_delay_ms,
            "dispatch engine started"
        );

        Self {
            service,
            lifecycle,
            queue,
            timer,
            cancel,
            consumer: Some(consumer),
        }
    }

    pub fn service(&self) -> Arc<LiftService> {
        Arc::clone(&self.service)
    }

    /// Re-dispatch requests left queued by a previous run. Call before the
    /// transport starts accepting calls.
    pub async fn replay_pending(&self) -> LiftResult<usize> {
        let pending = self.lifecycle.queued_requests()?;
        self.queue.replay(pending).await
    }

    /// Stop the consumer and cancel pending completions. Requests still
    /// queued are replayed on the next start.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        self.timer.shutdown();
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.await;
        }
        info!("dispatch engine stopped");
    }
}
