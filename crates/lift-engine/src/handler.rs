use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use lift_core::{LiftError, LiftRequestEvent, LiftResult, Notification};

use crate::pool::PoolHandle;
use crate::queue::DispatchHandler;
use crate::timer::CompletionTimer;

/// Consumer-side handler: tells the session a lift is moving and arms the
/// completion timer. The observer that made the call gets no echo.
pub struct LiftMovedHandler {
    pool: PoolHandle,
    timer: Arc<CompletionTimer>,
}

impl LiftMovedHandler {
    pub fn new(pool: PoolHandle, timer: Arc<CompletionTimer>) -> Self {
        Self { pool, timer }
    }
}

#[async_trait]
impl DispatchHandler for LiftMovedHandler {
    async fn handle(&self, event: LiftRequestEvent) -> LiftResult<()> {
        // Arm first so the lift is released even if nobody is listening.
        self.timer.schedule(&event.id);

        let notification = Notification::lift_moved(&event);
        debug!(request_id = %event.id, lift_id = %event.lift_id, "dispatching lift");
        self.pool
            .broadcast(event.session_id, notification, event.created_by)
            .await
            .map_err(|e| LiftError::Busy(e.to_string()))
    }
}
