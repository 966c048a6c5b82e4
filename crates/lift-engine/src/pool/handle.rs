use tokio::sync::{mpsc, oneshot};

use lift_core::{Notification, ObserverId, SessionId};

use super::commands::{PoolCommand, PoolError, PoolStats};
use super::Observer;

/// Cloneable front door to the pool actor.
#[derive(Clone)]
pub struct PoolHandle {
    tx: mpsc::Sender<PoolCommand>,
}

impl PoolHandle {
    pub(super) fn new(tx: mpsc::Sender<PoolCommand>) -> Self {
        Self { tx }
    }

    /// Join the observer to its session room. It receives `client_info`,
    /// the rest of the room receives `user_joined`.
    pub async fn register(&self, observer: Observer) -> Result<(), PoolError> {
        self.send(PoolCommand::Register(observer)).await
    }

    /// Leave the room. Unknown ids are ignored.
    pub async fn unregister(&self, observer_id: ObserverId) -> Result<(), PoolError> {
        self.send(PoolCommand::Unregister(observer_id)).await
    }

    /// Deliver to every member of the session room except `excluding`.
    pub async fn broadcast(
        &self,
        session_id: SessionId,
        notification: Notification,
        excluding: Option<ObserverId>,
    ) -> Result<(), PoolError> {
        self.send(PoolCommand::Broadcast {
            session_id,
            notification,
            excluding,
        })
        .await
    }

    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        let (reply, rx) = oneshot::channel();
        self.send(PoolCommand::Stats(reply)).await?;
        rx.await.map_err(|_| PoolError::Stopped)
    }

    async fn send(&self, cmd: PoolCommand) -> Result<(), PoolError> {
        self.tx.send(cmd).await.map_err(|_| PoolError::Stopped)
    }
}
