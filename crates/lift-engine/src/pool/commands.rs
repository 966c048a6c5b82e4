use serde::Serialize;
use tokio::sync::oneshot;

use lift_core::{Notification, ObserverId, SessionId};

use super::Observer;

pub enum PoolCommand {
    Register(Observer),
    Unregister(ObserverId),
    Broadcast {
        session_id: SessionId,
        notification: Notification,
        excluding: Option<ObserverId>,
    },
    Stats(oneshot::Sender<PoolStats>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub rooms: usize,
    pub observers: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("broadcast pool has stopped")]
    Stopped,
}
