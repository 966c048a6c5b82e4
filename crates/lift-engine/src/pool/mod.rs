//! Per-session broadcast pool, run as an actor.
//!
//! One control task owns the room map (`SessionId -> {ObserverId -> Observer}`)
//! and processes [`PoolCommand`]s in arrival order. [`PoolHandle`] is the
//! cloneable front door used by the transport and the dispatch handler.
//!
//! Delivery never blocks the control task: every frame goes out through
//! `try_send`. A full observer channel drops the frame, a closed one gets
//! the observer evicted.

use std::sync::Arc;

use tokio::sync::mpsc;

use lift_core::{ObserverId, SessionId};
use lift_telemetry::MetricsRecorder;

mod actor;
mod commands;
mod handle;

pub use actor::PoolActor;
pub use commands::{PoolCommand, PoolError, PoolStats};
pub use handle::PoolHandle;

const COMMAND_BUFFER: usize = 256;

/// A connected session observer and the channel its frames are written to.
#[derive(Clone, Debug)]
pub struct Observer {
    pub id: ObserverId,
    pub session_id: SessionId,
    pub tx: mpsc::Sender<String>,
}

impl Observer {
    /// New observer with a fresh id and a bounded outbound channel.
    pub fn channel(session_id: SessionId, buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                id: ObserverId::new(),
                session_id,
                tx,
            },
            rx,
        )
    }
}

/// Spawn the pool actor and return a handle to it. The actor stops once
/// every handle is dropped.
pub fn spawn_pool(metrics: Arc<MetricsRecorder>) -> PoolHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let actor = PoolActor::new(cmd_rx, metrics);
    tokio::spawn(actor.run());
    PoolHandle::new(cmd_tx)
}
