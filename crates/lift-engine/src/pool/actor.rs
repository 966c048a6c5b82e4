use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use lift_core::{Envelope, Notification, ObserverId, SessionId};
use lift_telemetry::MetricsRecorder;

use super::commands::{PoolCommand, PoolStats};
use super::Observer;

type Room = HashMap<ObserverId, Observer>;

/// Owns the room map. Only the actor task touches it.
pub struct PoolActor {
    rx: mpsc::Receiver<PoolCommand>,
    rooms: HashMap<SessionId, Room>,
    // observer -> session, for unregister by id
    index: HashMap<ObserverId, SessionId>,
    metrics: Arc<MetricsRecorder>,
}

impl PoolActor {
    pub fn new(rx: mpsc::Receiver<PoolCommand>, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            rx,
            rooms: HashMap::new(),
            index: HashMap::new(),
            metrics,
        }
    }

    pub async fn run(mut self) {
        debug!("broadcast pool started");
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                PoolCommand::Register(observer) => self.register(observer),
                PoolCommand::Unregister(id) => {
                    let closed = self.remove(&id);
                    self.evict(closed);
                }
                PoolCommand::Broadcast {
                    session_id,
                    notification,
                    excluding,
                } => {
                    let closed = self.deliver(&session_id, &notification, excluding.as_ref());
                    self.evict(closed);
                }
                PoolCommand::Stats(reply) => {
                    let _ = reply.send(self.stats());
                }
            }
            self.record_gauges();
        }
        info!(rooms = self.rooms.len(), "broadcast pool stopped");
    }

    fn register(&mut self, observer: Observer) {
        let id = observer.id.clone();
        let session_id = observer.session_id.clone();

        if self.index.contains_key(&id) {
            warn!(observer_id = %id, "observer already registered, ignoring");
            return;
        }

        let info = Notification::ClientInfo {
            observer_id: id.clone(),
        };
        let mut closed = Vec::new();
        if !self.send_to(&observer, &session_id, &info) {
            closed.push(id.clone());
        }

        self.index.insert(id.clone(), session_id.clone());
        self.rooms
            .entry(session_id.clone())
            .or_default()
            .insert(id.clone(), observer);
        info!(observer_id = %id, session_id = %session_id, "observer joined");

        closed.extend(self.deliver(&session_id, &Notification::UserJoined, Some(&id)));
        self.evict(closed);
    }

    /// Remove an observer and tell the rest of its room. Returns members
    /// found closed while notifying.
    fn remove(&mut self, id: &ObserverId) -> Vec<ObserverId> {
        let Some(session_id) = self.index.remove(id) else {
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(&session_id) else {
            return Vec::new();
        };
        room.remove(id);
        info!(observer_id = %id, session_id = %session_id, "observer left");

        if room.is_empty() {
            self.rooms.remove(&session_id);
            debug!(session_id = %session_id, "room closed");
            return Vec::new();
        }
        self.deliver(&session_id, &Notification::UserLeft, None)
    }

    fn evict(&mut self, mut closed: Vec<ObserverId>) {
        while let Some(id) = closed.pop() {
            debug!(observer_id = %id, "evicting closed observer");
            closed.extend(self.remove(&id));
        }
    }

    /// Send to every room member except `excluding`. No room is a no-op.
    fn deliver(
        &self,
        session_id: &SessionId,
        notification: &Notification,
        excluding: Option<&ObserverId>,
    ) -> Vec<ObserverId> {
        let Some(room) = self.rooms.get(session_id) else {
            return Vec::new();
        };
        room.values()
            .filter(|o| Some(&o.id) != excluding)
            .filter(|o| !self.send_to(o, session_id, notification))
            .map(|o| o.id.clone())
            .collect()
    }

    /// Returns false when the observer's channel is closed.
    fn send_to(&self, observer: &Observer, session_id: &SessionId, notification: &Notification) -> bool {
        let event = notification.event_type();
        let frame = match Envelope::new(session_id.clone(), notification.clone()).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event, error = %e, "failed to serialize notification");
                return true;
            }
        };

        match observer.tx.try_send(frame) {
            Ok(()) => {
                self.metrics.counter_inc("pool.messages.sent", &[("event", event)], 1);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.counter_inc("pool.messages.dropped", &[("reason", "full")], 1);
                warn!(observer_id = %observer.id, event, "observer send queue full, dropping message");
                true
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.counter_inc("pool.messages.dropped", &[("reason", "closed")], 1);
                false
            }
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            rooms: self.rooms.len(),
            observers: self.index.len(),
        }
    }

    fn record_gauges(&self) {
        self.metrics.gauge_set("pool.rooms", &[], self.rooms.len() as f64);
        self.metrics.gauge_set("pool.observers", &[], self.index.len() as f64);
    }
}
