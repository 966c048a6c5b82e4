use serde::{Deserialize, Serialize};

use crate::ids::{LiftId, LiftRequestId, ObserverId, SessionId};
use crate::model::{LiftRequest, RequestStatus};

/// In-flight projection of a [`LiftRequest`] carried through the dispatch
/// queue. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiftRequestEvent {
    pub id: LiftRequestId,
    pub requested_floor: u32,
    pub lift_id: LiftId,
    pub session_id: SessionId,
    pub status: RequestStatus,
    /// Observer that triggered the request. Only used to skip echoing the
    /// notification back to it; `None` for replayed requests.
    pub created_by: Option<ObserverId>,
}

impl LiftRequestEvent {
    pub fn from_request(request: &LiftRequest, created_by: Option<ObserverId>) -> Self {
        Self {
            id: request.id.clone(),
            requested_floor: request.requested_floor,
            lift_id: request.lift_id.clone(),
            session_id: request.session_id.clone(),
            status: request.status,
            created_by,
        }
    }

    /// Rebuild the request this event was projected from.
    pub fn to_request(&self) -> LiftRequest {
        LiftRequest {
            id: self.id.clone(),
            requested_floor: self.requested_floor,
            lift_id: self.lift_id.clone(),
            session_id: self.session_id.clone(),
            status: self.status,
            created_at: String::new(),
            completed_at: None,
        }
    }
}

/// Notifications pushed to session observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    ClientInfo { observer_id: ObserverId },

    UserJoined,

    UserLeft,

    #[serde(rename_all = "camelCase")]
    LiftMoved {
        floor_requested: u32,
        lift_id: LiftId,
        request_id: LiftRequestId,
    },
}

impl Notification {
    pub fn lift_moved(event: &LiftRequestEvent) -> Self {
        Self::LiftMoved {
            floor_requested: event.requested_floor,
            lift_id: event.lift_id.clone(),
            request_id: event.id.clone(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ClientInfo { .. } => "client_info",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::LiftMoved { .. } => "lift_moved",
        }
    }
}

/// Wire frame written to an observer's connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub session_id: SessionId,
    pub body: Notification,
}

impl Envelope {
    pub fn new(session_id: SessionId, body: Notification) -> Self {
        Self { session_id, body }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
