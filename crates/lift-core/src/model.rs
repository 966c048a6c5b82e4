use serde::{Deserialize, Serialize};

use crate::ids::{LiftId, LiftRequestId, SessionId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftStatus {
    Idle,
    Busy,
}

impl LiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
        }
    }
}

impl std::fmt::Display for LiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LiftStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            other => Err(format!("invalid lift status {other:?}, valid statuses are idle, busy")),
        }
    }
}

/// `Queued` is the only non-terminal state; `Completed` is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "completed" => Ok(Self::Completed),
            other => Err(format!(
                "invalid request status {other:?}, valid statuses are queued, completed"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lift {
    pub id: LiftId,
    pub session_id: SessionId,
    /// Order of the lift within its session, starting at 0.
    pub position: u32,
    pub current_floor: u32,
    pub status: LiftStatus,
}

impl Lift {
    pub fn is_idle(&self) -> bool {
        self.status == LiftStatus::Idle
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub floors: u32,
    pub lifts: Vec<LiftId>,
    pub created_at: String,
}

impl Session {
    /// Whether `floor` lies inside the building.
    pub fn has_floor(&self, floor: i64) -> bool {
        floor >= 0 && floor < i64::from(self.floors)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftRequest {
    pub id: LiftRequestId,
    pub requested_floor: u32,
    pub lift_id: LiftId,
    pub session_id: SessionId,
    pub status: RequestStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl LiftRequest {
    pub fn is_completed(&self) -> bool {
        self.status == RequestStatus::Completed
    }
}

/// A session with its lifts resolved, in session order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: SessionId,
    pub floors: u32,
    pub lifts: Vec<Lift>,
    pub created_at: String,
}

impl SessionView {
    pub fn busy_lifts(&self) -> usize {
        self.lifts.iter().filter(|l| !l.is_idle()).count()
    }
}

/// A lift request with its assigned lift denormalized for the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftRequestView {
    #[serde(flatten)]
    pub request: LiftRequest,
    pub lift: Lift,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("QUEUED".parse::<RequestStatus>().unwrap(), RequestStatus::Queued);
        assert_eq!("Completed".parse::<RequestStatus>().unwrap(), RequestStatus::Completed);
        assert_eq!("Idle".parse::<LiftStatus>().unwrap(), LiftStatus::Idle);
    }

    #[test]
    fn status_parse_rejects_unknown() {
        let err = "moving".parse::<RequestStatus>().unwrap_err();
        assert!(err.contains("queued, completed"), "got: {err}");
        assert!("broken".parse::<LiftStatus>().is_err());
    }

    #[test]
    fn has_floor_bounds() {
        let session = Session {
            id: SessionId::new(),
            floors: 5,
            lifts: vec![],
            created_at: String::new(),
        };
        assert!(session.has_floor(0));
        assert!(session.has_floor(4));
        assert!(!session.has_floor(5));
        assert!(!session.has_floor(-1));
    }

    #[test]
    fn request_view_flattens_request_fields() {
        let session_id = SessionId::new();
        let lift = Lift {
            id: LiftId::from_raw("lift_1"),
            session_id: session_id.clone(),
            position: 0,
            current_floor: 0,
            status: LiftStatus::Busy,
        };
        let view = LiftRequestView {
            request: LiftRequest {
                id: LiftRequestId::from_raw("req_1"),
                requested_floor: 3,
                lift_id: lift.id.clone(),
                session_id,
                status: RequestStatus::Queued,
                created_at: "2026-01-01T00:00:00Z".into(),
                completed_at: None,
            },
            lift,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["requestedFloor"], 3);
        assert_eq!(json["status"], "queued");
        assert_eq!(json["lift"]["status"], "busy");
        assert!(json.get("completedAt").is_none());
    }
}
