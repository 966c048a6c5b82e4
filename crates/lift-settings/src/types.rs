//! Settings types. Every struct deserializes with defaults so partial
//! files are valid.

use std::collections::BTreeMap;

use lift_core::RequestStatus;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiftSettings {
    pub server: ServerSettings,
    pub dispatch: DispatchSettings,
    pub limits: LimitSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl LiftSettings {
    /// Reject combinations the dispatch core cannot run with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.dispatch;
        if d.queue_capacity == 0 {
            return Err(SettingsError::InvalidValue("queue capacity must be at least 1".into()));
        }
        if d.admission_margin >= d.queue_capacity {
            return Err(SettingsError::InvalidValue(format!(
                "admission margin {} >= queue capacity {}",
                d.admission_margin, d.queue_capacity
            )));
        }
        if self.limits.max_floors == 0 || self.limits.max_lifts == 0 {
            return Err(SettingsError::InvalidValue("session limits must be at least 1".into()));
        }
        if self.server.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue("max send queue must be at least 1".into()));
        }
        Ok(())
    }
}

/// HTTP / WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    pub port: u16,
    /// CORS origins. Empty or `*` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Per-observer outbound buffer; frames beyond it are dropped.
    pub max_send_queue: usize,
    pub heartbeat_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            allowed_origins: Vec::new(),
            max_send_queue: 256,
            heartbeat_interval_ms: 30_000,
        }
    }
}

/// Which requests `GET /session/{id}/request` returns when the caller
/// names no status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Queued,
    Completed,
    All,
}

impl StatusFilter {
    pub fn to_status(self) -> Option<RequestStatus> {
        match self {
            Self::Queued => Some(RequestStatus::Queued),
            Self::Completed => Some(RequestStatus::Completed),
            Self::All => None,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "completed" => Ok(Self::Completed),
            "all" => Ok(Self::All),
            other => Err(format!("unknown status filter: {other}")),
        }
    }
}

/// Dispatch queue and completion timer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchSettings {
    pub queue_capacity: usize,
    /// Admission is refused once occupancy reaches `capacity - margin`.
    pub admission_margin: usize,
    /// Simulated travel time before a request completes.
    pub completion_delay_ms: u64,
    pub default_request_filter: StatusFilter,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 108,
            admission_margin: 2,
            completion_delay_ms: 10_000,
            default_request_filter: StatusFilter::Queued,
        }
    }
}

/// Upper bounds on session size.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitSettings {
    pub max_floors: u32,
    pub max_lifts: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_floors: 200,
            max_lifts: 50,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite file path. `:memory:` keeps everything in process.
    pub db_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: crate::loader::lift_home().join("lift.db").display().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Per-crate level overrides, e.g. `{"lift_store": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = LiftSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.dispatch.queue_capacity, 108);
        assert_eq!(settings.dispatch.admission_margin, 2);
        assert_eq!(settings.dispatch.completion_delay_ms, 10_000);
        assert_eq!(settings.dispatch.default_request_filter, StatusFilter::Queued);
    }

    #[test]
    fn margin_must_be_below_capacity() {
        let mut settings = LiftSettings::default();
        settings.dispatch.queue_capacity = 4;
        settings.dispatch.admission_margin = 4;
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: LiftSettings =
            serde_json::from_str(r#"{"dispatch": {"queueCapacity": 16}}"#).unwrap();
        assert_eq!(settings.dispatch.queue_capacity, 16);
        assert_eq!(settings.dispatch.admission_margin, 2);
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn status_filter_maps_to_status() {
        assert_eq!(StatusFilter::Queued.to_status(), Some(RequestStatus::Queued));
        assert_eq!(StatusFilter::All.to_status(), None);
        assert_eq!("ALL".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert!("pending".parse::<StatusFilter>().is_err());
    }
}
