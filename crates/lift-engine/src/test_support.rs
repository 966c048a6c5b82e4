use std::sync::Arc;

use lift_settings::{LimitSettings, StatusFilter};
use lift_store::{Database, SqliteStore};
use lift_telemetry::MetricsRecorder;

use crate::lifecycle::RequestLifecycle;

pub fn lifecycle() -> RequestLifecycle {
    lifecycle_with(Arc::new(MetricsRecorder::new()))
}

pub fn lifecycle_with(metrics: Arc<MetricsRecorder>) -> RequestLifecycle {
    build(Database::in_memory().unwrap(), metrics)
}

/// Lifecycle over `db`, so a test can reach the connection underneath.
pub fn lifecycle_on(db: Database) -> RequestLifecycle {
    build(db, Arc::new(MetricsRecorder::new()))
}

fn build(db: Database, metrics: Arc<MetricsRecorder>) -> RequestLifecycle {
    RequestLifecycle::new(
        Arc::new(SqliteStore::new(db)),
        LimitSettings::default(),
        StatusFilter::Queued,
        metrics,
    )
}
