use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use lift_core::{
    LiftError, LiftId, LiftRequest, LiftRequestId, LiftRequestView, LiftResult, SessionId,
    SessionView,
};
use lift_settings::{LimitSettings, StatusFilter};
use lift_store::{DomainStore, RequestFilter};
use lift_telemetry::MetricsRecorder;

/// Owns every state transition of sessions, lifts and requests.
///
/// The store claims a lift and inserts its request in one transaction, and
/// completes a request and releases its lift in another. `claim_lock` keeps
/// the duplicate-floor check and the claim together within the process; the
/// partial unique indexes back it up across processes.
pub struct RequestLifecycle {
    store: Arc<dyn DomainStore>,
    claim_lock: Mutex<()>,
    limits: LimitSettings,
    default_filter: StatusFilter,
    metrics: Arc<MetricsRecorder>,
}

impl RequestLifecycle {
    pub fn new(
        store: Arc<dyn DomainStore>,
        limits: LimitSettings,
        default_filter: StatusFilter,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            store,
            claim_lock: Mutex::new(()),
            limits,
            default_filter,
            metrics,
        }
    }

    /// Provision a session with `lifts` idle lifts parked on floor 0.
    #[instrument(skip(self))]
    pub fn create_session(&self, floors: i64, lifts: i64) -> LiftResult<SessionView> {
        let floors = bounded_count("floors", floors, self.limits.max_floors)?;
        let lifts = bounded_count("lifts", lifts, self.limits.max_lifts)?;

        let (session, lifts) = self.store.insert_session(floors, lifts)?;
        info!(session_id = %session.id, floors, lifts = lifts.len(), "session created");

        Ok(SessionView {
            id: session.id,
            floors: session.floors,
            lifts,
            created_at: session.created_at,
        })
    }

    /// Assign an idle lift of the session to `floor` and persist the
    /// queued request.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn create_lift_request(&self, session_id: &SessionId, floor: i64) -> LiftResult<LiftRequestView> {
        let session = self.require_session(session_id)?;
        if !session.has_floor(floor) {
            return Err(LiftError::invalid(format!(
                "floor {floor} is outside 0..{} for session {session_id}",
                session.floors
            )));
        }
        // has_floor bounds it to 0..floors
        let floor = floor as u32;

        let _claim = self.claim_lock.lock();

        if let Some(existing) = self.store.find_queued_request(session_id, floor)? {
            return Err(LiftError::Conflict(format!(
                "lift already called to floor {floor} (request {})",
                existing.id
            )));
        }

        let Some((lift, request)) = self.store.assign_lift(session_id, floor)? else {
            return Err(LiftError::ResourceExhausted(format!(
                "no lift available in session {session_id}"
            )));
        };

        self.metrics.counter_inc("lifecycle.requests.created", &[], 1);
        info!(request_id = %request.id, lift_id = %lift.id, floor, "lift request queued");

        Ok(LiftRequestView { request, lift })
    }

    /// Mark the request completed and park its lift at the requested floor.
    /// Completing an already completed request is a no-op.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub fn complete_lift_request(&self, request_id: &LiftRequestId) -> LiftResult<()> {
        let request = self
            .store
            .find_request(request_id)?
            .ok_or_else(|| LiftError::not_found(format!("lift request {request_id}")))?;

        if request.is_completed() {
            debug!("request already completed");
            return Ok(());
        }

        let Some(completed) = self.store.complete_request(request_id)? else {
            debug!("request completed concurrently");
            return Ok(());
        };

        self.metrics.counter_inc("lifecycle.requests.completed", &[], 1);
        info!(
            lift_id = %completed.lift_id,
            floor = completed.requested_floor,
            "lift request completed"
        );
        Ok(())
    }

    /// Undo a queued request that could not be dispatched: the row is
    /// removed and its lift freed without moving.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub fn withdraw_lift_request(&self, request_id: &LiftRequestId) -> LiftResult<()> {
        match self.store.withdraw_request(request_id)? {
            Some(withdrawn) => {
                info!(lift_id = %withdrawn.lift_id, "lift request withdrawn");
                Ok(())
            }
            None => Err(LiftError::not_found(format!("queued lift request {request_id}"))),
        }
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn get_session(&self, session_id: &SessionId) -> LiftResult<SessionView> {
        let session = self.require_session(session_id)?;
        let lifts = self.store.find_lifts(session_id)?;
        Ok(SessionView {
            id: session.id,
            floors: session.floors,
            lifts,
            created_at: session.created_at,
        })
    }

    /// Requests in creation order, optionally scoped to a session. `status`
    /// accepts `queued`, `completed` or `all`; `None` applies the
    /// configured default filter.
    #[instrument(skip(self))]
    pub fn get_lift_requests(
        &self,
        session_id: Option<&SessionId>,
        status: Option<&str>,
    ) -> LiftResult<Vec<LiftRequestView>> {
        let filter = match status {
            Some(raw) => raw.trim().parse::<StatusFilter>().map_err(LiftError::InvalidArgument)?,
            None => self.default_filter,
        };

        let mut lifts: HashMap<LiftId, lift_core::Lift> = HashMap::new();
        if let Some(sid) = session_id {
            self.require_session(sid)?;
            for lift in self.store.find_lifts(sid)? {
                lifts.insert(lift.id.clone(), lift);
            }
        }

        let requests = self.store.find_requests(&RequestFilter {
            session_id: session_id.cloned(),
            status: filter.to_status(),
        })?;

        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let lift = match lifts.get(&request.lift_id) {
                Some(lift) => lift.clone(),
                None => {
                    let lift = self.store.find_lift(&request.lift_id)?.ok_or_else(|| {
                        LiftError::StoreUnavailable(format!(
                            "lift {} of request {} is missing",
                            request.lift_id, request.id
                        ))
                    })?;
                    lifts.insert(lift.id.clone(), lift.clone());
                    lift
                }
            };
            views.push(LiftRequestView { request, lift });
        }
        Ok(views)
    }

    /// Every queued request across sessions, oldest first.
    pub fn queued_requests(&self) -> LiftResult<Vec<LiftRequest>> {
        Ok(self.store.find_requests(&RequestFilter::queued())?)
    }

    fn require_session(&self, session_id: &SessionId) -> LiftResult<lift_core::Session> {
        if session_id.is_blank() {
            return Err(LiftError::invalid("session id must not be empty"));
        }
        self.store
            .find_session(session_id)?
            .ok_or_else(|| LiftError::not_found(format!("session {session_id}")))
    }
}

fn bounded_count(name: &str, value: i64, max: u32) -> LiftResult<u32> {
    if value < 1 {
        return Err(LiftError::invalid(format!("{name} must be at least 1, got {value}")));
    }
    if value > i64::from(max) {
        return Err(LiftError::invalid(format!("{name} must be at most {max}, got {value}")));
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{lifecycle, lifecycle_on};
    use lift_core::{LiftStatus, RequestStatus};
    use lift_store::Database;

    /// Abort every write matching `event` on `table` inside SQLite.
    fn break_writes(db: &Database, event: &str, table: &str) {
        db.with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE TRIGGER broken BEFORE {event} ON {table}
                 BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;"
            ))?;
            Ok(())
        })
        .unwrap();
    }

    fn mend_writes(db: &Database) {
        db.with_conn(|conn| {
            conn.execute_batch("DROP TRIGGER broken;")?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn create_session_provisions_idle_lifts() {
        let lc = lifecycle();
        let view = lc.create_session(10, 3).unwrap();
        assert_eq!(view.floors, 10);
        assert_eq!(view.lifts.len(), 3);
        assert!(view.lifts.iter().all(|l| l.status == LiftStatus::Idle && l.current_floor == 0));
        assert_eq!(lc.get_session(&view.id).unwrap(), view);
    }

    #[test]
    fn create_session_rejects_bad_counts() {
        let lc = lifecycle();
        assert!(matches!(lc.create_session(0, 2), Err(LiftError::InvalidArgument(_))));
        assert!(matches!(lc.create_session(5, 0), Err(LiftError::InvalidArgument(_))));
        assert!(matches!(lc.create_session(-3, 1), Err(LiftError::InvalidArgument(_))));
        assert!(matches!(lc.create_session(201, 1), Err(LiftError::InvalidArgument(_))));
        assert!(matches!(lc.create_session(5, 51), Err(LiftError::InvalidArgument(_))));
    }

    #[test]
    fn request_assigns_idle_lift() {
        let lc = lifecycle();
        let session = lc.create_session(10, 2).unwrap();

        let view = lc.create_lift_request(&session.id, 7).unwrap();
        assert_eq!(view.request.requested_floor, 7);
        assert_eq!(view.request.status, RequestStatus::Queued);
        assert_eq!(view.lift.status, LiftStatus::Busy);
        assert_eq!(view.request.lift_id, view.lift.id);

        let after = lc.get_session(&session.id).unwrap();
        assert_eq!(after.busy_lifts(), 1);
    }

    #[test]
    fn request_validates_session_and_floor() {
        let lc = lifecycle();
        let session = lc.create_session(5, 1).unwrap();

        let blank = SessionId::from_raw("  ");
        assert!(matches!(lc.create_lift_request(&blank, 1), Err(LiftError::InvalidArgument(_))));

        let unknown = SessionId::from_raw("sess_unknown");
        assert!(matches!(lc.create_lift_request(&unknown, 1), Err(LiftError::NotFound(_))));

        assert!(matches!(lc.create_lift_request(&session.id, 5), Err(LiftError::InvalidArgument(_))));
        assert!(matches!(lc.create_lift_request(&session.id, -1), Err(LiftError::InvalidArgument(_))));

        // Nothing was claimed by the failed calls.
        assert_eq!(lc.get_session(&session.id).unwrap().busy_lifts(), 0);
    }

    #[test]
    fn duplicate_floor_is_conflict() {
        let lc = lifecycle();
        let session = lc.create_session(10, 3).unwrap();
        lc.create_lift_request(&session.id, 4).unwrap();

        let err = lc.create_lift_request(&session.id, 4).unwrap_err();
        assert!(matches!(err, LiftError::Conflict(_)), "got {err:?}");
        assert_eq!(lc.get_session(&session.id).unwrap().busy_lifts(), 1);
    }

    #[test]
    fn all_lifts_busy_is_resource_exhausted() {
        let lc = lifecycle();
        let session = lc.create_session(10, 2).unwrap();
        lc.create_lift_request(&session.id, 1).unwrap();
        lc.create_lift_request(&session.id, 2).unwrap();

        let err = lc.create_lift_request(&session.id, 3).unwrap_err();
        assert!(matches!(err, LiftError::ResourceExhausted(_)));
    }

    #[test]
    fn sessions_do_not_share_lifts() {
        let lc = lifecycle();
        let a = lc.create_session(10, 1).unwrap();
        let b = lc.create_session(10, 1).unwrap();

        let ra = lc.create_lift_request(&a.id, 3).unwrap();
        let rb = lc.create_lift_request(&b.id, 3).unwrap();
        assert_eq!(ra.lift.session_id, a.id);
        assert_eq!(rb.lift.session_id, b.id);
    }

    #[test]
    fn completion_parks_lift_and_is_idempotent() {
        let lc = lifecycle();
        let session = lc.create_session(10, 1).unwrap();
        let view = lc.create_lift_request(&session.id, 6).unwrap();

        lc.complete_lift_request(&view.request.id).unwrap();
        let after = lc.get_session(&session.id).unwrap();
        assert_eq!(after.lifts[0].status, LiftStatus::Idle);
        assert_eq!(after.lifts[0].current_floor, 6);

        lc.complete_lift_request(&view.request.id).unwrap();
        assert_eq!(lc.get_session(&session.id).unwrap(), after);

        // The freed lift serves the next call.
        let next = lc.create_lift_request(&session.id, 6).unwrap();
        assert_eq!(next.lift.id, view.lift.id);
    }

    #[test]
    fn completing_unknown_request_is_not_found() {
        let lc = lifecycle();
        let err = lc.complete_lift_request(&LiftRequestId::from_raw("req_missing")).unwrap_err();
        assert!(matches!(err, LiftError::NotFound(_)));
    }

    #[test]
    fn busy_lifts_match_queued_requests() {
        let lc = lifecycle();
        let session = lc.create_session(20, 4).unwrap();
        let mut queued = Vec::new();
        for floor in [3, 9, 12] {
            queued.push(lc.create_lift_request(&session.id, floor).unwrap());
        }
        lc.complete_lift_request(&queued[1].request.id).unwrap();

        let view = lc.get_session(&session.id).unwrap();
        let open = lc.get_lift_requests(Some(&session.id), Some("queued")).unwrap();
        assert_eq!(view.busy_lifts(), open.len());
        for req in &open {
            let lift = view.lifts.iter().find(|l| l.id == req.request.lift_id).unwrap();
            assert_eq!(lift.status, LiftStatus::Busy);
        }
    }

    #[test]
    fn concurrent_calls_on_single_lift_session() {
        let lc = lifecycle();
        let session = lc.create_session(10, 1).unwrap();

        let results: Vec<LiftResult<LiftRequestView>> = std::thread::scope(|s| {
            let handles: Vec<_> = (1..=2)
                .map(|floor| {
                    let lc = &lc;
                    let sid = &session.id;
                    s.spawn(move || lc.create_lift_request(sid, floor))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let exhausted = results
            .iter()
            .filter(|r| matches!(r, Err(LiftError::ResourceExhausted(_))))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(exhausted, 1);
        assert_eq!(lc.queued_requests().unwrap().len(), 1);
    }

    #[test]
    fn listing_applies_status_filter() {
        let lc = lifecycle();
        let session = lc.create_session(10, 3).unwrap();
        let first = lc.create_lift_request(&session.id, 1).unwrap();
        let second = lc.create_lift_request(&session.id, 2).unwrap();
        lc.complete_lift_request(&first.request.id).unwrap();

        let default = lc.get_lift_requests(Some(&session.id), None).unwrap();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].request.id, second.request.id);

        let completed = lc.get_lift_requests(Some(&session.id), Some("COMPLETED")).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].lift.current_floor, 1);

        let all = lc.get_lift_requests(Some(&session.id), Some("all")).unwrap();
        let ids: Vec<_> = all.iter().map(|v| v.request.id.clone()).collect();
        assert_eq!(ids, vec![first.request.id, second.request.id]);

        let err = lc.get_lift_requests(Some(&session.id), Some("moving")).unwrap_err();
        assert!(matches!(err, LiftError::InvalidArgument(_)));

        let unknown = SessionId::from_raw("sess_gone");
        assert!(matches!(lc.get_lift_requests(Some(&unknown), None), Err(LiftError::NotFound(_))));
    }

    #[test]
    fn listing_without_session_spans_all() {
        let lc = lifecycle();
        let a = lc.create_session(10, 1).unwrap();
        let b = lc.create_session(10, 1).unwrap();
        lc.create_lift_request(&a.id, 2).unwrap();
        lc.create_lift_request(&b.id, 2).unwrap();

        let views = lc.get_lift_requests(None, None).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].lift.session_id, a.id);
        assert_eq!(views[1].lift.session_id, b.id);
    }

    #[test]
    fn request_counters_recorded() {
        let metrics = Arc::new(MetricsRecorder::new());
        let lc = crate::test_support::lifecycle_with(Arc::clone(&metrics));
        let session = lc.create_session(5, 1).unwrap();
        let view = lc.create_lift_request(&session.id, 2).unwrap();
        lc.complete_lift_request(&view.request.id).unwrap();

        assert_eq!(metrics.counter_get("lifecycle.requests.created", &[]), 1);
        assert_eq!(metrics.counter_get("lifecycle.requests.completed", &[]), 1);
    }

    #[test]
    fn failed_completion_can_be_retried_without_losing_the_lift() {
        let db = Database::in_memory().unwrap();
        let lc = lifecycle_on(db.clone());
        let session = lc.create_session(5, 1).unwrap();
        let view = lc.create_lift_request(&session.id, 3).unwrap();

        break_writes(&db, "UPDATE", "lifts");
        assert!(lc.complete_lift_request(&view.request.id).is_err());
        assert_eq!(lc.queued_requests().unwrap().len(), 1);
        assert_eq!(lc.get_session(&session.id).unwrap().busy_lifts(), 1);

        mend_writes(&db);
        lc.complete_lift_request(&view.request.id).unwrap();
        let lift = &lc.get_session(&session.id).unwrap().lifts[0];
        assert_eq!(lift.status, LiftStatus::Idle);
        assert_eq!(lift.current_floor, 3);

        let next = lc.create_lift_request(&session.id, 2).unwrap();
        assert_eq!(next.lift.id, view.lift.id);
    }

    #[test]
    fn failed_insert_does_not_claim_a_lift() {
        let db = Database::in_memory().unwrap();
        let lc = lifecycle_on(db.clone());
        let session = lc.create_session(5, 1).unwrap();

        break_writes(&db, "INSERT", "lift_requests");
        assert!(lc.create_lift_request(&session.id, 3).is_err());
        assert_eq!(lc.get_session(&session.id).unwrap().busy_lifts(), 0);

        mend_writes(&db);
        lc.create_lift_request(&session.id, 3).unwrap();
    }

    #[test]
    fn withdrawn_request_frees_its_lift() {
        let lc = lifecycle();
        let session = lc.create_session(5, 1).unwrap();
        let view = lc.create_lift_request(&session.id, 4).unwrap();

        lc.withdraw_lift_request(&view.request.id).unwrap();
        let after = lc.get_session(&session.id).unwrap();
        assert_eq!(after.busy_lifts(), 0);
        assert_eq!(after.lifts[0].current_floor, 0);
        assert!(lc.get_lift_requests(Some(&session.id), Some("all")).unwrap().is_empty());

        let err = lc.withdraw_lift_request(&view.request.id).unwrap_err();
        assert!(matches!(err, LiftError::NotFound(_)));
    }
}
