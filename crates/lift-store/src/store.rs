use tracing::{instrument, warn};

use lift_core::{Lift, LiftId, LiftRequest, LiftRequestId, Session, SessionId};

use crate::database::Database;
use crate::error::StoreError;
use crate::lifts::LiftRepo;
use crate::requests::{RequestFilter, RequestRepo};
use crate::sessions::SessionRepo;

/// Persistence contract of the dispatch core. Every method is a single
/// atomic operation. Writes that touch both a lift and a request commit
/// or roll back together, so a lift is busy exactly while a queued
/// request holds it.
pub trait DomainStore: Send + Sync {
    /// Session plus `lift_count` idle lifts on floor 0, in one transaction.
    fn insert_session(&self, floors: u32, lift_count: u32) -> Result<(Session, Vec<Lift>), StoreError>;
    fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;
    fn find_lifts(&self, session_id: &SessionId) -> Result<Vec<Lift>, StoreError>;
    fn find_lift(&self, id: &LiftId) -> Result<Option<Lift>, StoreError>;
    fn find_request(&self, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError>;
    fn find_requests(&self, filter: &RequestFilter) -> Result<Vec<LiftRequest>, StoreError>;
    fn find_queued_request(
        &self,
        session_id: &SessionId,
        floor: u32,
    ) -> Result<Option<LiftRequest>, StoreError>;
    /// Claim an idle lift of the session and queue a request for `floor`
    /// on it. `None` when every lift is busy.
    fn assign_lift(
        &self,
        session_id: &SessionId,
        floor: u32,
    ) -> Result<Option<(Lift, LiftRequest)>, StoreError>;
    /// queued -> completed, parking its lift idle at the requested floor.
    /// `None` when the request was not queued.
    fn complete_request(&self, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError>;
    /// Drop a queued request and free its lift where it stands.
    fn withdraw_request(&self, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError>;
}

/// SQLite-backed [`DomainStore`].
pub struct SqliteStore {
    db: Database,
    sessions: SessionRepo,
    lifts: LiftRepo,
    requests: RequestRepo,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            sessions: SessionRepo::new(db.clone()),
            lifts: LiftRepo::new(db.clone()),
            requests: RequestRepo::new(db.clone()),
            db,
        }
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::in_memory()?))
    }
}

impl DomainStore for SqliteStore {
    fn insert_session(&self, floors: u32, lift_count: u32) -> Result<(Session, Vec<Lift>), StoreError> {
        self.sessions.create(floors, lift_count)
    }

    fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.sessions.find(id)
    }

    fn find_lifts(&self, session_id: &SessionId) -> Result<Vec<Lift>, StoreError> {
        self.lifts.list_for_session(session_id)
    }

    fn find_lift(&self, id: &LiftId) -> Result<Option<Lift>, StoreError> {
        self.lifts.find(id)
    }

    fn find_request(&self, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError> {
        self.requests.find(id)
    }

    fn find_requests(&self, filter: &RequestFilter) -> Result<Vec<LiftRequest>, StoreError> {
        self.requests.list(filter)
    }

    fn find_queued_request(
        &self,
        session_id: &SessionId,
        floor: u32,
    ) -> Result<Option<LiftRequest>, StoreError> {
        self.requests.find_queued(session_id, floor)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    fn assign_lift(
        &self,
        session_id: &SessionId,
        floor: u32,
    ) -> Result<Option<(Lift, LiftRequest)>, StoreError> {
        self.db.with_tx(|tx| {
            let Some(lift) = LiftRepo::claim_idle(tx, session_id)? else {
                return Ok(None);
            };
            let request = RequestRepo::insert(tx, session_id, &lift.id, floor)?;
            Ok(Some((lift, request)))
        })
    }

    #[instrument(skip(self), fields(request_id = %id))]
    fn complete_request(&self, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError> {
        self.db.with_tx(|tx| {
            let Some(request) = RequestRepo::complete(tx, id)? else {
                return Ok(None);
            };
            if !LiftRepo::release(tx, &request.lift_id, Some(request.requested_floor))? {
                warn!(lift_id = %request.lift_id, "lift was not busy at completion");
            }
            Ok(Some(request))
        })
    }

    #[instrument(skip(self), fields(request_id = %id))]
    fn withdraw_request(&self, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError> {
        self.db.with_tx(|tx| {
            let Some(request) = RequestRepo::withdraw(tx, id)? else {
                return Ok(None);
            };
            if !LiftRepo::release(tx, &request.lift_id, None)? {
                warn!(lift_id = %request.lift_id, "lift was not busy at withdrawal");
            }
            Ok(Some(request))
        })
    }
}
