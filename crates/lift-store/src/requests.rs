use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::instrument;

use lift_core::{LiftId, LiftRequest, LiftRequestId, RequestStatus, SessionId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const REQUEST_COLUMNS: &str =
    "id, requested_floor, lift_id, session_id, status, created_at, completed_at";

/// Narrow a request listing. Empty filter lists everything.
#[derive(Clone, Debug, Default)]
pub struct RequestFilter {
    pub session_id: Option<SessionId>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn queued() -> Self {
        Self {
            session_id: None,
            status: Some(RequestStatus::Queued),
        }
    }
}

pub struct RequestRepo {
    db: Database,
}

impl RequestRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a queued request. The partial unique indexes turn a second
    /// active request for the same lift or floor into `Conflict`.
    pub fn insert(
        conn: &Connection,
        session_id: &SessionId,
        lift_id: &LiftId,
        floor: u32,
    ) -> Result<LiftRequest, StoreError> {
        let id = LiftRequestId::new();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO lift_requests (id, session_id, lift_id, requested_floor, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'queued', ?5)",
            rusqlite::params![id.as_str(), session_id.as_str(), lift_id.as_str(), floor, now],
        )?;

        Ok(LiftRequest {
            id,
            requested_floor: floor,
            lift_id: lift_id.clone(),
            session_id: session_id.clone(),
            status: RequestStatus::Queued,
            created_at: now,
            completed_at: None,
        })
    }

    #[instrument(skip(self), fields(request_id = %id))]
    pub fn find(&self, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM lift_requests WHERE id = ?1"
            ))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_request(row)?)),
                None => Ok(None),
            }
        })
    }

    /// The active request for `(session, floor)`, if any.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn find_queued(
        &self,
        session_id: &SessionId,
        floor: u32,
    ) -> Result<Option<LiftRequest>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM lift_requests
                 WHERE session_id = ?1 AND requested_floor = ?2 AND status = 'queued'"
            ))?;
            let mut rows = stmt.query(rusqlite::params![session_id.as_str(), floor])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_request(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Requests matching `filter` in creation order.
    #[instrument(skip(self))]
    pub fn list(&self, filter: &RequestFilter) -> Result<Vec<LiftRequest>, StoreError> {
        self.db.with_conn(|conn| {
            let mut clauses = Vec::new();
            let mut params: Vec<String> = Vec::new();
            if let Some(sid) = &filter.session_id {
                params.push(sid.as_str().to_string());
                clauses.push(format!("session_id = ?{}", params.len()));
            }
            if let Some(status) = filter.status {
                params.push(status.as_str().to_string());
                clauses.push(format!("status = ?{}", params.len()));
            }
            let where_clause = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };

            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM lift_requests {where_clause} ORDER BY rowid"
            ))?;
            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_request(row)?);
            }
            Ok(results)
        })
    }

    /// Queued -> completed. Returns the completed row, or `None` when the
    /// request was not queued.
    pub fn complete(conn: &Connection, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError> {
        let now = Utc::now().to_rfc3339();
        let completed = conn
            .query_row(
                &format!(
                    "UPDATE lift_requests SET status = 'completed', completed_at = ?2
                     WHERE id = ?1 AND status = 'queued'
                     RETURNING {REQUEST_COLUMNS}"
                ),
                rusqlite::params![id.as_str(), now],
                |row| Ok(row_to_request(row)),
            )
            .optional()?
            .transpose()?;
        Ok(completed)
    }

    /// Delete a request that is still queued. Returns the deleted row.
    pub fn withdraw(conn: &Connection, id: &LiftRequestId) -> Result<Option<LiftRequest>, StoreError> {
        let withdrawn = conn
            .query_row(
                &format!(
                    "DELETE FROM lift_requests WHERE id = ?1 AND status = 'queued'
                     RETURNING {REQUEST_COLUMNS}"
                ),
                [id.as_str()],
                |row| Ok(row_to_request(row)),
            )
            .optional()?
            .transpose()?;
        Ok(withdrawn)
    }
}

fn row_to_request(row: &rusqlite::Row<'_>) -> Result<LiftRequest, StoreError> {
    let status: String = row_helpers::get(row, 4, "lift_requests", "status")?;
    Ok(LiftRequest {
        id: LiftRequestId::from_raw(row_helpers::get::<String>(row, 0, "lift_requests", "id")?),
        requested_floor: row_helpers::get_u32(row, 1, "lift_requests", "requested_floor")?,
        lift_id: LiftId::from_raw(row_helpers::get::<String>(row, 2, "lift_requests", "lift_id")?),
        session_id: SessionId::from_raw(row_helpers::get::<String>(
            row,
            3,
            "lift_requests",
            "session_id",
        )?),
        status: row_helpers::parse_enum(&status, "lift_requests", "status")?,
        created_at: row_helpers::get(row, 5, "lift_requests", "created_at")?,
        completed_at: row_helpers::get_opt(row, 6, "lift_requests", "completed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifts::LiftRepo;
    use crate::sessions::SessionRepo;
    use lift_core::Lift;

    fn setup(lifts: u32) -> (RequestRepo, SessionId, Vec<Lift>) {
        let db = Database::in_memory().unwrap();
        let (session, lifts) = SessionRepo::new(db.clone()).create(10, lifts).unwrap();
        (RequestRepo::new(db), session.id, lifts)
    }

    fn insert(repo: &RequestRepo, sid: &SessionId, lift: &LiftId, floor: u32) -> Result<LiftRequest, StoreError> {
        repo.db.with_conn(|conn| RequestRepo::insert(conn, sid, lift, floor))
    }

    fn complete(repo: &RequestRepo, id: &LiftRequestId) -> Option<LiftRequest> {
        repo.db.with_conn(|conn| RequestRepo::complete(conn, id)).unwrap()
    }

    fn session_filter(sid: &SessionId, status: Option<RequestStatus>) -> RequestFilter {
        RequestFilter {
            session_id: Some(sid.clone()),
            status,
        }
    }

    #[test]
    fn insert_and_find() {
        let (repo, sid, lifts) = setup(1);
        let req = insert(&repo, &sid, &lifts[0].id, 4).unwrap();
        assert_eq!(req.status, RequestStatus::Queued);
        assert!(req.id.as_str().starts_with("req_"));

        let found = repo.find(&req.id).unwrap().unwrap();
        assert_eq!(found, req);
        assert_eq!(repo.find_queued(&sid, 4).unwrap().unwrap().id, req.id);
        assert!(repo.find_queued(&sid, 5).unwrap().is_none());
    }

    #[test]
    fn second_active_request_for_lift_conflicts() {
        let (repo, sid, lifts) = setup(1);
        insert(&repo, &sid, &lifts[0].id, 4).unwrap();
        let err = insert(&repo, &sid, &lifts[0].id, 6).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn second_active_request_for_floor_conflicts() {
        let (repo, sid, lifts) = setup(2);
        insert(&repo, &sid, &lifts[0].id, 4).unwrap();
        let err = insert(&repo, &sid, &lifts[1].id, 4).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn complete_is_conditional() {
        let (repo, sid, lifts) = setup(1);
        let req = insert(&repo, &sid, &lifts[0].id, 2).unwrap();

        let completed = complete(&repo, &req.id).unwrap();
        assert!(completed.is_completed());
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.lift_id, lifts[0].id);
        assert!(complete(&repo, &req.id).is_none());
        assert_eq!(repo.find(&req.id).unwrap().unwrap(), completed);

        // Completed requests no longer block the floor or the lift.
        insert(&repo, &sid, &lifts[0].id, 2).unwrap();
    }

    #[test]
    fn withdraw_only_removes_queued_requests() {
        let (repo, sid, lifts) = setup(2);
        let queued = insert(&repo, &sid, &lifts[0].id, 3).unwrap();
        let done = insert(&repo, &sid, &lifts[1].id, 5).unwrap();
        complete(&repo, &done.id).unwrap();

        let withdraw = |id: &LiftRequestId| repo.db.with_conn(|conn| RequestRepo::withdraw(conn, id)).unwrap();
        assert_eq!(withdraw(&queued.id), Some(queued.clone()));
        assert!(withdraw(&queued.id).is_none());
        assert!(withdraw(&done.id).is_none());

        assert!(repo.find(&queued.id).unwrap().is_none());
        assert!(repo.find(&done.id).unwrap().is_some());
    }

    #[test]
    fn list_filters_and_orders() {
        let (repo, sid, lifts) = setup(3);
        let a = insert(&repo, &sid, &lifts[0].id, 1).unwrap();
        let b = insert(&repo, &sid, &lifts[1].id, 2).unwrap();
        let c = insert(&repo, &sid, &lifts[2].id, 3).unwrap();
        complete(&repo, &b.id).unwrap();

        let all = repo.list(&session_filter(&sid, None)).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![a.id.clone(), b.id.clone(), c.id.clone()]);

        let queued = repo.list(&session_filter(&sid, Some(RequestStatus::Queued))).unwrap();
        assert_eq!(queued.len(), 2);

        let completed = repo.list(&session_filter(&sid, Some(RequestStatus::Completed))).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, b.id);
    }

    #[test]
    fn queued_filter_spans_sessions() {
        let db = Database::in_memory().unwrap();
        let sessions = SessionRepo::new(db.clone());
        let repo = RequestRepo::new(db.clone());
        let (s1, _) = sessions.create(5, 1).unwrap();
        let (s2, _) = sessions.create(5, 1).unwrap();

        let (r1, r2) = db
            .with_conn(|conn| {
                let l1 = LiftRepo::claim_idle(conn, &s1.id)?.unwrap();
                let l2 = LiftRepo::claim_idle(conn, &s2.id)?.unwrap();
                Ok((
                    RequestRepo::insert(conn, &s1.id, &l1.id, 3)?,
                    RequestRepo::insert(conn, &s2.id, &l2.id, 3)?,
                ))
            })
            .unwrap();

        let queued = repo.list(&RequestFilter::queued()).unwrap();
        let ids: Vec<_> = queued.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![r1.id, r2.id]);
    }
}
