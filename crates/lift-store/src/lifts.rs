use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use lift_core::{Lift, LiftId, SessionId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const LIFT_COLUMNS: &str = "id, session_id, position, current_floor, status";

pub struct LiftRepo {
    db: Database,
}

impl LiftRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Lifts of a session in position order.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<Lift>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LIFT_COLUMNS} FROM lifts WHERE session_id = ?1 ORDER BY position"
            ))?;
            let mut rows = stmt.query([session_id.as_str()])?;
            let mut lifts = Vec::new();
            while let Some(row) = rows.next()? {
                lifts.push(row_to_lift(row)?);
            }
            Ok(lifts)
        })
    }

    #[instrument(skip(self), fields(lift_id = %id))]
    pub fn find(&self, id: &LiftId) -> Result<Option<Lift>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {LIFT_COLUMNS} FROM lifts WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_lift(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Flip the lowest-positioned idle lift of the session to busy and
    /// return it. The `status = 'idle'` guard makes the update conditional,
    /// so two claimers can never win the same lift. Runs on the caller's
    /// connection so it can share a transaction.
    pub fn claim_idle(conn: &Connection, session_id: &SessionId) -> Result<Option<Lift>, StoreError> {
        let now = Utc::now().to_rfc3339();
        let claimed = conn
            .query_row(
                &format!(
                    "UPDATE lifts SET status = 'busy', updated_at = ?2
                     WHERE id = (
                         SELECT id FROM lifts
                         WHERE session_id = ?1 AND status = 'idle'
                         ORDER BY position LIMIT 1
                     ) AND status = 'idle'
                     RETURNING {LIFT_COLUMNS}"
                ),
                rusqlite::params![session_id.as_str(), now],
                |row| Ok(row_to_lift(row)),
            )
            .optional()?
            .transpose()?;

        if let Some(lift) = &claimed {
            debug!(lift_id = %lift.id, position = lift.position, "lift claimed");
        }
        Ok(claimed)
    }

    /// Busy -> idle. `floor` parks the lift there; `None` leaves it where it
    /// was. Returns false when the lift was not busy.
    pub fn release(conn: &Connection, id: &LiftId, floor: Option<u32>) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE lifts SET status = 'idle', current_floor = COALESCE(?2, current_floor), updated_at = ?3
             WHERE id = ?1 AND status = 'busy'",
            rusqlite::params![id.as_str(), floor, now],
        )?;
        Ok(changed == 1)
    }
}

pub(crate) fn row_to_lift(row: &rusqlite::Row<'_>) -> Result<Lift, StoreError> {
    let status: String = row_helpers::get(row, 4, "lifts", "status")?;
    Ok(Lift {
        id: LiftId::from_raw(row_helpers::get::<String>(row, 0, "lifts", "id")?),
        session_id: SessionId::from_raw(row_helpers::get::<String>(row, 1, "lifts", "session_id")?),
        position: row_helpers::get_u32(row, 2, "lifts", "position")?,
        current_floor: row_helpers::get_u32(row, 3, "lifts", "current_floor")?,
        status: row_helpers::parse_enum(&status, "lifts", "status")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionRepo;
    use lift_core::LiftStatus;

    fn setup(lifts: u32) -> (LiftRepo, SessionId) {
        let db = Database::in_memory().unwrap();
        let (session, _) = SessionRepo::new(db.clone()).create(10, lifts).unwrap();
        (LiftRepo::new(db), session.id)
    }

    fn claim(repo: &LiftRepo, sid: &SessionId) -> Option<Lift> {
        repo.db.with_conn(|conn| LiftRepo::claim_idle(conn, sid)).unwrap()
    }

    fn release(repo: &LiftRepo, id: &LiftId, floor: Option<u32>) -> bool {
        repo.db.with_conn(|conn| LiftRepo::release(conn, id, floor)).unwrap()
    }

    #[test]
    fn claim_takes_lowest_position_first() {
        let (repo, sid) = setup(3);
        let first = claim(&repo, &sid).unwrap();
        let second = claim(&repo, &sid).unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert_eq!(first.status, LiftStatus::Busy);
    }

    #[test]
    fn claim_returns_none_when_all_busy() {
        let (repo, sid) = setup(1);
        assert!(claim(&repo, &sid).is_some());
        assert!(claim(&repo, &sid).is_none());
    }

    #[test]
    fn claim_is_scoped_to_session() {
        let db = Database::in_memory().unwrap();
        let sessions = SessionRepo::new(db.clone());
        let (a, _) = sessions.create(5, 1).unwrap();
        let (b, _) = sessions.create(5, 1).unwrap();
        let repo = LiftRepo::new(db);

        let claimed = claim(&repo, &a.id).unwrap();
        assert_eq!(claimed.session_id, a.id);
        assert!(claim(&repo, &a.id).is_none());
        assert!(claim(&repo, &b.id).is_some());
    }

    #[test]
    fn release_moves_lift_and_is_conditional() {
        let (repo, sid) = setup(1);
        let lift = claim(&repo, &sid).unwrap();

        assert!(release(&repo, &lift.id, Some(7)));
        let found = repo.find(&lift.id).unwrap().unwrap();
        assert!(found.is_idle());
        assert_eq!(found.current_floor, 7);

        // Already idle
        assert!(!release(&repo, &lift.id, Some(2)));
        assert_eq!(repo.find(&lift.id).unwrap().unwrap().current_floor, 7);

        claim(&repo, &sid).unwrap();
        assert!(release(&repo, &lift.id, None));
        let found = repo.find(&lift.id).unwrap().unwrap();
        assert!(found.is_idle());
        assert_eq!(found.current_floor, 7);
    }

    #[test]
    fn list_for_session_in_position_order() {
        let (repo, sid) = setup(4);
        let lifts = repo.list_for_session(&sid).unwrap();
        let positions: Vec<u32> = lifts.iter().map(|l| l.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn find_unknown_lift() {
        let (repo, _) = setup(1);
        assert!(repo.find(&LiftId::from_raw("lift_nope")).unwrap().is_none());
    }
}
