use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::instrument;

use lift_core::{Lift, LiftId, LiftStatus, Session, SessionId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

pub struct SessionRepo {
    db: Database,
}

impl SessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a session and its lifts in one transaction. Lifts start idle
    /// on floor 0, numbered by position.
    #[instrument(skip(self))]
    pub fn create(&self, floors: u32, lift_count: u32) -> Result<(Session, Vec<Lift>), StoreError> {
        let id = SessionId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_tx(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, floors, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id.as_str(), floors, now],
            )?;

            let mut stmt = conn.prepare(
                "INSERT INTO lifts (id, session_id, position, current_floor, status, updated_at)
                 VALUES (?1, ?2, ?3, 0, 'idle', ?4)",
            )?;
            let mut lifts = Vec::with_capacity(lift_count as usize);
            for position in 0..lift_count {
                let lift_id = LiftId::new();
                stmt.execute(rusqlite::params![lift_id.as_str(), id.as_str(), position, now])?;
                lifts.push(Lift {
                    id: lift_id,
                    session_id: id.clone(),
                    position,
                    current_floor: 0,
                    status: LiftStatus::Idle,
                });
            }

            let session = Session {
                id: id.clone(),
                floors,
                lifts: lifts.iter().map(|l| l.id.clone()).collect(),
                created_at: now.clone(),
            };
            Ok((session, lifts))
        })
    }

    /// Get a session by ID with its lift IDs in position order.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, floors, created_at FROM sessions WHERE id = ?1",
                    [id.as_str()],
                    |row| {
                        Ok((
                            row_helpers::get::<String>(row, 0, "sessions", "id"),
                            row_helpers::get_u32(row, 1, "sessions", "floors"),
                            row_helpers::get::<String>(row, 2, "sessions", "created_at"),
                        ))
                    },
                )
                .optional()?;

            let Some((sid, floors, created_at)) = row else {
                return Ok(None);
            };

            let mut stmt =
                conn.prepare("SELECT id FROM lifts WHERE session_id = ?1 ORDER BY position")?;
            let mut rows = stmt.query([id.as_str()])?;
            let mut lifts = Vec::new();
            while let Some(row) = rows.next()? {
                lifts.push(LiftId::from_raw(row_helpers::get::<String>(row, 0, "lifts", "id")?));
            }

            Ok(Some(Session {
                id: SessionId::from_raw(sid?),
                floors: floors?,
                lifts,
                created_at: created_at?,
            }))
        })
    }
}
