use lift_core::LiftError;
use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        detail: String,
    },

    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation => {
                StoreError::Conflict(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<StoreError> for LiftError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => LiftError::NotFound(m),
            StoreError::Conflict(m) => LiftError::Conflict(m),
            other => LiftError::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_into_lift_error_kinds() {
        let nf: LiftError = StoreError::NotFound("session sess_1".into()).into();
        assert_eq!(nf.kind(), "NOT_FOUND");

        let conflict: LiftError = StoreError::Conflict("unique".into()).into();
        assert_eq!(conflict.kind(), "CONFLICT");

        let db: LiftError = StoreError::Database("disk I/O error".into()).into();
        assert_eq!(db.kind(), "STORE_UNAVAILABLE");
        assert!(db.message().contains("disk I/O error"));
    }

    #[test]
    fn constraint_violation_becomes_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::Conflict(_)));
    }
}
