use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Read a non-negative integer column as `u32`.
pub fn get_u32(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<u32, StoreError> {
    let raw: i64 = get(row, idx, table, column)?;
    u32::try_from(raw).map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("out of range: {raw}"),
    })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lift_core::{LiftStatus, RequestStatus};

    #[test]
    fn parse_enum_success() {
        let status: LiftStatus = parse_enum("busy", "lifts", "status").unwrap();
        assert_eq!(status, LiftStatus::Busy);
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<RequestStatus, _> = parse_enum("pending", "lift_requests", "status");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "lift_requests", column: "status", .. })
        ));
    }

    #[test]
    fn negative_floor_is_corrupt() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT -1", [], |row| Ok(get_u32(row, 0, "lifts", "current_floor")))
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { column: "current_floor", .. }));
    }
}
