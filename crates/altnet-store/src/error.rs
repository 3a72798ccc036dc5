use altnet_core::StoreError;

/// Failures inside the SQLite layer. Converted to [`StoreError`] at the
/// `Store` boundary.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        detail: String,
    },

    #[error("IO error: {0}")]
    Io(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Sqlite(e) => StoreError::Backend(e.to_string()),
            DbError::Json(e) => StoreError::Serialization(e.to_string()),
            DbError::NotFound(what) => StoreError::NotFound(what),
            DbError::CorruptRow { table, column, detail } => StoreError::CorruptRow { table, column, detail },
            DbError::Io(msg) => StoreError::Io(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_store_error() {
        let err: StoreError = DbError::NotFound("record rec_1".into()).into();
        assert!(matches!(err, StoreError::NotFound(ref what) if what == "record rec_1"));

        let err: StoreError = DbError::Sqlite(rusqlite::Error::InvalidQuery).into();
        assert!(matches!(err, StoreError::Backend(_)));

        let err: StoreError = DbError::CorruptRow {
            table: "page_records",
            column: "id",
            detail: "bad".into(),
        }
        .into();
        assert!(matches!(err, StoreError::CorruptRow { table: "page_records", .. }));
    }
}
