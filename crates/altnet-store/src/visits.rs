use rusqlite::params;
use tracing::{debug, instrument};

use altnet_core::{ExplorationId, NewVisit, RecordId, Visit, VisitId, HISTORY_CAPACITY};

use crate::database::Database;
use crate::error::DbError;
use crate::row_helpers::{get, get_opt};

const TABLE: &str = "visits";
const COLUMNS: &str = "id, address, title, packed_content, model_id, timestamp, record_id, exploration_id";

fn map_row(row: &rusqlite::Row<'_>) -> Result<Visit, DbError> {
    Ok(Visit {
        id: VisitId::from_raw(get::<String>(row, 0, TABLE, "id")?),
        address: get(row, 1, TABLE, "address")?,
        title: get(row, 2, TABLE, "title")?,
        packed_content: get(row, 3, TABLE, "packed_content")?,
        model_id: get(row, 4, TABLE, "model_id")?,
        timestamp: get(row, 5, TABLE, "timestamp")?,
        record_id: get_opt::<String>(row, 6, TABLE, "record_id")?.map(RecordId::from_raw),
        exploration_id: get_opt::<String>(row, 7, TABLE, "exploration_id")?.map(ExplorationId::from_raw),
    })
}

/// Local browsing history, capped at [`HISTORY_CAPACITY`] rows.
pub struct VisitRepo {
    db: Database,
}

impl VisitRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, visit), fields(address = %visit.address))]
    pub fn insert(&self, visit: &NewVisit) -> Result<VisitId, DbError> {
        let id = VisitId::new();
        let dropped = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO visits (id, address, title, packed_content, model_id, timestamp, record_id, exploration_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    visit.address,
                    visit.title,
                    visit.packed_content,
                    visit.model_id,
                    visit.timestamp,
                    visit.record_id.as_ref().map(RecordId::as_str),
                    visit.exploration_id.as_ref().map(ExplorationId::as_str),
                ],
            )?;
            Ok(conn.execute(
                "DELETE FROM visits WHERE id NOT IN
                 (SELECT id FROM visits ORDER BY timestamp DESC, id DESC LIMIT ?1)",
                [HISTORY_CAPACITY as i64],
            )?)
        })?;
        if dropped > 0 {
            debug!(dropped, "oldest visits dropped");
        }
        Ok(id)
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<Visit>, DbError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM visits ORDER BY timestamp DESC, id DESC LIMIT ?1"))?;
            let mut rows = stmt.query([limit as i64])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(map_row(row)?);
            }
            Ok(out)
        })
    }

    pub fn get(&self, id: &VisitId) -> Result<Option<Visit>, DbError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM visits WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(map_row(row)?)),
                None => Ok(None),
            }
        })
    }

    #[instrument(skip(self), fields(visit_id = %id))]
    pub fn delete(&self, id: &VisitId) -> Result<bool, DbError> {
        self.db
            .with_conn(|conn| Ok(conn.execute("DELETE FROM visits WHERE id = ?1", [id.as_str()])? > 0))
    }

    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<usize, DbError> {
        self.db.with_conn(|conn| Ok(conn.execute("DELETE FROM visits", [])?))
    }
}
