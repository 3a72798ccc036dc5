use rusqlite::{params, OptionalExtension};
use tracing::instrument;

use altnet_core::{ExplorationId, NewPageRecord, PageRecord, RecordId};

use crate::database::Database;
use crate::error::DbError;
use crate::row_helpers::{escape_like, get, get_opt};

const TABLE: &str = "page_records";
const COLUMNS: &str =
    "id, url, title, preview_text, packed_content, author_name, model_id, timestamp, exploration_id, screenshot_ref";

fn map_row(row: &rusqlite::Row<'_>) -> Result<PageRecord, DbError> {
    Ok(PageRecord {
        id: RecordId::from_raw(get::<String>(row, 0, TABLE, "id")?),
        url: get(row, 1, TABLE, "url")?,
        title: get(row, 2, TABLE, "title")?,
        preview_text: get(row, 3, TABLE, "preview_text")?,
        packed_content: get(row, 4, TABLE, "packed_content")?,
        author_name: get(row, 5, TABLE, "author_name")?,
        model_id: get(row, 6, TABLE, "model_id")?,
        timestamp: get(row, 7, TABLE, "timestamp")?,
        exploration_id: get_opt::<String>(row, 8, TABLE, "exploration_id")?.map(ExplorationId::from_raw),
        screenshot_ref: get_opt(row, 9, TABLE, "screenshot_ref")?,
    })
}

fn collect(stmt: &mut rusqlite::Statement<'_>, params: impl rusqlite::Params) -> Result<Vec<PageRecord>, DbError> {
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(map_row(row)?);
    }
    Ok(out)
}

/// Published pages.
pub struct RecordRepo {
    db: Database,
}

impl RecordRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, record), fields(url = %record.url))]
    pub fn insert(&self, record: &NewPageRecord) -> Result<RecordId, DbError> {
        let id = RecordId::new();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO page_records (id, url, title, preview_text, packed_content, author_name, model_id, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    record.url,
                    record.title,
                    record.preview_text,
                    record.packed_content,
                    record.author_name,
                    record.model_id,
                    record.timestamp,
                ],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    #[instrument(skip(self), fields(record_id = %id))]
    pub fn get(&self, id: &RecordId) -> Result<Option<PageRecord>, DbError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM page_records WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(map_row(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Newest first; ties broken by id so the order is stable.
    #[instrument(skip(self))]
    pub fn recent(&self, limit: usize) -> Result<Vec<PageRecord>, DbError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM page_records ORDER BY timestamp DESC, id DESC LIMIT ?1"
            ))?;
            collect(&mut stmt, [limit as i64])
        })
    }

    #[instrument(skip(self))]
    pub fn by_url(&self, url: &str) -> Result<Vec<PageRecord>, DbError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM page_records WHERE url = ?1 ORDER BY timestamp DESC, id DESC"
            ))?;
            collect(&mut stmt, [url])
        })
    }

    /// Number of records whose URL starts with `prefix`, compared byte for byte.
    #[instrument(skip(self))]
    pub fn count_with_prefix(&self, prefix: &str) -> Result<usize, DbError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM page_records
                 WHERE url LIKE ?1 ESCAPE '\\' AND substr(url, 1, length(?2)) = ?2",
                params![format!("{}%", escape_like(prefix)), prefix],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    #[instrument(skip(self), fields(record_id = %id, exploration_id = %exploration_id))]
    /// One-time assignment: `Ok(false)` when the record already has a lineage.
    pub fn set_exploration(&self, id: &RecordId, exploration_id: &ExplorationId) -> Result<bool, DbError> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE page_records SET exploration_id = ?1 WHERE id = ?2 AND exploration_id IS NULL",
                params![exploration_id.as_str(), id.as_str()],
            )?)
        })?;
        if changed == 0 && !self.exists(id)? {
            return Err(DbError::NotFound(format!("record {id}")));
        }
        Ok(changed > 0)
    }

    #[instrument(skip(self, screenshot_ref), fields(record_id = %id))]
    pub fn set_screenshot(&self, id: &RecordId, screenshot_ref: &str) -> Result<(), DbError> {
        self.update_column(id, "screenshot_ref", screenshot_ref)
    }

    fn update_column(&self, id: &RecordId, column: &'static str, value: &str) -> Result<(), DbError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                &format!("UPDATE page_records SET {column} = ?1 WHERE id = ?2"),
                params![value, id.as_str()],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("record {id}")));
            }
            Ok(())
        })
    }

    /// Whether a record exists, without loading its content.
    pub fn exists(&self, id: &RecordId) -> Result<bool, DbError> {
        self.db.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM page_records WHERE id = ?1", [id.as_str()], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }
}
