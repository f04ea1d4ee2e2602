use std::path::Path;

use rusqlite::types::{FromSqlError, Type};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use ygb_types::{SaveMetadata, SaveRecord, SessionState};

use super::schema;

/// Save records keyed by an auto-incrementing id, indexed by last access.
pub struct SaveStore {
    conn: Connection,
}

const SELECT_COLUMNS: &str = "SELECT id, cart_title, created_at, last_accessed, state, data FROM saves";

impl SaveStore {
    /// Open (creating if needed) the store at `path` in WAL mode.
    pub fn open(path: &Path) -> SqlResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> SqlResult<Self> {
        let tx = conn.unchecked_transaction()?;
        schema::create_tables(&tx)?;
        tx.commit()?;
        Ok(Self { conn })
    }

    /// Insert a record, or replace the one with the same id. Returns the id.
    pub fn put(&self, record: &SaveRecord) -> SqlResult<i64> {
        let meta = &record.metadata;
        match record.id {
            Some(id) => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO saves (id, cart_title, created_at, last_accessed, state, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id,
                        meta.cart_title,
                        meta.created_at.map(to_sql_time),
                        meta.last_accessed.map(to_sql_time),
                        record.state.as_u64() as i64,
                        record.data,
                    ],
                )?;
                log::debug!(target: "persistence", "overwrote save {}", id);
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO saves (cart_title, created_at, last_accessed, state, data)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        meta.cart_title,
                        meta.created_at.map(to_sql_time),
                        meta.last_accessed.map(to_sql_time),
                        record.state.as_u64() as i64,
                        record.data,
                    ],
                )?;
                let id = self.conn.last_insert_rowid();
                log::debug!(target: "persistence", "created save {}", id);
                Ok(id)
            }
        }
    }

    pub fn get(&self, id: i64) -> SqlResult<Option<SaveRecord>> {
        self.conn
            .query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), params![id], record_from_row)
            .optional()
    }

    /// Returns false if no record had this id.
    pub fn delete(&self, id: i64) -> SqlResult<bool> {
        let n = self.conn.execute("DELETE FROM saves WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// Most recently accessed first; never-accessed records last.
    pub fn recent(&self, limit: usize) -> SqlResult<Vec<SaveRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} ORDER BY last_accessed IS NULL, last_accessed DESC, id DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], record_from_row)?;
        rows.collect()
    }

    pub fn count(&self) -> SqlResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM saves", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
    }
}

fn to_sql_time(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn record_from_row(row: &Row<'_>) -> SqlResult<SaveRecord> {
    let raw_state: i64 = row.get(4)?;
    let state = u64::try_from(raw_state)
        .ok()
        .and_then(SessionState::from_u64)
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Integer,
                Box::new(FromSqlError::OutOfRange(raw_state)),
            )
        })?;
    Ok(SaveRecord {
        id: Some(row.get(0)?),
        metadata: SaveMetadata {
            cart_title: row.get(1)?,
            created_at: row.get::<_, Option<i64>>(2)?.map(|v| v.max(0) as u64),
            last_accessed: row.get::<_, Option<i64>>(3)?.map(|v| v.max(0) as u64),
        },
        state,
        data: row.get(5)?,
    })
}
