//! Group registry trait and SQLite implementation.
//!
//! One row per group, committed before any call returns. Writes are
//! per-record, so updating one group never rewrites or races another
//! group's state.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ClanPulseError, ClanPulseResult};
use crate::types::{AlertTier, Group, WindowCounts};

/// Trait for group registry operations.
///
/// Writers are serialized; `update` is the only persist path for an
/// existing record and deliberately refuses to recreate a deleted row, so
/// an unregister racing an in-flight aggregation cycle always wins.
pub trait GroupRegistry: Send + Sync {
    /// Add a new group. Fails with `AlreadyExists` if the id is taken.
    fn insert(&self, group: &Group) -> ClanPulseResult<()>;

    /// Get a group by id.
    fn get(&self, id: &str) -> ClanPulseResult<Option<Group>>;

    /// Persist the full record of an existing group.
    ///
    /// Returns `false` if the group no longer exists. Callers must
    /// read-modify-write whole records; field-level merges are not
    /// supported.
    fn update(&self, group: &Group) -> ClanPulseResult<bool>;

    /// Delete a group. Fails with `NotFound` if absent.
    fn delete(&self, id: &str) -> ClanPulseResult<()>;

    /// All groups in insertion order, stable across restarts.
    fn list(&self) -> ClanPulseResult<Vec<Group>>;

    /// Find the group counting the given channel, if any.
    fn find_by_channel(&self, channel_id: &str) -> ClanPulseResult<Option<Group>>;
}

/// SQLite-backed group registry.
pub struct SqliteGroupRegistry {
    conn: Mutex<Connection>,
}

impl SqliteGroupRegistry {
    /// Create a new registry at the given path.
    pub fn new(path: impl AsRef<Path>) -> ClanPulseResult<Self> {
        let conn = Connection::open(path)?;
        let registry = Self {
            conn: Mutex::new(conn),
        };
        registry.init_schema()?;
        Ok(registry)
    }

    /// Create an in-memory registry (for testing).
    pub fn in_memory() -> ClanPulseResult<Self> {
        let conn = Connection::open_in_memory()?;
        let registry = Self {
            conn: Mutex::new(conn),
        };
        registry.init_schema()?;
        Ok(registry)
    }

    fn init_schema(&self) -> ClanPulseResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                role_id TEXT,
                day_count INTEGER NOT NULL DEFAULT 0,
                week_count INTEGER NOT NULL DEFAULT 0,
                two_week_count INTEGER NOT NULL DEFAULT 0,
                month_count INTEGER NOT NULL DEFAULT 0,
                raw_count INTEGER NOT NULL DEFAULT 0,
                score REAL NOT NULL DEFAULT 0,
                last_notified_state TEXT NOT NULL DEFAULT 'none',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_groups_channel ON groups(channel_id);
        "#,
        )?;
        Ok(())
    }

    fn row_to_group(row: &rusqlite::Row<'_>) -> ClanPulseResult<Group> {
        let id: String = row.get(0)?;
        let channel_id: String = row.get(1)?;
        let role_id: Option<String> = row.get(2)?;
        let day: u32 = row.get(3)?;
        let week: u32 = row.get(4)?;
        let two_week: u32 = row.get(5)?;
        let month: u32 = row.get(6)?;
        let raw_count: u32 = row.get(7)?;
        let score: f64 = row.get(8)?;
        let last_notified_state: String = row.get(9)?;
        let created_at: String = row.get(10)?;

        Ok(Group {
            id,
            channel_id,
            role_id,
            counts: WindowCounts::new(day, week, two_week, month),
            raw_count,
            score,
            last_notified_state: AlertTier::parse(&last_notified_state),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ClanPulseError::database(e.to_string()))?,
        })
    }
}

const SELECT_COLUMNS: &str = "id, channel_id, role_id, day_count, week_count, two_week_count, \
                              month_count, raw_count, score, last_notified_state, created_at";

impl GroupRegistry for SqliteGroupRegistry {
    fn insert(&self, group: &Group) -> ClanPulseResult<()> {
        let conn = self.conn.lock().unwrap();

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM groups WHERE id = ?1",
                params![group.id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(ClanPulseError::already_exists(&group.id));
        }

        conn.execute(
            r#"INSERT INTO groups
               (id, channel_id, role_id, day_count, week_count, two_week_count, month_count,
                raw_count, score, last_notified_state, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                group.id,
                group.channel_id,
                group.role_id,
                group.counts.day,
                group.counts.week,
                group.counts.two_week,
                group.counts.month,
                group.raw_count,
                group.score,
                group.last_notified_state.as_str(),
                group.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> ClanPulseResult<Option<Group>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM groups WHERE id = ?1"
        ))?;

        stmt.query_row(params![id], |row| Ok(Self::row_to_group(row)))
            .optional()?
            .transpose()
    }

    fn update(&self, group: &Group) -> ClanPulseResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"UPDATE groups SET
               channel_id = ?2, role_id = ?3, day_count = ?4, week_count = ?5,
               two_week_count = ?6, month_count = ?7, raw_count = ?8, score = ?9,
               last_notified_state = ?10
               WHERE id = ?1"#,
            params![
                group.id,
                group.channel_id,
                group.role_id,
                group.counts.day,
                group.counts.week,
                group.counts.two_week,
                group.counts.month,
                group.raw_count,
                group.score,
                group.last_notified_state.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, id: &str) -> ClanPulseResult<()> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM groups WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(ClanPulseError::not_found(id));
        }
        Ok(())
    }

    fn list(&self) -> ClanPulseResult<Vec<Group>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM groups ORDER BY rowid ASC"
        ))?;

        let results = stmt.query_map([], |row| Ok(Self::row_to_group(row)))?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn find_by_channel(&self, channel_id: &str) -> ClanPulseResult<Option<Group>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM groups WHERE channel_id = ?1 ORDER BY rowid ASC LIMIT 1"
        ))?;

        stmt.query_row(params![channel_id], |row| Ok(Self::row_to_group(row)))
            .optional()?
            .transpose()
    }
}
