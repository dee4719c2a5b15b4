use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use tracing::{debug, warn};

use crate::app::{GitaError, Result};
use crate::domain::{Chapter, ChapterMeta};
use crate::store::{ContentStore, Partition};

const CHAPTERS_INDEX_ID: &str = "chapters-index";

fn migration_steps() -> Vec<M<'static>> {
    vec![
        M::up(include_str!("../../migrations/001-chapters/up.sql")),
        M::up(include_str!("../../migrations/002-metadata/up.sql")),
    ]
}

fn migrations() -> Migrations<'static> {
    Migrations::new(migration_steps())
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn()?;
        migrations()
            .to_latest(&mut conn)
            .map_err(|e| GitaError::store(format!("Schema migration failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| GitaError::store(e.to_string()))
    }

    /// Current schema version (`PRAGMA user_version`).
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.conn()?;
        let version = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

fn is_blocked(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

impl ContentStore for SqliteStore {
    fn get_chapter(&self, number: u32) -> Result<Option<Chapter>> {
        let conn = self.conn()?;

        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM chapters WHERE number = ?1",
                params![number],
                |row| row.get(0),
            )
            .optional()?;

        let Some(body) = body else {
            return Ok(None);
        };

        let chapter: Chapter = serde_json::from_str(&body)?;
        if chapter.number != number {
            warn!(
                "Stored record under chapter {} claims to be chapter {}",
                number, chapter.number
            );
            return Ok(None);
        }

        Ok(Some(chapter))
    }

    fn put_chapter(&self, chapter: &Chapter) -> Result<()> {
        let body = serde_json::to_string(chapter)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO chapters (number, title, body, stored_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(number) DO UPDATE SET title = ?2, body = ?3, stored_at = ?4",
            params![
                chapter.number,
                chapter.title,
                body,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }

    fn cached_chapters(&self) -> Result<Vec<u32>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT number FROM chapters ORDER BY number")?;
        let numbers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<u32>, _>>()?;

        Ok(numbers)
    }

    fn get_index(&self) -> Result<Option<Vec<ChapterMeta>>> {
        let conn = self.conn()?;

        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM metadata WHERE id = ?1",
                params![CHAPTERS_INDEX_ID],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn put_index(&self, index: &[ChapterMeta]) -> Result<()> {
        let body = serde_json::to_string(index)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO metadata (id, body, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET body = ?2, stored_at = ?3",
            params![CHAPTERS_INDEX_ID, body, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn partitions(&self) -> Result<Vec<Partition>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Partition::ALL
            .into_iter()
            .filter(|p| tables.iter().any(|t| t == p.as_str()))
            .collect())
    }

    fn delete_all(&self) -> Result<()> {
        // A poisoned lock still holds a usable connection
        let mut conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        };

        let dropped = conn.execute_batch(
            "DROP TABLE IF EXISTS chapters;
             DROP TABLE IF EXISTS metadata;
             PRAGMA user_version = 0;",
        );

        match dropped {
            Ok(()) => {}
            Err(e) if is_blocked(&e) => {
                warn!("Content store is busy, leaving it in place: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        migrations()
            .to_latest(&mut conn)
            .map_err(|e| GitaError::store(format!("Schema migration failed: {}", e)))?;

        debug!("Content store dropped and recreated");
        Ok(())
    }
}
