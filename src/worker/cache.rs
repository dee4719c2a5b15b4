use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{GitaError, Result};
use crate::fetcher::Response;

/// Named partitions of raw responses, keyed by full request URL.
pub trait CacheStorage: Send + Sync {
    /// Creates partition `name` if it does not exist yet.
    fn open(&self, name: &str) -> Result<()>;
    fn has(&self, name: &str) -> Result<bool>;
    /// Partition names in creation order.
    fn keys(&self) -> Result<Vec<String>>;
    /// Deletes a partition and its entries; `false` if it did not exist.
    fn delete(&self, name: &str) -> Result<bool>;

    /// First match for `url` across all partitions, oldest partition first.
    fn match_url(&self, url: &str) -> Result<Option<Response>>;

    /// Match for `url` in partition `name` only.
    fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>>;

    /// Stores `response` unless the partition already holds `url`.
    fn put(&self, name: &str, url: &str, response: &Response) -> Result<()>;

    /// Stores every entry in one transaction, replacing existing ones.
    fn put_all(&self, name: &str, entries: &[(String, Response)]) -> Result<()>;

    fn entry_count(&self, name: &str) -> Result<usize>;
}

pub struct SqliteCacheStorage {
    conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/worker-cache/001-initial/up.sql"
        ))]);

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| GitaError::store(format!("Schema migration failed: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| GitaError::store(e.to_string()))
    }
}

fn open_cache(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl CacheStorage for SqliteCacheStorage {
    fn open(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        open_cache(&conn, name)?;
        Ok(())
    }

    fn has(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM caches WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY rowid")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    fn match_url(&self, url: &str) -> Result<Option<Response>> {
        let conn = self.conn()?;
        let response = conn
            .query_row(
                "SELECT e.status, e.content_type, e.body
                 FROM entries e JOIN caches c ON c.name = e.cache_name
                 WHERE e.url = ?1
                 ORDER BY c.rowid
                 LIMIT 1",
                params![url],
                |row| {
                    Ok(Response {
                        status: row.get(0)?,
                        content_type: row.get(1)?,
                        body: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(response)
    }

    fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>> {
        let conn = self.conn()?;
        let response = conn
            .query_row(
                "SELECT status, content_type, body FROM entries
                 WHERE cache_name = ?1 AND url = ?2",
                params![name, url],
                |row| {
                    Ok(Response {
                        status: row.get(0)?,
                        content_type: row.get(1)?,
                        body: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(response)
    }

    fn put(&self, name: &str, url: &str, response: &Response) -> Result<()> {
        let conn = self.conn()?;
        open_cache(&conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO entries (cache_name, url, status, content_type, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                url,
                response.status,
                response.content_type,
                response.body,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn put_all(&self, name: &str, entries: &[(String, Response)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        open_cache(&tx, name)?;

        let stored_at = Utc::now().to_rfc3339();
        for (url, response) in entries {
            tx.execute(
                "INSERT INTO entries (cache_name, url, status, content_type, body, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(cache_name, url) DO UPDATE
                 SET status = ?3, content_type = ?4, body = ?5, stored_at = ?6",
                params![
                    name,
                    url,
                    response.status,
                    response.content_type,
                    response.body,
                    stored_at
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn entry_count(&self, name: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE cache_name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_match() {
        let caches = SqliteCacheStorage::in_memory().unwrap();
        let response = Response::ok("{}").with_content_type("application/json");
        caches
            .put("gita-runtime", "http://gita.test/data/chapters/chapter-1.json", &response)
            .unwrap();

        let hit = caches
            .match_url("http://gita.test/data/chapters/chapter-1.json")
            .unwrap();
        assert_eq!(hit, Some(response));
        assert!(caches.match_url("http://gita.test/other").unwrap().is_none());
    }

    #[test]
    fn test_match_in_is_scoped_to_one_partition() {
        let caches = SqliteCacheStorage::in_memory().unwrap();
        let url = "http://gita.test/index.html";
        caches.put("gita-v1", url, &Response::ok("shell")).unwrap();

        assert_eq!(caches.match_in("gita-v1", url).unwrap().unwrap().body, b"shell");
        assert!(caches.match_in("gita-runtime", url).unwrap().is_none());
        assert!(caches.match_in("gita-v1", "http://gita.test/app.js").unwrap().is_none());
    }

    #[test]
    fn test_first_write_wins() {
        let caches = SqliteCacheStorage::in_memory().unwrap();
        let url = "http://gita.test/data/chapters/chapter-2.json";
        caches.put("gita-runtime", url, &Response::ok("first")).unwrap();
        caches.put("gita-runtime", url, &Response::ok("second")).unwrap();

        assert_eq!(caches.match_url(url).unwrap().unwrap().body, b"first");
        assert_eq!(caches.entry_count("gita-runtime").unwrap(), 1);
    }

    #[test]
    fn test_match_prefers_oldest_partition() {
        let caches = SqliteCacheStorage::in_memory().unwrap();
        let url = "http://gita.test/index.html";
        caches.open("gita-v1").unwrap();
        caches.put("gita-runtime", url, &Response::ok("runtime")).unwrap();
        caches.put("gita-v1", url, &Response::ok("static")).unwrap();

        assert_eq!(caches.match_url(url).unwrap().unwrap().body, b"static");
    }

    #[test]
    fn test_delete_removes_entries() {
        let caches = SqliteCacheStorage::in_memory().unwrap();
        let url = "http://gita.test/app.js";
        caches.put("old-cache", url, &Response::ok("x")).unwrap();

        assert!(caches.delete("old-cache").unwrap());
        assert!(!caches.delete("old-cache").unwrap());
        assert!(!caches.has("old-cache").unwrap());
        assert!(caches.match_url(url).unwrap().is_none());
        assert_eq!(caches.entry_count("old-cache").unwrap(), 0);
    }

    #[test]
    fn test_keys_in_creation_order() {
        let caches = SqliteCacheStorage::in_memory().unwrap();
        caches.open("b").unwrap();
        caches.open("a").unwrap();
        caches.open("b").unwrap();
        assert_eq!(caches.keys().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_put_all_replaces() {
        let caches = SqliteCacheStorage::in_memory().unwrap();
        let url = "http://gita.test/styles.css".to_string();
        caches
            .put_all("gita-v1", &[(url.clone(), Response::ok("v1"))])
            .unwrap();
        caches
            .put_all("gita-v1", &[(url.clone(), Response::ok("v2"))])
            .unwrap();
        assert_eq!(caches.match_url(&url).unwrap().unwrap().body, b"v2");
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker-cache.db");
        let url = "http://gita.test/data/chapters.json";

        SqliteCacheStorage::new(&path)
            .unwrap()
            .put("gita-v1", url, &Response::ok("[]"))
            .unwrap();

        let reopened = SqliteCacheStorage::new(&path).unwrap();
        assert!(reopened.match_url(url).unwrap().is_some());
    }
}
