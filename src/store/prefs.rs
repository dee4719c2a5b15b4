use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use tracing::warn;

use crate::app::{GitaError, Result};
use crate::domain::{Bookmark, LastRead, Persona, Theme};

/// Well-known preference keys.
pub mod keys {
    pub const THEME: &str = "theme";
    pub const FLAVOR: &str = "flavor";
    pub const LAST_READ: &str = "lastRead";
    pub const BOOKMARKS: &str = "bookmarks";
}

/// String-keyed, string-valued local preference storage.
pub trait Preferences: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
    fn clear(&self) -> Result<()>;

    /// Removes every key not listed in `keep`, atomically.
    fn retain(&self, keep: &[String]) -> Result<()>;
}

/// Typed accessors for the keys the reader understands.
pub trait PreferencesExt: Preferences {
    fn theme(&self) -> Result<Theme> {
        Ok(self
            .get(keys::THEME)?
            .and_then(|v| v.parse().ok())
            .unwrap_or_default())
    }

    fn set_theme(&self, theme: Theme) -> Result<()> {
        self.set(keys::THEME, theme.as_str())
    }

    fn persona(&self) -> Result<Persona> {
        Ok(self
            .get(keys::FLAVOR)?
            .and_then(|v| v.parse().ok())
            .unwrap_or_default())
    }

    fn set_persona(&self, persona: Persona) -> Result<()> {
        self.set(keys::FLAVOR, persona.as_str())
    }

    fn last_read(&self) -> Result<Option<LastRead>> {
        let Some(raw) = self.get(keys::LAST_READ)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(last) => Ok(Some(last)),
            Err(e) => {
                warn!("Ignoring unreadable last-read pointer: {}", e);
                Ok(None)
            }
        }
    }

    fn set_last_read(&self, last: &LastRead) -> Result<()> {
        self.set(keys::LAST_READ, &serde_json::to_string(last)?)
    }

    fn bookmarks(&self) -> Result<BTreeMap<String, Bookmark>> {
        let Some(raw) = self.get(keys::BOOKMARKS)? else {
            return Ok(BTreeMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("Ignoring unreadable bookmarks: {}", e);
                Ok(BTreeMap::new())
            }
        }
    }

    /// Bookmarks ordered by chapter, then verse.
    fn bookmark_list(&self) -> Result<Vec<Bookmark>> {
        let mut list: Vec<Bookmark> = self.bookmarks()?.into_values().collect();
        list.sort_by_key(|b| (b.chapter, b.verse));
        Ok(list)
    }

    fn is_bookmarked(&self, chapter: u32, verse: u32) -> Result<bool> {
        Ok(self
            .bookmarks()?
            .contains_key(&Bookmark::key(chapter, verse)))
    }

    /// Adds or removes a bookmark; returns whether the verse is now bookmarked.
    fn toggle_bookmark(&self, chapter: u32, verse: u32) -> Result<bool> {
        let mut map = self.bookmarks()?;
        let key = Bookmark::key(chapter, verse);

        let bookmarked = if map.remove(&key).is_some() {
            false
        } else {
            map.insert(key, Bookmark::new(chapter, verse));
            true
        };

        self.set(keys::BOOKMARKS, &serde_json::to_string(&map)?)?;
        Ok(bookmarked)
    }
}

impl<P: Preferences + ?Sized> PreferencesExt for P {}

pub struct SqlitePreferences {
    conn: Mutex<Connection>,
}

impl SqlitePreferences {
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
            "../../migrations/preferences/001-initial/up.sql"
        ))]);
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

impl Preferences for SqlitePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM preferences ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM preferences", [])?;
        Ok(())
    }

    fn retain(&self, keep: &[String]) -> Result<()> {
        if keep.is_empty() {
            return self.clear();
        }

        let placeholders = vec!["?"; keep.len()].join(", ");
        let sql = format!("DELETE FROM preferences WHERE key NOT IN ({})", placeholders);

        let conn = self.conn()?;
        conn.execute(&sql, params_from_iter(keep.iter()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let prefs = SqlitePreferences::in_memory().unwrap();
        assert!(prefs.get("theme").unwrap().is_none());

        prefs.set("theme", "light").unwrap();
        prefs.set("theme", "dark").unwrap();
        assert_eq!(prefs.get("theme").unwrap(), Some("dark".into()));

        prefs.remove("theme").unwrap();
        assert!(prefs.get("theme").unwrap().is_none());
    }

    #[test]
    fn test_clear_removes_everything() {
        let prefs = SqlitePreferences::in_memory().unwrap();
        prefs.set("a", "1").unwrap();
        prefs.set("b", "2").unwrap();
        assert_eq!(prefs.keys().unwrap(), vec!["a", "b"]);

        prefs.clear().unwrap();
        assert!(prefs.keys().unwrap().is_empty());
    }

    #[test]
    fn test_retain_keeps_only_listed_keys() {
        let prefs = SqlitePreferences::in_memory().unwrap();
        prefs.set(keys::THEME, "light").unwrap();
        prefs.set(keys::LAST_READ, "{}").unwrap();
        prefs.set(keys::BOOKMARKS, "{}").unwrap();
        prefs.set("installDismissed", "true").unwrap();

        let keep = vec![
            keys::THEME.to_string(),
            keys::FLAVOR.to_string(),
            keys::LAST_READ.to_string(),
        ];
        prefs.retain(&keep).unwrap();
        assert_eq!(prefs.keys().unwrap(), vec!["lastRead", "theme"]);
        assert_eq!(prefs.get(keys::THEME).unwrap(), Some("light".into()));

        prefs.retain(&[]).unwrap();
        assert!(prefs.keys().unwrap().is_empty());
    }

    #[test]
    fn test_typed_defaults() {
        let prefs = SqlitePreferences::in_memory().unwrap();
        assert_eq!(prefs.theme().unwrap(), Theme::Dark);
        assert_eq!(prefs.persona().unwrap(), Persona::Millennial);
        assert!(prefs.last_read().unwrap().is_none());

        prefs.set(keys::THEME, "neon").unwrap();
        assert_eq!(prefs.theme().unwrap(), Theme::Dark);
    }

    #[test]
    fn test_persona_and_theme_persist() {
        let prefs = SqlitePreferences::in_memory().unwrap();
        prefs.set_theme(Theme::Light).unwrap();
        prefs.set_persona(Persona::GenAlpha).unwrap();
        assert_eq!(prefs.get(keys::FLAVOR).unwrap(), Some("genalpha".into()));
        assert_eq!(prefs.theme().unwrap(), Theme::Light);
        assert_eq!(prefs.persona().unwrap(), Persona::GenAlpha);
    }

    #[test]
    fn test_toggle_bookmark() {
        let prefs = SqlitePreferences::in_memory().unwrap();

        assert!(prefs.toggle_bookmark(2, 47).unwrap());
        assert!(prefs.toggle_bookmark(1, 1).unwrap());
        assert!(prefs.is_bookmarked(2, 47).unwrap());

        let raw = prefs.get(keys::BOOKMARKS).unwrap().unwrap();
        assert!(raw.contains("\"2-47\""));

        let list = prefs.bookmark_list().unwrap();
        assert_eq!(
            list.iter().map(|b| (b.chapter, b.verse)).collect::<Vec<_>>(),
            vec![(1, 1), (2, 47)]
        );

        assert!(!prefs.toggle_bookmark(2, 47).unwrap());
        assert!(!prefs.is_bookmarked(2, 47).unwrap());
    }

    #[test]
    fn test_corrupt_bookmarks_read_as_empty() {
        let prefs = SqlitePreferences::in_memory().unwrap();
        prefs.set(keys::BOOKMARKS, "[not a map").unwrap();
        assert!(prefs.bookmarks().unwrap().is_empty());
    }

    #[test]
    fn test_last_read_round_trip() {
        let prefs = SqlitePreferences::in_memory().unwrap();
        let last = LastRead {
            chapter: 12,
            verse: 13,
            chapter_title: "The Path of Devotion".into(),
        };
        prefs.set_last_read(&last).unwrap();
        assert_eq!(prefs.last_read().unwrap(), Some(last));
    }
}
