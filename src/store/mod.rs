pub mod prefs;
pub mod sqlite;

use std::fmt;

use crate::app::{GitaError, Result};
use crate::domain::{Chapter, ChapterMeta};

pub use prefs::{keys, Preferences, PreferencesExt, SqlitePreferences};
pub use sqlite::SqliteStore;

/// Named partitions of the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Chapters,
    Metadata,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Chapters, Partition::Metadata];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Chapters => "chapters",
            Partition::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable chapter storage. A missing record is `Ok(None)`; `Err` means the
/// storage itself could not be used.
pub trait ContentStore: Send + Sync {
    // Chapters partition
    fn get_chapter(&self, number: u32) -> Result<Option<Chapter>>;
    fn put_chapter(&self, chapter: &Chapter) -> Result<()>;
    fn cached_chapters(&self) -> Result<Vec<u32>>;

    // Metadata partition
    fn get_index(&self) -> Result<Option<Vec<ChapterMeta>>>;
    fn put_index(&self, index: &[ChapterMeta]) -> Result<()>;

    fn partitions(&self) -> Result<Vec<Partition>>;

    /// Drops every partition and recreates an empty store.
    fn delete_all(&self) -> Result<()>;
}

/// Stands in for a content store that could not be opened. Every call fails
/// with `StoreUnavailable`, so readers degrade to the network.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(GitaError::store(self.reason.clone()))
    }
}

impl ContentStore for UnavailableStore {
    fn get_chapter(&self, _number: u32) -> Result<Option<Chapter>> {
        self.fail()
    }

    fn put_chapter(&self, _chapter: &Chapter) -> Result<()> {
        self.fail()
    }

    fn cached_chapters(&self) -> Result<Vec<u32>> {
        self.fail()
    }

    fn get_index(&self) -> Result<Option<Vec<ChapterMeta>>> {
        self.fail()
    }

    fn put_index(&self, _index: &[ChapterMeta]) -> Result<()> {
        self.fail()
    }

    fn partitions(&self) -> Result<Vec<Partition>> {
        self.fail()
    }

    fn delete_all(&self) -> Result<()> {
        self.fail()
    }
}
