pub mod chapter;
pub mod prefs;

pub use chapter::{default_index, Chapter, ChapterMeta, Persona, Verse, CHAPTER_COUNT};
pub use prefs::{Bookmark, LastRead, Theme};
