//! Plain-data views over the cached corpus, consumed by a display layer.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, warn};

use crate::app::{GitaError, Result};
use crate::domain::{Bookmark, Chapter, ChapterMeta, LastRead, Persona, Verse, CHAPTER_COUNT};
use crate::fetcher::ContentFetcher;
use crate::store::{Preferences, PreferencesExt};

pub const MIN_QUERY_LEN: usize = 2;
pub const MAX_SEARCH_RESULTS: usize = 20;

/// A verse together with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct VerseRef {
    pub chapter: u32,
    pub chapter_title: String,
    pub verse: Verse,
}

impl VerseRef {
    fn new(chapter: &Chapter, verse: &Verse) -> Self {
        Self {
            chapter: chapter.number,
            chapter_title: chapter.title.clone(),
            verse: verse.clone(),
        }
    }

    pub fn share_text(&self) -> String {
        share_text(self.chapter, &self.verse)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerseDetail {
    pub location: VerseRef,
    pub persona: Persona,
    pub explanation: Option<String>,
    pub bookmarked: bool,
    pub previous: Option<u32>,
    pub next: Option<u32>,
}

pub struct Reader {
    fetcher: Arc<ContentFetcher>,
    preferences: Arc<dyn Preferences>,
}

impl Reader {
    pub fn new(fetcher: Arc<ContentFetcher>, preferences: Arc<dyn Preferences>) -> Self {
        Self {
            fetcher,
            preferences,
        }
    }

    pub async fn chapters(&self) -> Vec<ChapterMeta> {
        self.fetcher.load_index().await
    }

    pub async fn chapter(&self, number: u32) -> Result<Chapter> {
        self.fetcher
            .load_chapter(number)
            .await
            .ok_or_else(|| GitaError::NotFound(format!("Chapter {} is not available", number)))
    }

    /// Opens a verse and records it as the last-read position.
    ///
    /// `persona` overrides the stored flavor preference for this view only.
    pub async fn verse(
        &self,
        chapter_number: u32,
        verse_number: u32,
        persona: Option<Persona>,
    ) -> Result<VerseDetail> {
        let chapter = self.chapter(chapter_number).await?;
        let position = chapter
            .verses
            .iter()
            .position(|v| v.verse_number == verse_number)
            .ok_or_else(|| {
                GitaError::NotFound(format!(
                    "Verse {}.{} does not exist",
                    chapter_number, verse_number
                ))
            })?;
        let verse = &chapter.verses[position];

        let persona = match persona {
            Some(persona) => persona,
            None => self.preferences.persona()?,
        };

        let last = LastRead {
            chapter: chapter.number,
            verse: verse.verse_number,
            chapter_title: chapter.title.clone(),
        };
        if let Err(e) = self.preferences.set_last_read(&last) {
            warn!("Failed to record last-read position: {}", e);
        }

        Ok(VerseDetail {
            explanation: verse.explanation(persona).map(str::to_string),
            persona,
            bookmarked: self.preferences.is_bookmarked(chapter.number, verse.verse_number)?,
            previous: position
                .checked_sub(1)
                .map(|i| chapter.verses[i].verse_number),
            next: chapter.verses.get(position + 1).map(|v| v.verse_number),
            location: VerseRef::new(&chapter, verse),
        })
    }

    pub fn last_read(&self) -> Result<Option<LastRead>> {
        self.preferences.last_read()
    }

    /// Case-insensitive scan over every chapter, in corpus order.
    ///
    /// Chapters that cannot be loaded are skipped.
    pub async fn search(&self, query: &str) -> Vec<VerseRef> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < MIN_QUERY_LEN {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for number in 1..=CHAPTER_COUNT {
            let Some(chapter) = self.fetcher.load_chapter(number).await else {
                debug!("Search skipping unavailable chapter {}", number);
                continue;
            };

            for verse in &chapter.verses {
                if verse.searchable_text().contains(&query) {
                    hits.push(VerseRef::new(&chapter, verse));
                    if hits.len() == MAX_SEARCH_RESULTS {
                        return hits;
                    }
                }
            }
        }
        hits
    }

    pub async fn verse_of_the_day(&self) -> Option<VerseRef> {
        self.daily_verse(Local::now().date_naive()).await
    }

    pub async fn daily_verse(&self, date: NaiveDate) -> Option<VerseRef> {
        let day = date.ordinal();
        let chapter = self.fetcher.load_chapter(day % CHAPTER_COUNT + 1).await?;
        if chapter.verses.is_empty() {
            return None;
        }
        let verse = &chapter.verses[day as usize % chapter.verses.len()];
        Some(VerseRef::new(&chapter, verse))
    }

    pub fn toggle_bookmark(&self, chapter: u32, verse: u32) -> Result<bool> {
        self.preferences.toggle_bookmark(chapter, verse)
    }

    /// Bookmarks resolved to their verses. Bookmarks whose chapter or verse
    /// cannot be loaded are left out.
    pub async fn bookmarks(&self) -> Result<Vec<(Bookmark, VerseRef)>> {
        let mut resolved = Vec::new();
        for bookmark in self.preferences.bookmark_list()? {
            let Some(chapter) = self.fetcher.load_chapter(bookmark.chapter).await else {
                continue;
            };
            if let Some(verse) = chapter.verse(bookmark.verse) {
                let location = VerseRef::new(&chapter, verse);
                resolved.push((bookmark, location));
            }
        }
        Ok(resolved)
    }
}

pub fn share_text(chapter: u32, verse: &Verse) -> String {
    format!(
        "{}\n\n{}\n\nBhagavad Gita {}.{}",
        verse.primary_text,
        verse.translation_text(),
        chapter,
        verse.verse_number
    )
}
