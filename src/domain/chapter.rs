use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::app::{GitaError, Result};

/// Number of chapters in the corpus.
pub const CHAPTER_COUNT: u32 = 18;

/// Audience flavor of a verse explanation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Millennial,
    GenZ,
    GenAlpha,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Millennial, Persona::GenZ, Persona::GenAlpha];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Millennial => "millennial",
            Persona::GenZ => "genz",
            Persona::GenAlpha => "genalpha",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = GitaError;

    fn from_str(s: &str) -> Result<Self> {
        Persona::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GitaError::ParseFailure(format!("Unknown persona: {}", s)))
    }
}

/// Entry of the chapter index (`data/chapters.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMeta {
    pub number: u32,
    pub title: String,
    #[serde(default, alias = "sanskrit")]
    pub native_title: String,
    #[serde(alias = "verses")]
    pub verse_count: u32,
}

impl ChapterMeta {
    fn new(number: u32, title: &str, native_title: &str, verse_count: u32) -> Self {
        Self {
            number,
            title: title.to_string(),
            native_title: native_title.to_string(),
            verse_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    pub verse_number: u32,
    #[serde(alias = "sanskrit")]
    pub primary_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transliteration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Explanation written for no particular audience.
    #[serde(default, alias = "modern", skip_serializing_if = "Option::is_none")]
    pub generic_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub explanations: BTreeMap<Persona, String>,
}

impl Verse {
    pub fn new(verse_number: u32, primary_text: impl Into<String>) -> Self {
        Self {
            verse_number,
            primary_text: primary_text.into(),
            transliteration: None,
            translation: None,
            generic_explanation: None,
            explanations: BTreeMap::new(),
        }
    }

    /// Explanation for `persona`, falling back to the generic text and then
    /// to whichever persona variant exists.
    pub fn explanation(&self, persona: Persona) -> Option<&str> {
        self.explanations
            .get(&persona)
            .or(self.generic_explanation.as_ref())
            .or_else(|| self.explanations.values().next())
            .map(String::as_str)
    }

    pub fn translation_text(&self) -> &str {
        self.translation.as_deref().unwrap_or("")
    }

    /// Text searched by the reader's linear scan.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.primary_text.len() * 2);
        text.push_str(&self.primary_text);
        for part in self
            .translation
            .iter()
            .chain(self.generic_explanation.iter())
            .chain(self.explanations.values())
        {
            text.push(' ');
            text.push_str(part);
        }
        text.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    #[serde(default, alias = "sanskrit")]
    pub native_title: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(alias = "shlokas")]
    pub verses: Vec<Verse>,
}

impl Chapter {
    /// Looks a verse up by its number, never by its position.
    pub fn verse(&self, verse_number: u32) -> Option<&Verse> {
        self.verses.iter().find(|v| v.verse_number == verse_number)
    }

    /// Parses a chapter resource body and checks it belongs to `expected`.
    pub fn from_json(body: &[u8], expected: u32) -> Result<Self> {
        let chapter: Chapter = serde_json::from_slice(body)?;
        chapter.validate(expected)?;
        Ok(chapter)
    }

    pub fn validate(&self, expected: u32) -> Result<()> {
        if self.number != expected {
            return Err(GitaError::ParseFailure(format!(
                "Expected chapter {}, got chapter {}",
                expected, self.number
            )));
        }
        if self.verses.is_empty() {
            return Err(GitaError::ParseFailure(format!(
                "Chapter {} has no verses",
                self.number
            )));
        }
        Ok(())
    }

    pub fn meta(&self) -> ChapterMeta {
        ChapterMeta {
            number: self.number,
            title: self.title.clone(),
            native_title: self.native_title.clone(),
            verse_count: self.verses.len() as u32,
        }
    }
}

/// Built-in index used when neither the store nor the network has one.
pub fn default_index() -> Vec<ChapterMeta> {
    vec![
        ChapterMeta::new(1, "Arjuna's Dilemma", "अर्जुनविषादयोग", 47),
        ChapterMeta::new(2, "The Path of Knowledge", "सांख्ययोग", 72),
        ChapterMeta::new(3, "The Path of Action", "कर्मयोग", 43),
        ChapterMeta::new(4, "The Path of Wisdom", "ज्ञानकर्मसंन्यासयोग", 42),
        ChapterMeta::new(5, "Action and Renunciation", "कर्मसंन्यासयोग", 29),
        ChapterMeta::new(6, "The Path of Meditation", "आत्मसंयमयोग", 47),
        ChapterMeta::new(7, "Knowledge and Wisdom", "ज्ञानविज्ञानयोग", 30),
        ChapterMeta::new(8, "The Eternal Brahman", "अक्षरब्रह्मयोग", 28),
        ChapterMeta::new(9, "Royal Knowledge", "राजविद्याराजगुह्ययोग", 34),
        ChapterMeta::new(10, "Divine Manifestations", "विभूतियोग", 42),
        ChapterMeta::new(11, "The Universal Form", "विश्वरूपदर्शनयोग", 55),
        ChapterMeta::new(12, "The Path of Devotion", "भक्तियोग", 20),
        ChapterMeta::new(13, "Field and Knower", "क्षेत्रक्षेत्रज्ञविभागयोग", 35),
        ChapterMeta::new(14, "Three Qualities", "गुणत्रयविभागयोग", 27),
        ChapterMeta::new(15, "The Supreme Person", "पुरुषोत्तमयोग", 20),
        ChapterMeta::new(16, "Divine and Demonic", "दैवासुरसम्पद्विभागयोग", 24),
        ChapterMeta::new(17, "Three Types of Faith", "श्रद्धात्रयविभागयोग", 28),
        ChapterMeta::new(18, "Liberation Through Renunciation", "मोक्षसंन्यासयोग", 78),
    ]
}
