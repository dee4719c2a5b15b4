use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::{GitaError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = GitaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(GitaError::ParseFailure(format!("Unknown theme: {}", other))),
        }
    }
}

/// Pointer to the verse the reader opened most recently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRead {
    pub chapter: u32,
    pub verse: u32,
    pub chapter_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub chapter: u32,
    pub verse: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Bookmark {
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self {
            chapter,
            verse,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Key of this bookmark in the persisted `bookmarks` map.
    pub fn key(chapter: u32, verse: u32) -> String {
        format!("{}-{}", chapter, verse)
    }
}
