pub mod commands;

use clap::{Parser, Subcommand};

use crate::domain::{Persona, Theme};
use crate::refresh::{RefreshOutcome, Shell};

#[derive(Parser)]
#[command(name = "gita")]
#[command(about = "An offline-first Bhagavad Gita reader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all chapters
    Chapters,
    /// Show a chapter and its verses
    Chapter {
        /// Chapter number (1-18)
        number: u32,
    },
    /// Show a single verse
    Verse {
        chapter: u32,
        verse: u32,
        /// Explanation flavor: millennial, genz or genalpha
        #[arg(short, long)]
        persona: Option<Persona>,
    },
    /// Search all verses
    Search {
        query: String,
    },
    /// Show the verse of the day
    Daily,
    /// Print a verse in shareable form
    Share {
        chapter: u32,
        verse: u32,
    },
    /// Toggle a bookmark
    Bookmark {
        chapter: u32,
        verse: u32,
    },
    /// List bookmarked verses
    Bookmarks,
    /// Set the theme, or toggle it when omitted
    Theme {
        theme: Option<Theme>,
    },
    /// Deliver a push message to the worker
    Push {
        /// JSON payload: {"title": ..., "body": ..., "url": ...}
        payload: Option<String>,
    },
    /// Clear all cached data and unregister the worker
    Refresh,
}

/// Refresh signals and reloads, shown on the terminal.
pub struct ConsoleShell;

impl Shell for ConsoleShell {
    fn signal(&self, outcome: &RefreshOutcome) {
        if outcome.is_success() {
            println!("Data refreshed! Reloading...");
        } else {
            let steps: Vec<String> = outcome.failed_steps.iter().map(|s| s.to_string()).collect();
            eprintln!("Refresh failed ({}). Run it again to retry.", steps.join(", "));
        }
    }

    fn reload(&self) {
        println!("Done. Cached data will be fetched again on next use.");
    }
}
