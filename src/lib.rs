//! # Gita
//!
//! An offline-first reader for the 18 chapters of the Bhagavad Gita.
//!
//! ## Architecture
//!
//! Chapters flow through two independent caches:
//!
//! ```text
//! Reader → ContentFetcher → ContentStore (hit)
//!                         → ServiceWorkerContainer → worker cache (hit)
//!                                                  → network
//! ```
//!
//! - [`store`]: SQLite content store and preference storage
//! - [`fetcher`]: store-first chapter loading over a pluggable transport
//! - [`worker`]: background request interception with its own cache
//! - [`refresh`]: full local reset, keeping a few preferences
//!
//! ## Quick Start
//!
//! ```bash
//! # List chapters
//! gita chapters
//!
//! # Read a verse with the Gen Z explanation
//! gita verse 2 47 --persona genz
//!
//! # Drop every cached chapter and start over
//! gita refresh
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components
/// for one session: stores, worker container, fetcher, reader and refresh.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/gita/config.toml`.
pub mod config;

/// Chapters, verses, personas and reader preferences.
pub mod domain;

/// Chapter loading.
///
/// - [`Transport`](fetcher::Transport): async trait for sending requests
/// - [`HttpTransport`](fetcher::HttpTransport): reqwest-based implementation
/// - [`ContentFetcher`](fetcher::ContentFetcher): content store first, network on miss
pub mod fetcher;

/// Plain-data views: chapter list, verse detail, search, verse of the day,
/// bookmarks and share text.
pub mod reader;

/// "Refresh data": clears every cache and unregisters the worker.
pub mod refresh;

/// SQLite persistence.
///
/// - [`ContentStore`](store::ContentStore): chapters and the chapter index
/// - [`Preferences`](store::Preferences): theme, persona, last read, bookmarks
pub mod store;

/// Background worker intercepting requests.
///
/// Runs as its own task; precaches the static assets on install, drops stale
/// caches on activate and caches chapter data as it passes through.
pub mod worker;

#[cfg(test)]
mod testing;
