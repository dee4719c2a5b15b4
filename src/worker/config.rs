use serde::{Deserialize, Serialize};

/// Tag of the background-sync event reserved for bookmarks.
pub const SYNC_BOOKMARKS_TAG: &str = "sync-bookmarks";

/// Configuration for the background interception worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache partition holding the precached static assets (default: "gita-v1")
    pub cache_name: String,

    /// Cache partition filled at runtime with chapter data (default: "gita-runtime")
    pub runtime_cache_name: String,

    /// Paths fetched and stored before the worker takes control, resolved
    /// against the base URL
    pub precache: Vec<String>,

    /// Document served when the network fails and nothing is cached, relative
    /// to the base URL (default: "index.html")
    pub fallback_document: String,

    /// Path fragment marking chapter-data URLs (default: "/data/chapters/")
    pub chapter_path_pattern: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "gita-v1".to_string(),
            runtime_cache_name: "gita-runtime".to_string(),
            precache: vec![
                "./".to_string(),
                "index.html".to_string(),
                "styles.css".to_string(),
                "app.js".to_string(),
                "manifest.json".to_string(),
                "data/chapters.json".to_string(),
            ],
            fallback_document: "index.html".to_string(),
            chapter_path_pattern: "/data/chapters/".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Whether `name` is one of the two partitions this worker version owns.
    pub fn owns_cache(&self, name: &str) -> bool {
        name == self.cache_name || name == self.runtime_cache_name
    }
}
