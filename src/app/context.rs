use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::app::error::Result;
use crate::config::Config;
use crate::fetcher::{ContentFetcher, HttpTransport, Transport};
use crate::reader::Reader;
use crate::refresh::{RefreshController, Shell};
use crate::store::{ContentStore, SqlitePreferences, SqliteStore, UnavailableStore};
use crate::worker::{
    Clients, DesktopClients, ServiceWorkerContainer, SqliteCacheStorage, WorkerHandle,
};

const CONTENT_DB: &str = "content.db";
const PREFERENCES_DB: &str = "preferences.db";
const WORKER_CACHE_DB: &str = "worker-cache.db";

/// One application session. A reload drops the context and builds a new one.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn ContentStore>,
    pub preferences: Arc<SqlitePreferences>,
    pub caches: Arc<SqliteCacheStorage>,
    pub workers: Arc<ServiceWorkerContainer>,
    pub fetcher: Arc<ContentFetcher>,
    pub reader: Reader,
    pub refresh: RefreshController,
}

/// Opens the content store, or stands in an unavailable one so the session
/// still starts and reads from the network.
fn open_content_store(path: &Path) -> Arc<dyn ContentStore> {
    match SqliteStore::new(path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                "Content store at {} unavailable, reading from the network: {}",
                path.display(),
                e
            );
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    }
}

impl AppContext {
    pub fn new(config: Config, shell: Arc<dyn Shell>) -> Result<Self> {
        let network = Arc::new(HttpTransport::new()?);
        Self::open(config, network, Arc::new(DesktopClients), shell)
    }

    /// Context backed by the databases under the configured data directory.
    pub fn open(
        config: Config,
        network: Arc<dyn Transport + Send + Sync>,
        clients: Arc<dyn Clients>,
        shell: Arc<dyn Shell>,
    ) -> Result<Self> {
        let data_dir = config.data_dir()?;
        std::fs::create_dir_all(&data_dir)?;

        let store = open_content_store(&data_dir.join(CONTENT_DB));
        let preferences = Arc::new(SqlitePreferences::new(data_dir.join(PREFERENCES_DB))?);
        let caches = Arc::new(SqliteCacheStorage::new(data_dir.join(WORKER_CACHE_DB))?);

        Self::assemble(config, store, preferences, caches, network, clients, shell)
    }

    /// Context backed by in-memory databases.
    pub fn in_memory(
        config: Config,
        network: Arc<dyn Transport + Send + Sync>,
        clients: Arc<dyn Clients>,
        shell: Arc<dyn Shell>,
    ) -> Result<Self> {
        Self::assemble(
            config,
            Arc::new(SqliteStore::in_memory()?),
            Arc::new(SqlitePreferences::in_memory()?),
            Arc::new(SqliteCacheStorage::in_memory()?),
            network,
            clients,
            shell,
        )
    }

    fn assemble(
        config: Config,
        store: Arc<dyn ContentStore>,
        preferences: Arc<SqlitePreferences>,
        caches: Arc<SqliteCacheStorage>,
        network: Arc<dyn Transport + Send + Sync>,
        clients: Arc<dyn Clients>,
        shell: Arc<dyn Shell>,
    ) -> Result<Self> {
        let base_url = config.base_url()?;

        let workers = Arc::new(ServiceWorkerContainer::new(
            base_url.clone(),
            caches.clone(),
            network,
            clients,
        ));
        // Application requests go through whichever worker is in control
        let fetcher = Arc::new(ContentFetcher::new(
            store.clone(),
            workers.clone(),
            base_url,
        ));
        let reader = Reader::new(fetcher.clone(), preferences.clone());
        let refresh = RefreshController::new(
            config.refresh.clone(),
            caches.clone(),
            store.clone(),
            preferences.clone(),
            workers.clone(),
            shell,
        );

        Ok(Self {
            config,
            store,
            preferences,
            caches,
            workers,
            fetcher,
            reader,
            refresh,
        })
    }

    /// Registers the interception worker for the whole site and waits until
    /// it has installed (or failed to).
    pub async fn register_worker(&self) -> Result<WorkerHandle> {
        let handle = self
            .workers
            .register("./", self.config.worker.clone())
            .await?;
        handle.ready().await;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::Theme;
    use crate::fetcher::Response;
    use crate::refresh::RefreshOutcome;
    use crate::store::{ContentStore, PreferencesExt};
    use crate::testing::{sample_chapter, MockTransport, RecordingClients, BASE};
    use crate::worker::{CacheStorage, WorkerConfig, WorkerState};

    #[derive(Default)]
    struct QuietShell {
        reloads: Mutex<usize>,
    }

    impl Shell for QuietShell {
        fn signal(&self, _outcome: &RefreshOutcome) {}

        fn reload(&self) {
            *self.reloads.lock().unwrap() += 1;
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.source.base_url = BASE.to_string();
        config.refresh.reload_delay_ms = 0;
        config
    }

    fn online_network() -> Arc<MockTransport> {
        let network = Arc::new(MockTransport::new());
        for path in WorkerConfig::default().precache {
            network.route(crate::testing::url(&path), Response::ok("asset"));
        }
        network.route_chapter(&sample_chapter(3, 43));
        network
    }

    #[tokio::test]
    async fn test_session_reads_through_worker_and_store() {
        let network = online_network();
        let ctx = AppContext::in_memory(
            test_config(),
            network.clone(),
            Arc::new(RecordingClients::default()),
            Arc::new(QuietShell::default()),
        )
        .unwrap();
        assert_eq!(ctx.register_worker().await.unwrap().state(), WorkerState::Activated);

        let chapter = ctx.reader.chapter(3).await.unwrap();
        assert_eq!(chapter.verses.len(), 43);
        assert_eq!(ctx.store.cached_chapters().unwrap(), vec![3]);
        assert_eq!(ctx.caches.entry_count("gita-runtime").unwrap(), 1);

        // Offline, the content store answers
        network.set_offline(true);
        assert_eq!(ctx.reader.chapter(3).await.unwrap(), chapter);
    }

    #[tokio::test]
    async fn test_session_refresh_resets_state() {
        let shell = Arc::new(QuietShell::default());
        let ctx = AppContext::in_memory(
            test_config(),
            online_network(),
            Arc::new(RecordingClients::default()),
            shell.clone(),
        )
        .unwrap();
        ctx.register_worker().await.unwrap();
        ctx.reader.chapter(3).await.unwrap();
        ctx.preferences.set_theme(Theme::Light).unwrap();
        ctx.preferences.toggle_bookmark(3, 1).unwrap();

        assert!(ctx.refresh.refresh().await.is_success());

        assert!(ctx.store.cached_chapters().unwrap().is_empty());
        assert!(ctx.caches.keys().unwrap().is_empty());
        assert!(ctx.workers.controller().is_none());
        assert_eq!(ctx.preferences.theme().unwrap(), Theme::Light);
        assert!(ctx.preferences.bookmark_list().unwrap().is_empty());
        assert_eq!(*shell.reloads.lock().unwrap(), 1);
    }

    #[test]
    fn test_on_disk_session_creates_databases() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.storage.data_dir = Some(dir.path().join("gita"));

        AppContext::new(config, Arc::new(QuietShell::default())).unwrap();

        for db in [CONTENT_DB, PREFERENCES_DB, WORKER_CACHE_DB] {
            assert!(dir.path().join("gita").join(db).exists());
        }
    }

    #[tokio::test]
    async fn test_unreadable_content_store_falls_back_to_network() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("gita");
        std::fs::create_dir_all(&data_dir).unwrap();
        {
            // Written by a newer release
            let conn = rusqlite::Connection::open(data_dir.join(CONTENT_DB)).unwrap();
            conn.execute_batch("PRAGMA user_version = 7;").unwrap();
        }

        let mut config = test_config();
        config.storage.data_dir = Some(data_dir);
        let network = online_network();
        let ctx = AppContext::open(
            config,
            network.clone(),
            Arc::new(RecordingClients::default()),
            Arc::new(QuietShell::default()),
        )
        .unwrap();
        assert_eq!(ctx.register_worker().await.unwrap().state(), WorkerState::Activated);

        let chapter = ctx.reader.chapter(3).await.unwrap();
        assert_eq!(chapter.verses.len(), 43);
        assert!(ctx.store.cached_chapters().is_err());
        assert_eq!(network.calls_to(&crate::testing::url("data/chapters/chapter-3.json")), 1);
    }
}
