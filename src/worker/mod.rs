//! Background request-interception worker.
//!
//! The worker runs as its own tokio task and shares no state with the
//! application: pages talk to it through [`WorkerHandle`], which forwards
//! requests and events over a channel.
//!
//! ```text
//! page → WorkerHandle → ServiceWorker → cache hit?  → cached response
//!                                     → cache miss → network (→ runtime cache)
//! ```

mod cache;
mod clients;
mod config;
mod container;

pub use cache::{CacheStorage, SqliteCacheStorage};
pub use clients::{Clients, DesktopClients, Notification, PushPayload};
pub use config::{WorkerConfig, SYNC_BOOKMARKS_TAG};
pub use container::{Registration, ServiceWorkerContainer};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Method;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::{GitaError, Result};
use crate::fetcher::{Request, Response, Transport};

/// Lifecycle states of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed or the worker was unregistered.
    Redundant,
}

impl WorkerState {
    pub fn controls_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, WorkerState::Activated | WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Messages delivered to the worker task
#[derive(Debug)]
pub enum WorkerEvent {
    Fetch {
        request: Request,
        respond_to: oneshot::Sender<Result<Response>>,
    },
    Sync {
        tag: String,
    },
    Push {
        payload: Option<Vec<u8>>,
    },
    NotificationClick {
        notification: Notification,
    },
    Terminate,
}

/// Handle to send requests and events to a running worker
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerEvent>,
    state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn is_terminated(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the worker task has stopped.
    pub async fn terminated(&self) {
        self.tx.closed().await
    }

    /// Waits until the worker has either activated or become redundant.
    pub async fn ready(&self) -> WorkerState {
        let mut state = self.state.clone();
        let settled = match state.wait_for(|s| s.is_settled()).await {
            Ok(settled) => *settled,
            Err(_) => WorkerState::Redundant,
        };
        settled
    }

    pub async fn fetch(&self, request: Request) -> Result<Response> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(WorkerEvent::Fetch {
                request,
                respond_to,
            })
            .await
            .map_err(|_| GitaError::NetworkFailure("Service worker is gone".into()))?;

        response
            .await
            .map_err(|_| GitaError::NetworkFailure("Service worker dropped the request".into()))?
    }

    pub async fn sync(&self, tag: &str) {
        self.post(WorkerEvent::Sync {
            tag: tag.to_string(),
        })
        .await;
    }

    pub async fn push(&self, payload: Option<Vec<u8>>) {
        self.post(WorkerEvent::Push { payload }).await;
    }

    pub async fn notification_click(&self, notification: Notification) {
        self.post(WorkerEvent::NotificationClick { notification })
            .await;
    }

    pub async fn terminate(&self) {
        let _ = self.tx.send(WorkerEvent::Terminate).await;
    }

    async fn post(&self, event: WorkerEvent) {
        if let Err(e) = self.tx.send(event).await {
            warn!("Failed to post event to service worker: {}", e);
        }
    }
}

#[async_trait]
impl Transport for WorkerHandle {
    async fn send(&self, request: Request) -> Result<Response> {
        self.fetch(request).await
    }
}

/// Everything a worker needs, shared by its event handlers
struct WorkerScope {
    config: WorkerConfig,
    base_url: Url,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Transport + Send + Sync>,
    clients: Arc<dyn Clients>,
}

impl WorkerScope {
    fn resolve(&self, path: &str) -> Result<String> {
        Ok(self.base_url.join(path)?.to_string())
    }

    fn is_chapter_data(&self, url: &str) -> bool {
        let pattern = self.config.chapter_path_pattern.as_str();
        match Url::parse(url) {
            Ok(parsed) => parsed.path().contains(pattern),
            Err(_) => url.contains(pattern),
        }
    }

    /// Whether a previous session already stored every precache URL.
    fn holds_precache(&self, urls: &[String]) -> bool {
        let name = self.config.cache_name.as_str();
        urls.iter().all(|url| match self.caches.match_in(name, url) {
            Ok(hit) => hit.is_some(),
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", url, e);
                false
            }
        })
    }

    async fn install(&self) -> Result<()> {
        let urls = self
            .config
            .precache
            .iter()
            .map(|path| self.resolve(path))
            .collect::<Result<Vec<_>>>()?;

        if self.holds_precache(&urls) {
            info!(
                "Precache {} already complete, skipping install",
                self.config.cache_name
            );
            return Ok(());
        }

        let entries = try_join_all(urls.into_iter().map(|url| async move {
            let response = self.network.send(Request::get(url.as_str())).await?;
            if !response.is_success() {
                return Err(GitaError::NetworkFailure(format!(
                    "Precache of {} returned status {}",
                    url, response.status
                )));
            }
            Ok::<_, GitaError>((url, response))
        }))
        .await?;

        self.caches.put_all(&self.config.cache_name, &entries)?;
        info!(
            "Precached {} entries into {}",
            entries.len(),
            self.config.cache_name
        );
        Ok(())
    }

    async fn activate(&self) -> Result<()> {
        for name in self.caches.keys()? {
            if !self.config.owns_cache(&name) {
                self.caches.delete(&name)?;
                info!("Deleted stale cache {}", name);
            }
        }
        self.clients.claim().await;
        Ok(())
    }

    async fn handle_fetch(&self, request: Request) -> Result<Response> {
        if request.method != Method::GET {
            return self.network.send(request).await;
        }

        match self.caches.match_url(&request.url) {
            Ok(Some(cached)) => {
                debug!("Cache hit for {}", request.url);
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup failed for {}: {}", request.url, e),
        }

        let runtime = self.config.runtime_cache_name.as_str();
        if let Err(e) = self.caches.open(runtime) {
            warn!("Failed to open cache {}: {}", runtime, e);
        }

        match self.network.send(request.clone()).await {
            Ok(response) => {
                if response.is_success() && self.is_chapter_data(&request.url) {
                    if let Err(e) = self.caches.put(runtime, &request.url, &response) {
                        warn!("Failed to cache {}: {}", request.url, e);
                    }
                }
                Ok(response)
            }
            Err(e) => {
                let fallback = self
                    .resolve(&self.config.fallback_document)
                    .and_then(|url| self.caches.match_url(&url));
                match fallback {
                    Ok(Some(document)) => {
                        info!("Network failed for {}, serving fallback document", request.url);
                        Ok(document)
                    }
                    _ => Err(e),
                }
            }
        }
    }

    async fn handle_sync(&self, tag: &str) {
        if tag == SYNC_BOOKMARKS_TAG {
            self.sync_bookmarks().await;
        } else {
            debug!("Ignoring sync event with tag {}", tag);
        }
    }

    /// Extension point for syncing bookmarks; bookmarks are local-only.
    async fn sync_bookmarks(&self) {
        debug!("Syncing bookmarks...");
    }

    async fn handle_push(&self, payload: Option<&[u8]>) {
        let payload = match payload {
            Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|e| {
                warn!("Unreadable push payload, using defaults: {}", e);
                PushPayload::default()
            }),
            None => PushPayload::default(),
        };

        if let Err(e) = self.clients.show_notification(payload.into()).await {
            warn!("Failed to show notification: {}", e);
        }
    }

    async fn handle_notification_click(&self, notification: Notification) {
        let target = notification.url.as_deref().unwrap_or("./");
        let url = match self.resolve(target) {
            Ok(url) => url,
            Err(e) => {
                warn!("Notification points at an invalid URL {}: {}", target, e);
                return;
            }
        };

        if let Err(e) = self.clients.open_window(&url).await {
            warn!("Failed to open {}: {}", url, e);
        }
    }
}

/// The worker task: installs, activates, then serves events until terminated
pub struct ServiceWorker {
    scope: Arc<WorkerScope>,
    rx: mpsc::Receiver<WorkerEvent>,
    state: watch::Sender<WorkerState>,
}

impl ServiceWorker {
    /// Create a new worker and return a handle to communicate with it
    pub fn new(
        config: WorkerConfig,
        base_url: Url,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Transport + Send + Sync>,
        clients: Arc<dyn Clients>,
    ) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel(100);
        let (state_tx, state_rx) = watch::channel(WorkerState::Parsed);

        let scope = Arc::new(WorkerScope {
            config,
            base_url,
            caches,
            network,
            clients,
        });
        let worker = Self {
            scope,
            rx,
            state: state_tx,
        };
        let handle = WorkerHandle {
            tx,
            state: state_rx,
        };
        (worker, handle)
    }

    fn set_state(&self, state: WorkerState) {
        debug!("Service worker {}", state);
        self.state.send_replace(state);
    }

    /// Run the worker loop
    pub async fn run(mut self) {
        self.set_state(WorkerState::Installing);
        match self.scope.install().await {
            Ok(()) => {
                self.set_state(WorkerState::Installed);
                self.set_state(WorkerState::Activating);
                if let Err(e) = self.scope.activate().await {
                    warn!("Activation cleanup failed: {}", e);
                }
                self.set_state(WorkerState::Activated);
                info!("Service worker activated");
            }
            Err(e) => {
                error!("Service worker install failed: {}", e);
                self.set_state(WorkerState::Redundant);
            }
        }

        while let Some(event) = self.rx.recv().await {
            match event {
                WorkerEvent::Fetch {
                    request,
                    respond_to,
                } => {
                    let scope = self.scope.clone();
                    let controlling = self.state.borrow().controls_fetch();

                    tokio::spawn(async move {
                        let response = if controlling {
                            scope.handle_fetch(request).await
                        } else {
                            scope.network.send(request).await
                        };
                        let _ = respond_to.send(response);
                    });
                }
                WorkerEvent::Sync { tag } => self.scope.handle_sync(&tag).await,
                WorkerEvent::Push { payload } => {
                    self.scope.handle_push(payload.as_deref()).await
                }
                WorkerEvent::NotificationClick { notification } => {
                    self.scope.handle_notification_click(notification).await
                }
                WorkerEvent::Terminate => {
                    info!("Service worker terminating");
                    break;
                }
            }
        }

        self.set_state(WorkerState::Redundant);
    }
}

/// Spawn a worker as a tokio task
pub fn spawn_worker(
    config: WorkerConfig,
    base_url: Url,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Transport + Send + Sync>,
    clients: Arc<dyn Clients>,
) -> WorkerHandle {
    let (worker, handle) = ServiceWorker::new(config, base_url, caches, network, clients);

    tokio::spawn(async move {
        worker.run().await;
    });

    handle
}
