use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use super::{spawn_worker, CacheStorage, Clients, WorkerConfig, WorkerHandle};
use crate::app::{GitaError, Result};
use crate::fetcher::{Request, Response, Transport};

/// A worker registered for a URL scope
#[derive(Clone)]
pub struct Registration {
    pub scope: String,
    pub handle: WorkerHandle,
}

/// Registers interception workers and routes application requests through
/// the one in control.
pub struct ServiceWorkerContainer {
    base_url: Url,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Transport + Send + Sync>,
    clients: Arc<dyn Clients>,
    registrations: Mutex<Vec<Registration>>,
}

impl ServiceWorkerContainer {
    pub fn new(
        base_url: Url,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Transport + Send + Sync>,
        clients: Arc<dyn Clients>,
    ) -> Self {
        Self {
            base_url,
            caches,
            network,
            clients,
            registrations: Mutex::new(Vec::new()),
        }
    }

    fn registrations(&self) -> Result<MutexGuard<'_, Vec<Registration>>> {
        self.registrations
            .lock()
            .map_err(|e| GitaError::Other(format!("Registration list poisoned: {}", e)))
    }

    /// Spawns a worker for `scope`. A worker already registered for the same
    /// scope is terminated and replaced.
    pub async fn register(&self, scope: &str, config: WorkerConfig) -> Result<WorkerHandle> {
        let scope_url = self.base_url.join(scope)?.to_string();
        let handle = spawn_worker(
            config,
            self.base_url.clone(),
            self.caches.clone(),
            self.network.clone(),
            self.clients.clone(),
        );

        let replaced = {
            let mut registrations = self.registrations()?;
            let previous = registrations
                .iter()
                .position(|r| r.scope == scope_url)
                .map(|i| registrations.remove(i));
            registrations.push(Registration {
                scope: scope_url.clone(),
                handle: handle.clone(),
            });
            previous
        };

        if let Some(previous) = replaced {
            debug!("Replacing worker registered for {}", scope_url);
            previous.handle.terminate().await;
        }

        info!("Registered service worker for {}", scope_url);
        Ok(handle)
    }

    pub fn get_registrations(&self) -> Result<Vec<Registration>> {
        Ok(self.registrations()?.clone())
    }

    /// The worker that intercepts requests, if any.
    pub fn controller(&self) -> Option<WorkerHandle> {
        let registrations = self.registrations().ok()?;
        registrations
            .iter()
            .map(|r| &r.handle)
            .find(|h| !h.is_terminated() && h.state().controls_fetch())
            .cloned()
    }

    /// Terminates and forgets the worker for `scope`. Returns `false` when
    /// nothing was registered there.
    pub async fn unregister(&self, scope: &str) -> Result<bool> {
        let removed = {
            let mut registrations = self.registrations()?;
            registrations
                .iter()
                .position(|r| r.scope == scope)
                .map(|i| registrations.remove(i))
        };

        match removed {
            Some(registration) => {
                registration.handle.terminate().await;
                info!("Unregistered service worker for {}", scope);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl Transport for ServiceWorkerContainer {
    async fn send(&self, request: Request) -> Result<Response> {
        match self.controller() {
            Some(worker) => worker.fetch(request).await,
            None => self.network.send(request).await,
        }
    }
}
