mod config;

pub use config::RefreshConfig;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::Result;
use crate::store::{ContentStore, Preferences};
use crate::worker::{CacheStorage, ServiceWorkerContainer};

/// The destructive steps of a refresh, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStep {
    ClearInterceptionCache,
    ClearContentStore,
    ResetPreferences,
    UnregisterWorkers,
}

impl RefreshStep {
    pub const ALL: [RefreshStep; 4] = [
        RefreshStep::ClearInterceptionCache,
        RefreshStep::ClearContentStore,
        RefreshStep::ResetPreferences,
        RefreshStep::UnregisterWorkers,
    ];
}

impl fmt::Display for RefreshStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshStep::ClearInterceptionCache => "clear interception cache",
            RefreshStep::ClearContentStore => "clear content store",
            RefreshStep::ResetPreferences => "reset preferences",
            RefreshStep::UnregisterWorkers => "unregister workers",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub failed_steps: Vec<RefreshStep>,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

/// The display layer, as far as a refresh is concerned.
pub trait Shell: Send + Sync {
    /// Shows the single user-visible success or failure signal.
    fn signal(&self, outcome: &RefreshOutcome);

    /// Tears down and rebuilds the application.
    fn reload(&self);
}

/// Wipes every local cache and most preferences, then reloads.
pub struct RefreshController {
    config: RefreshConfig,
    caches: Arc<dyn CacheStorage>,
    store: Arc<dyn ContentStore>,
    preferences: Arc<dyn Preferences>,
    workers: Arc<ServiceWorkerContainer>,
    shell: Arc<dyn Shell>,
}

impl RefreshController {
    pub fn new(
        config: RefreshConfig,
        caches: Arc<dyn CacheStorage>,
        store: Arc<dyn ContentStore>,
        preferences: Arc<dyn Preferences>,
        workers: Arc<ServiceWorkerContainer>,
        shell: Arc<dyn Shell>,
    ) -> Self {
        Self {
            config,
            caches,
            store,
            preferences,
            workers,
            shell,
        }
    }

    /// Runs every step even when earlier ones fail; re-running is the retry.
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();

        for step in RefreshStep::ALL {
            let result = match step {
                RefreshStep::ClearInterceptionCache => self.clear_interception_cache(),
                RefreshStep::ClearContentStore => self.store.delete_all(),
                RefreshStep::ResetPreferences => self.reset_preferences(),
                RefreshStep::UnregisterWorkers => self.unregister_workers().await,
            };

            match result {
                Ok(()) => info!("Refresh: {} done", step),
                Err(e) => {
                    warn!("Refresh: {} failed: {}", step, e);
                    outcome.failed_steps.push(step);
                }
            }
        }

        self.shell.signal(&outcome);
        tokio::time::sleep(Duration::from_millis(self.config.reload_delay_ms)).await;
        self.shell.reload();

        outcome
    }

    fn clear_interception_cache(&self) -> Result<()> {
        for name in self.caches.keys()? {
            self.caches.delete(&name)?;
        }
        Ok(())
    }

    fn reset_preferences(&self) -> Result<()> {
        self.preferences.retain(&self.config.preserve)
    }

    async fn unregister_workers(&self) -> Result<()> {
        for registration in self.workers.get_registrations()? {
            self.workers.unregister(&registration.scope).await?;
        }
        Ok(())
    }
}
