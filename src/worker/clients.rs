use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::app::Result;

const DEFAULT_TITLE: &str = "Bhagavad Gita";
const DEFAULT_BODY: &str = "Your daily verse is ready";
const ICON: &str = "/icon-192.png";

/// Body of a push message. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Page to open when the notification is clicked.
    pub url: Option<String>,
}

impl From<PushPayload> for Notification {
    fn from(payload: PushPayload) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: ICON.to_string(),
            badge: ICON.to_string(),
            url: payload.url,
        }
    }
}

/// The pages a worker serves, as seen from inside the worker.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Takes control of already-open pages without waiting for a reload.
    async fn claim(&self);
    async fn show_notification(&self, notification: Notification) -> Result<()>;
    /// Focuses an existing page at `url` or opens a new one.
    async fn open_window(&self, url: &str) -> Result<()>;
}

/// Desktop host: notifications go to the log, windows open in the
/// system browser.
pub struct DesktopClients;

#[async_trait]
impl Clients for DesktopClients {
    async fn claim(&self) {
        info!("Worker now controls open pages");
    }

    async fn show_notification(&self, notification: Notification) -> Result<()> {
        info!("{}: {}", notification.title, notification.body);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        open::that_detached(url)?;
        Ok(())
    }
}
