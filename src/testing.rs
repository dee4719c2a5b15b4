//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::app::{GitaError, Result};
use crate::domain::{Chapter, ChapterMeta, Persona, Verse};
use crate::fetcher::{Request, Response, Transport};
use crate::worker::{Clients, Notification};

pub const BASE: &str = "http://gita.test/";

pub fn base_url() -> Url {
    Url::parse(BASE).unwrap()
}

pub fn url(path: &str) -> String {
    base_url().join(path).unwrap().to_string()
}

pub fn sample_chapter(number: u32, verses: u32) -> Chapter {
    Chapter {
        number,
        title: format!("Chapter {}", number),
        native_title: "योग".into(),
        introduction: format!("Introduction to chapter {}", number),
        verses: (1..=verses)
            .map(|n| {
                let mut verse = Verse::new(n, format!("श्लोक {}.{}", number, n));
                verse.translation = Some(format!("Translation of {}.{}", number, n));
                verse
                    .explanations
                    .insert(Persona::GenZ, format!("Vibe check {}.{}", number, n));
                verse
            })
            .collect(),
    }
}

pub fn chapter_response(chapter: &Chapter) -> Response {
    Response::ok(serde_json::to_vec(chapter).unwrap()).with_content_type("application/json")
}

/// In-process network: canned responses per URL, with a call log.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<Request>>,
    offline: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: impl Into<String>, response: Response) {
        self.routes.lock().unwrap().insert(url.into(), response);
    }

    pub fn route_chapter(&self, chapter: &Chapter) {
        self.route(
            url(&format!("data/chapters/chapter-{}.json", chapter.number)),
            chapter_response(chapter),
        );
    }

    pub fn route_index(&self, index: &[ChapterMeta]) {
        self.route(
            url("data/chapters.json"),
            Response::ok(serde_json::to_vec(index).unwrap()),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.calls.lock().unwrap().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(GitaError::NetworkFailure("offline".into()));
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "Not Found")))
    }
}

/// Records what the worker asked of its pages.
#[derive(Default)]
pub struct RecordingClients {
    claims: Mutex<usize>,
    notifications: Mutex<Vec<Notification>>,
    opened: Mutex<Vec<String>>,
}

impl RecordingClients {
    pub fn claims(&self) -> usize {
        *self.claims.lock().unwrap()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clients for RecordingClients {
    async fn claim(&self) {
        *self.claims.lock().unwrap() += 1;
    }

    async fn show_notification(&self, notification: Notification) -> Result<()> {
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
