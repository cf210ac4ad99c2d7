#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;

use boxart::app::{SessionEvent, SessionSink};
use boxart::domain::{ImageCandidate, PlatformId, SourceId};
use boxart::error::BoxartError;
use boxart::http::{HttpResponse, Transport};
use boxart::providers::{CoverSource, SourceQuery};
use boxart::store::Store;

pub fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read(&path).unwrap_or_else(|err| panic!("fixture {}: {err}", path.display()))
}

pub fn platform(id: &str) -> PlatformId {
    id.parse().unwrap()
}

/// A store with `platform` rooted in a fresh temporary directory.
pub fn temp_store(platform_id: &str) -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::default().with_platform(platform(platform_id), root);
    (temp, store)
}

pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> HttpResponse {
    HttpResponse {
        status: 200,
        content_type: Some(content_type.to_string()),
        body: body.into(),
    }
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        content_type: Some("text/html".to_string()),
        body: b"error".to_vec(),
    }
}

/// Answers with the first route whose pattern occurs in the requested URL. Unrouted URLs
/// fail like an unreachable host.
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<(String, HttpResponse)>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, response: HttpResponse) -> Self {
        self.routes.push((pattern.to_string(), response));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn headers_for(&self, pattern: &str) -> Vec<(String, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(url, _)| url.contains(pattern))
            .map(|(_, headers)| headers.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, String> {
        self.requests.lock().unwrap().push((
            url.to_string(),
            headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        ));
        self.routes
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| format!("connection refused: {url}"))
    }
}

type Respond = dyn Fn(&SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> + Send + Sync;

/// A scripted source: fixed gating, an optional delay and a response per query.
pub struct MockSource {
    id: SourceId,
    needs_key: bool,
    only_platform: Option<String>,
    opt_in: bool,
    delay: Duration,
    respond: Box<Respond>,
    calls: Mutex<usize>,
    seen_keys: Mutex<Vec<Option<String>>>,
}

impl MockSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            needs_key: false,
            only_platform: None,
            opt_in: false,
            delay: Duration::ZERO,
            respond: Box::new(|_| Ok(Vec::new())),
            calls: Mutex::new(0),
            seen_keys: Mutex::new(Vec::new()),
        }
    }

    /// Returns one candidate per URL, whatever the query.
    pub fn returning(id: SourceId, urls: &[&str]) -> Self {
        let candidates: Vec<ImageCandidate> = urls
            .iter()
            .map(|url| ImageCandidate::new(*url, id))
            .collect();
        Self::new(id).respond(move |_| Ok(candidates.clone()))
    }

    pub fn failing(id: SourceId) -> Self {
        Self::new(id).respond(move |_| {
            Err(BoxartError::SourceStatus {
                adapter: id,
                status: 503,
            })
        })
    }

    pub fn respond<F>(mut self, respond: F) -> Self
    where
        F: Fn(&SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> + Send + Sync + 'static,
    {
        self.respond = Box::new(respond);
        self
    }

    pub fn needs_key(mut self) -> Self {
        self.needs_key = true;
        self
    }

    pub fn only_on(mut self, platform: &str) -> Self {
        self.only_platform = Some(platform.to_string());
        self
    }

    pub fn opt_in(mut self) -> Self {
        self.opt_in = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn seen_keys(&self) -> Vec<Option<String>> {
        self.seen_keys.lock().unwrap().clone()
    }
}

impl CoverSource for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn requires_credential(&self) -> bool {
        self.needs_key
    }

    fn applies_to(&self, platform: &PlatformId) -> bool {
        self.only_platform
            .as_deref()
            .is_none_or(|only| only == platform.as_str())
    }

    fn opt_in(&self) -> bool {
        self.opt_in
    }

    fn search(&self, query: &SourceQuery) -> Result<Vec<ImageCandidate>, BoxartError> {
        *self.calls.lock().unwrap() += 1;
        self.seen_keys.lock().unwrap().push(query.api_key.clone());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        (self.respond)(query)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SessionSink for RecordingSink {
    fn event(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}
