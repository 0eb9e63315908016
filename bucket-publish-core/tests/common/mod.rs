#![allow(dead_code)]

//! Hand-written async fakes for tests that need real suspension points
//! (concurrency ceilings, deadlines), which the mockall mocks cannot model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bucket_publish_core::contract::{
    CapabilityError, FixedOrigin, PutObject, PutOutcome, RemoteObject, RenderRequest,
    RenderedResponse, Renderer, Store, WebsiteConfig,
};

/// Tracks how many render/upload pairs are in flight and the highest value seen.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A renderer serving fixed pages, with optional per-page status and delay.
pub struct FakeSite {
    pub resources: Vec<String>,
    pub statuses: HashMap<String, u16>,
    pub delays: HashMap<String, Duration>,
    pub delay: Duration,
    pub gauge: Arc<Gauge>,
    pub renders: AtomicUsize,
}

impl FakeSite {
    pub fn new(resources: Vec<String>, gauge: Arc<Gauge>) -> Self {
        Self {
            resources,
            statuses: HashMap::new(),
            delays: HashMap::new(),
            delay: Duration::from_millis(5),
            gauge,
            renders: AtomicUsize::new(0),
        }
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeSite {
    async fn listing(&self) -> Result<Vec<String>, CapabilityError> {
        Ok(self.resources.clone())
    }

    async fn render<'a>(&self, req: RenderRequest<'a>) -> Result<RenderedResponse, CapabilityError> {
        self.gauge.enter();
        self.renders.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.get(req.identifier).copied().unwrap_or(self.delay);
        tokio::time::sleep(delay).await;
        let status = self.statuses.get(req.identifier).copied().unwrap_or(200);
        if status != 200 {
            // No upload follows a failed render.
            self.gauge.leave();
        }
        Ok(RenderedResponse {
            status: Some(status),
            content_type: Some("text/html".to_string()),
            body: format!("<p>{}</p>", req.identifier).into_bytes(),
        })
    }

    fn fixed_origin(&self) -> Option<FixedOrigin> {
        None
    }
}

/// A store that records every put and closes the gauge's pair on upload.
pub struct RecordingStore {
    pub website: Option<WebsiteConfig>,
    pub puts: Mutex<Vec<String>>,
    pub delay: Duration,
    pub gauge: Arc<Gauge>,
}

impl RecordingStore {
    pub fn new(gauge: Arc<Gauge>) -> Self {
        Self {
            website: None,
            puts: Mutex::new(Vec::new()),
            delay: Duration::from_millis(5),
            gauge,
        }
    }

    pub fn put_keys(&self) -> Vec<String> {
        let mut keys = self.puts.lock().unwrap().clone();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn get_bucket_website(&self, _bucket: &str) -> Result<Option<WebsiteConfig>, CapabilityError> {
        Ok(self.website.clone())
    }

    async fn put_object<'a>(&self, req: PutObject<'a>) -> Result<PutOutcome, CapabilityError> {
        tokio::time::sleep(self.delay).await;
        self.puts.lock().unwrap().push(req.key.to_string());
        self.gauge.leave();
        Ok(PutOutcome::default())
    }

    async fn head_object(&self, _bucket: &str, _key: &str) -> Result<Option<RemoteObject>, CapabilityError> {
        Ok(None)
    }
}

pub fn uris(base: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{base}/page-{i}.html")).collect()
}
