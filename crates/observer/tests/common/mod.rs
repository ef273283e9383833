#![allow(dead_code)]

use async_trait::async_trait;
use nextwatch_core::{
    DocumentSnapshot, HostEvent, ImageState, ObserverConfig, ObserverError, PageProbe, PaintTiming,
};
use nextwatch_observer::{EventSubscription, Observer, ObserverHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const CHUNK: &str = "/_next/static/chunks/main-3f2a.js";

/// Probe whose snapshot the test swaps at will. `None` behaves like a page
/// whose execution context was destroyed.
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    page: Arc<Mutex<Option<DocumentSnapshot>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(snapshot: DocumentSnapshot) -> Self {
        let probe = Self::default();
        probe.set(snapshot);
        probe
    }

    pub fn set(&self, snapshot: DocumentSnapshot) {
        *self.page.lock().unwrap() = Some(snapshot);
    }

    pub fn fail(&self) {
        *self.page.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageProbe for ScriptedProbe {
    async fn snapshot(&self) -> Result<DocumentSnapshot, ObserverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.page
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ObserverError::environment_unavailable("Execution context was destroyed"))
    }
}

/// Scripted probe whose every snapshot takes `delay` to answer, like a
/// round trip to a busy browser.
#[derive(Clone)]
pub struct SlowProbe {
    inner: ScriptedProbe,
    delay: std::time::Duration,
}

impl SlowProbe {
    pub fn new(inner: ScriptedProbe, delay_ms: u64) -> Self {
        Self { inner, delay: std::time::Duration::from_millis(delay_ms) }
    }
}

#[async_trait]
impl PageProbe for SlowProbe {
    async fn snapshot(&self) -> Result<DocumentSnapshot, ObserverError> {
        tokio::time::sleep(self.delay).await;
        self.inner.snapshot().await
    }
}

/// Rendered page with nothing that identifies the framework.
pub fn blank(route: &str) -> DocumentSnapshot {
    DocumentSnapshot {
        location: route.to_string(),
        has_body: true,
        paint: PaintTiming::Observed { first_contentful_paint: None },
        ..DocumentSnapshot::default()
    }
}

/// Framework present, but the view has not rendered yet.
pub fn framework_shell(route: &str) -> DocumentSnapshot {
    DocumentSnapshot {
        has_next_data: true,
        script_sources: vec![CHUNK.to_string()],
        body_children: 1,
        ..blank(route)
    }
}

/// Every signal satisfied.
pub fn hydrated(route: &str) -> DocumentSnapshot {
    DocumentSnapshot {
        has_next_data: true,
        next_data_has_props: true,
        has_next_runtime: true,
        script_sources: vec![CHUNK.to_string()],
        body_children: 2,
        content_text_lengths: vec![120, 40, 30],
        images: vec![ImageState::loaded(300)],
        paint: PaintTiming::Observed { first_contentful_paint: Some(42.0) },
        ..blank(route)
    }
}

pub fn config(timeout: u64, check_interval: u64) -> ObserverConfig {
    ObserverConfig::default()
        .with_debug(false)
        .with_timeout(timeout)
        .with_check_interval(check_interval)
}

pub struct Harness {
    pub handle: ObserverHandle,
    pub host: mpsc::Sender<HostEvent>,
    pub events: EventSubscription,
}

impl Harness {
    pub fn start<P: PageProbe + 'static>(config: ObserverConfig, probe: P) -> Self {
        let (host, host_events) = mpsc::channel(64);
        let (observer, handle) = Observer::new(config, probe, host_events);
        let events = handle.subscribe();
        observer.spawn();
        Self { handle, host, events }
    }

    pub async fn send(&self, event: HostEvent) {
        self.host.send(event).await.unwrap();
        flush().await;
    }
}

/// Let the observer task drain everything already queued for it.
pub async fn flush() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    flush().await;
}
