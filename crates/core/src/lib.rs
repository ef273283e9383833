use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Window without DOM mutations after which the document counts as quiescent.
pub const QUIESCENCE_WINDOW: Duration = Duration::from_millis(500);

/// Delay between a committed navigation and the start of route stabilization.
pub const ROUTE_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Semantic containers whose text decides whether real content rendered.
pub const CONTENT_CONTAINERS: &str = r#"main, article, section, [role="main"], .container, #root, [id*="app"], [id*="root"]"#;

/// Observer options, resolved once at construction and never mutated after.
///
/// Deserializes from the camelCase keys external callers already use
/// (`timeout`, `checkInterval`, `debug`, `minContentCheck`,
/// `routeChangeDetection`, `routeLoadTimeout`). Unknown keys are ignored and
/// missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserverConfig {
    /// Overall detection ceiling in milliseconds.
    pub timeout: u64,
    /// Poll cadence in milliseconds.
    pub check_interval: u64,
    /// Emit milestone log lines.
    pub debug: bool,
    /// Minimum number of content containers with non-trivial text.
    pub min_content_check: usize,
    /// Track client-side navigation after the initial load.
    pub route_change_detection: bool,
    /// Ceiling for a single route stabilization, in milliseconds.
    pub route_load_timeout: u64,
    /// Share of images that must be decoded before images count as loaded.
    pub image_load_tolerance: f64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            timeout: 15000,
            check_interval: 100,
            debug: true,
            min_content_check: 3,
            route_change_detection: true,
            route_load_timeout: 5000,
            image_load_tolerance: 0.8,
        }
    }
}

impl ObserverConfig {
    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = ms;
        self
    }

    pub fn with_check_interval(mut self, ms: u64) -> Self {
        self.check_interval = ms;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_min_content_check(mut self, count: usize) -> Self {
        self.min_content_check = count;
        self
    }

    pub fn with_route_change_detection(mut self, enabled: bool) -> Self {
        self.route_change_detection = enabled;
        self
    }

    pub fn with_route_load_timeout(mut self, ms: u64) -> Self {
        self.route_load_timeout = ms;
        self
    }

    pub fn with_image_load_tolerance(mut self, ratio: f64) -> Self {
        self.image_load_tolerance = ratio;
        self
    }

    pub fn fast() -> Self {
        Self {
            timeout: 8000,
            check_interval: 50,
            route_load_timeout: 3000,
            ..Self::default()
        }
    }

    pub fn patient() -> Self {
        Self {
            timeout: 30000,
            check_interval: 250,
            route_load_timeout: 10000,
            ..Self::default()
        }
    }

    /// Parse a JSON options object, falling back to defaults for absent keys.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ObserverError> {
        serde_json::from_value(value)
            .map_err(|e| ObserverError::parsing_error(format!("Invalid observer config: {}", e)))
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Poll cadence, never zero so it can drive a timer.
    pub fn check_interval_duration(&self) -> Duration {
        Duration::from_millis(self.check_interval.max(1))
    }

    pub fn route_load_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.route_load_timeout)
    }
}

/// The six load signals plus navigation bookkeeping.
///
/// Signals only ever move from `false` to `true` within one observation
/// cycle. A navigation resets the four view signals; `framework_detected`
/// and `first_paint` describe the hosting application and are never reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationState {
    pub framework_detected: bool,
    pub content_loaded: bool,
    pub scripts_loaded: bool,
    pub images_loaded: bool,
    pub no_more_mutations: bool,
    pub first_paint: bool,
    pub route_change_in_progress: bool,
    pub current_route: String,
    pub previous_route: String,
}

impl ObservationState {
    pub fn new(current_route: impl Into<String>) -> Self {
        Self {
            current_route: current_route.into(),
            ..Self::default()
        }
    }

    /// Clear the signals that describe the current view.
    pub fn reset_view_signals(&mut self) {
        self.content_loaded = false;
        self.scripts_loaded = false;
        self.images_loaded = false;
        self.no_more_mutations = false;
    }
}

/// `document.readyState` as seen by a probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Loading,
    Interactive,
    #[default]
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageState {
    pub complete: bool,
    pub natural_height: u32,
}

impl ImageState {
    pub fn loaded(height: u32) -> Self {
        Self { complete: true, natural_height: height }
    }

    pub fn pending() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.complete && self.natural_height > 0
    }
}

/// Paint-timing availability in the observed page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PaintTiming {
    /// Paint timing is observable; `first_contentful_paint` is set once reported.
    Observed {
        #[serde(rename = "firstContentfulPaint")]
        first_contentful_paint: Option<f64>,
    },
    /// The page has no paint-timing support, or observing it failed.
    #[default]
    Unavailable,
}

/// Read-only view of the observed document at one instant.
///
/// Probes fill this in; signal evaluators only ever read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub ready_state: ReadyState,
    /// `pathname + search` of the current location.
    pub location: String,
    /// The framework's injected page-data global exists.
    pub has_next_data: bool,
    /// The page-data global carries hydrated props.
    pub next_data_has_props: bool,
    /// The framework runtime global is reachable.
    pub has_next_runtime: bool,
    pub script_sources: Vec<String>,
    pub meta_generator: Option<String>,
    pub has_route_announcer: bool,
    /// `[data-reactroot]` or `[data-reactid]` present.
    pub has_hydration_markers: bool,
    /// Some element in the body has a class containing `__`.
    pub has_obfuscated_classes: bool,
    pub has_body: bool,
    pub body_children: usize,
    /// Trimmed text length of each semantic content container.
    pub content_text_lengths: Vec<usize>,
    pub images: Vec<ImageState>,
    pub paint: PaintTiming,
}

/// Navigation notifications from the three independent producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NavigationEvent {
    RouterChangeStart { url: String },
    RouterChangeComplete,
    RouterChangeError,
    PopState { route: String },
    /// Reported after the history entry was committed.
    HistoryPush { route: String },
    /// Reported after the history entry was committed.
    HistoryReplace { route: String },
}

/// Asynchronous notifications a host delivers to an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum HostEvent {
    DomContentLoaded,
    /// Terminal "all resources fetched" event.
    Load,
    /// A batch of subtree mutations under the document root.
    Mutations(u64),
    Navigation(NavigationEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyEvent {
    pub state: ObservationState,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds since the observer started.
    pub timing_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteChangeEvent {
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLoadEvent {
    pub route: String,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds since the navigation was first observed.
    pub timing_ms: f64,
    pub state: ObservationState,
}

/// Everything an observer publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail")]
pub enum ObserverEvent {
    #[serde(rename = "ready")]
    Ready(ReadyEvent),
    #[serde(rename = "route:before-change")]
    RouteBeforeChange(RouteChangeEvent),
    #[serde(rename = "route:after-load")]
    RouteAfterLoad(RouteLoadEvent),
}

impl ObserverEvent {
    pub const READY: &'static str = "ready";
    pub const ROUTE_BEFORE_CHANGE: &'static str = "route:before-change";
    pub const ROUTE_AFTER_LOAD: &'static str = "route:after-load";

    pub fn name(&self) -> &'static str {
        match self {
            ObserverEvent::Ready(_) => Self::READY,
            ObserverEvent::RouteBeforeChange(_) => Self::ROUTE_BEFORE_CHANGE,
            ObserverEvent::RouteAfterLoad(_) => Self::ROUTE_AFTER_LOAD,
        }
    }
}

/// Error categories for host-level failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// An optional page capability is missing or the execution context is gone
    EnvironmentUnavailable,
    /// Probe or hook script failed to evaluate
    Script,
    /// Page navigation failed
    Navigation,
    /// Browser/driver errors
    Browser,
    /// Snapshot, markup or config could not be parsed
    Parsing,
    /// Fetching a document failed
    Network,
    /// No decision within the caller's deadline
    Timeout,
    /// The observer task has stopped
    Closed,
}

/// Structured error with context.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{category:?}] {message}")]
pub struct ObserverError {
    pub category: ErrorCategory,
    pub message: String,
    /// Optional context (URL, script name, route, ...)
    pub context: serde_json::Value,
    /// Whether retrying the same operation can succeed
    pub recoverable: bool,
}

impl ObserverError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: serde_json::json!({}),
            recoverable: false,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    pub fn environment_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::EnvironmentUnavailable, message).recoverable()
    }

    pub fn script_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Script, message)
    }

    pub fn navigation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Navigation, message).recoverable()
    }

    pub fn browser_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Browser, message)
    }

    pub fn parsing_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Parsing, message)
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message).recoverable()
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message).recoverable()
    }

    pub fn closed() -> Self {
        Self::new(ErrorCategory::Closed, "Observer is no longer running")
    }
}

/// Source of document snapshots for one observed page.
#[async_trait]
pub trait PageProbe: Send + Sync {
    async fn snapshot(&self) -> Result<DocumentSnapshot, ObserverError>;
}

#[async_trait]
impl<P: PageProbe + ?Sized> PageProbe for std::sync::Arc<P> {
    async fn snapshot(&self) -> Result<DocumentSnapshot, ObserverError> {
        (**self).snapshot().await
    }
}
