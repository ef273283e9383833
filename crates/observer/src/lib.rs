//! Readiness detection for client-rendered applications observed from outside.
//!
//! An [`Observer`] owns one page's [`ObservationState`] and runs as a single
//! task: host notifications, control requests and its own timers are all
//! handled in turn by one `select!` loop, so no state is ever shared.
//!
//! ```no_run
//! # async fn demo(probe: impl nextwatch_core::PageProbe + 'static) {
//! use nextwatch_core::{ObserverConfig, ObserverEvent};
//! use nextwatch_observer::Observer;
//!
//! let (host_tx, host_rx) = tokio::sync::mpsc::channel(64);
//! let (observer, handle) = Observer::new(ObserverConfig::default(), probe, host_rx);
//! let mut events = handle.subscribe();
//! observer.spawn();
//!
//! if let Some(ObserverEvent::Ready(ready)) = events.recv_named(ObserverEvent::READY).await {
//!     println!("ready after {:.0}ms", ready.timing_ms);
//! }
//! # drop(host_tx);
//! # }
//! ```

/// Milestone log line, emitted only when the observer runs in debug mode.
macro_rules! milestone {
    ($config:expr, $($arg:tt)+) => {
        if $config.debug {
            tracing::info!(target: "nextwatch", $($arg)+);
        }
    };
}

mod bus;
mod handle;
mod route;
mod scheduler;
pub mod signals;

pub use bus::{EVENT_BUFFER, EventBus, EventSubscription};
pub use handle::{ObserverHandle, ObserverStatus, RouteCallback};
pub use route::RoutePhase;
pub use scheduler::ObservationPhase;

use nextwatch_core::{HostEvent, ObservationState, ObserverConfig, PageProbe};
use std::future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use handle::ControlRequest;
use scheduler::Detector;

/// Owns one observation; consume it with [`Observer::run`] or
/// [`Observer::spawn`].
pub struct Observer<P> {
    detector: Detector<P>,
    host_events: mpsc::Receiver<HostEvent>,
    control: mpsc::UnboundedReceiver<ControlRequest>,
}

impl<P: PageProbe> Observer<P> {
    pub fn new(
        config: ObserverConfig,
        probe: P,
        host_events: mpsc::Receiver<HostEvent>,
    ) -> (Self, ObserverHandle) {
        let config = Arc::new(config);
        let bus = EventBus::default();
        let (status_tx, status_rx) = watch::channel(ObserverStatus::initial());
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let handle = ObserverHandle::new(Arc::clone(&config), status_rx, control_tx, bus.clone());
        let observer = Self {
            detector: Detector::new(config, probe, bus, status_tx),
            host_events,
            control: control_rx,
        };
        (observer, handle)
    }

    pub fn state(&self) -> &ObservationState {
        &self.detector.state
    }

    /// Drive the observation until the host has gone away, every handle has
    /// been dropped and no timer is armed.
    pub async fn run(self) {
        let Observer { mut detector, mut host_events, mut control } = self;
        let mut host_open = true;
        let mut control_open = true;

        detector.start().await;

        loop {
            if !host_open && !control_open && detector.is_settled() {
                break;
            }

            tokio::select! {
                biased;

                request = control.recv(), if control_open => match request {
                    Some(request) => detector.handle_request(request).await,
                    None => control_open = false,
                },
                event = host_events.recv(), if host_open => match event {
                    Some(event) => detector.handle_host_event(event).await,
                    None => {
                        milestone!(detector.config, "host event stream closed");
                        host_open = false;
                    }
                },
                () = wait_until(detector.quiescence_at) => detector.on_quiescence().await,
                () = wait_until(detector.route_at) => detector.on_route_timer().await,
                () = wait_until(detector.poll_at) => detector.on_poll().await,
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()>
    where
        P: 'static,
    {
        tokio::spawn(self.run())
    }

    /// Subscribe first, then spawn: the subscription sees every event,
    /// including a ready event published by the very first check.
    pub fn spawn_subscribed(self) -> (EventSubscription, JoinHandle<()>)
    where
        P: 'static,
    {
        let events = self.detector.bus.subscribe();
        (events, self.spawn())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
