//! Observation scheduler: the `Idle → Observing → Ready` state machine.
//!
//! Three triggers feed one decision function. Mutation batches re-arm a
//! quiescence deadline, the poll deadline is re-armed `check_interval` after
//! each check returns, and the terminal load event marks images as loaded.
//! Whichever sees a true aggregate first disarms the others and enters
//! `Ready`. The detection timeout is measured in elapsed time since
//! observation began, so a slow probe cannot stretch it.

use chrono::Utc;
use nextwatch_core::{
    DocumentSnapshot, HostEvent, ObservationState, ObserverConfig, ObserverEvent, PageProbe,
    QUIESCENCE_WINDOW, ReadyEvent, ReadyState,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::bus::EventBus;
use crate::handle::{ControlRequest, ObserverStatus, RouteCallback};
use crate::route::RouteCycle;
use crate::signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObservationPhase {
    /// Waiting for the document to finish parsing.
    Idle,
    Observing,
    /// Terminal: the ready event has been published.
    Ready,
    /// Terminal: timed out without ever detecting the framework.
    Abandoned,
}

pub(crate) struct Detector<P> {
    pub(crate) config: Arc<ObserverConfig>,
    probe: P,
    pub(crate) state: ObservationState,
    pub(crate) phase: ObservationPhase,
    ready_published: bool,
    started_at: Instant,
    observing_since: Instant,
    mutation_count: u64,
    poll_checks: u64,
    pub(crate) quiescence_at: Option<Instant>,
    pub(crate) poll_at: Option<Instant>,
    pub(crate) route_at: Option<Instant>,
    pub(crate) route: Option<RouteCycle>,
    pub(crate) callbacks: Vec<RouteCallback>,
    pub(crate) bus: EventBus,
    status: watch::Sender<ObserverStatus>,
}

impl<P: PageProbe> Detector<P> {
    pub(crate) fn new(
        config: Arc<ObserverConfig>,
        probe: P,
        bus: EventBus,
        status: watch::Sender<ObserverStatus>,
    ) -> Self {
        Self {
            config,
            probe,
            state: ObservationState::default(),
            phase: ObservationPhase::Idle,
            ready_published: false,
            started_at: Instant::now(),
            observing_since: Instant::now(),
            mutation_count: 0,
            poll_checks: 0,
            quiescence_at: None,
            poll_at: None,
            route_at: None,
            route: None,
            callbacks: Vec::new(),
            bus,
            status,
        }
    }

    /// Nothing is armed and nothing can arm itself without outside input.
    pub(crate) fn is_settled(&self) -> bool {
        self.quiescence_at.is_none() && self.poll_at.is_none() && self.route_at.is_none()
    }

    pub(crate) fn publish_status(&self) {
        self.status.send_replace(ObserverStatus {
            phase: self.phase,
            route_phase: RouteCycle::phase_of(self.route.as_ref()),
            state: self.state.clone(),
            mutation_count: self.mutation_count,
        });
    }

    pub(crate) async fn snapshot(&self) -> Option<DocumentSnapshot> {
        match self.probe.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(target: "nextwatch", error = %e, "snapshot failed, treating as not ready");
                None
            }
        }
    }

    async fn check_if_ready(&mut self) -> bool {
        let Some(snapshot) = self.snapshot().await else {
            return false;
        };
        let ready = signals::evaluate_all(&mut self.state, &snapshot, &self.config).is_ready();
        self.publish_status();
        ready
    }

    /// Seed the current route and enter `Observing` unless the document is
    /// still loading.
    pub(crate) async fn start(&mut self) {
        milestone!(self.config, "observer initialized");

        let snapshot = self.snapshot().await;
        if let Some(snapshot) = &snapshot {
            self.state.current_route = snapshot.location.clone();
            if snapshot.ready_state == ReadyState::Loading {
                milestone!(self.config, "document loading, waiting for DOMContentLoaded");
                self.publish_status();
                return;
            }
        }

        self.start_observing().await;
    }

    async fn start_observing(&mut self) {
        if self.phase != ObservationPhase::Idle {
            return;
        }
        milestone!(self.config, "🔍 starting observation");
        self.phase = ObservationPhase::Observing;
        self.observing_since = Instant::now();

        if self.check_if_ready().await {
            self.enter_ready();
            return;
        }

        self.poll_at = Some(Instant::now() + self.config.check_interval_duration());
        self.publish_status();
    }

    pub(crate) async fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::DomContentLoaded => {
                if self.phase == ObservationPhase::Idle {
                    milestone!(self.config, "✓ DOMContentLoaded");
                    self.start_observing().await;
                }
            }
            HostEvent::Load => self.on_load().await,
            HostEvent::Mutations(count) => self.on_mutations(count),
            HostEvent::Navigation(navigation) => self.on_navigation(navigation).await,
        }
    }

    fn on_mutations(&mut self, count: u64) {
        if self.phase != ObservationPhase::Observing && self.route.is_none() {
            return;
        }
        self.mutation_count += count;
        self.quiescence_at = Some(Instant::now() + QUIESCENCE_WINDOW);
    }

    pub(crate) async fn on_quiescence(&mut self) {
        self.quiescence_at = None;
        milestone!(self.config, mutations = self.mutation_count, "✓ DOM mutations stable");
        self.state.no_more_mutations = true;
        self.publish_status();

        if self.phase == ObservationPhase::Observing && self.check_if_ready().await {
            self.enter_ready();
        }
    }

    async fn on_load(&mut self) {
        if matches!(self.phase, ObservationPhase::Ready | ObservationPhase::Abandoned) {
            return;
        }
        milestone!(self.config, "✓ window load event");
        self.state.images_loaded = true;

        // A finished load implies a parsed document.
        if self.phase == ObservationPhase::Idle {
            self.start_observing().await;
            return;
        }
        self.publish_status();

        if self.check_if_ready().await {
            self.enter_ready();
        }
    }

    pub(crate) async fn on_poll(&mut self) {
        if self.phase != ObservationPhase::Observing {
            self.poll_at = None;
            return;
        }
        self.poll_checks += 1;

        if self.check_if_ready().await {
            self.enter_ready();
            return;
        }

        if self.observing_since.elapsed() < self.config.timeout_duration() {
            self.poll_at = Some(Instant::now() + self.config.check_interval_duration());
        } else {
            self.stop_observing();
            milestone!(self.config, checks = self.poll_checks, "⚠️ timeout reached");

            if self.state.framework_detected {
                milestone!(self.config, "forcing ready (framework detected)");
                self.enter_ready();
            } else {
                self.phase = ObservationPhase::Abandoned;
                self.publish_status();
            }
        }
    }

    fn stop_observing(&mut self) {
        self.poll_at = None;
        if self.route.is_none() {
            self.quiescence_at = None;
        }
    }

    fn enter_ready(&mut self) {
        self.stop_observing();
        self.phase = ObservationPhase::Ready;
        self.publish_ready();
        self.publish_status();
    }

    /// Publish the ready event; every later call is a no-op.
    fn publish_ready(&mut self) {
        if self.ready_published {
            return;
        }
        self.ready_published = true;

        let timing_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        milestone!(self.config, timing_ms, state = ?self.state, "✅ application is READY");

        self.bus.publish(ObserverEvent::Ready(ReadyEvent {
            state: self.state.clone(),
            timestamp: Utc::now(),
            timing_ms,
        }));
    }

    pub(crate) async fn handle_request(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::ForceCheck(reply) => {
                let ready = self.check_if_ready().await;
                let _ = reply.send(ready);
            }
            ControlRequest::ForceReady(reply) => {
                self.enter_ready();
                let _ = reply.send(());
            }
            ControlRequest::DetectFramework(reply) => {
                let detected = match self.snapshot().await {
                    Some(snapshot) => {
                        signals::detect_framework(&mut self.state, &snapshot, &self.config)
                    }
                    None => self.state.framework_detected,
                };
                self.publish_status();
                let _ = reply.send(detected);
            }
            ControlRequest::OnRouteChange(callback) => self.callbacks.push(callback),
        }
    }
}
