use nextwatch_core::{ObservationState, ObserverConfig, ObserverError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::bus::{EventBus, EventSubscription};
use crate::route::RoutePhase;
use crate::scheduler::ObservationPhase;

/// Callback invoked synchronously with `(from, to)` on every route change.
pub type RouteCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

pub(crate) enum ControlRequest {
    ForceCheck(oneshot::Sender<bool>),
    ForceReady(oneshot::Sender<()>),
    DetectFramework(oneshot::Sender<bool>),
    OnRouteChange(RouteCallback),
}

/// Everything the observer currently knows, republished after each change.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverStatus {
    pub phase: ObservationPhase,
    pub route_phase: RoutePhase,
    pub state: ObservationState,
    pub mutation_count: u64,
}

impl ObserverStatus {
    pub(crate) fn initial() -> Self {
        Self {
            phase: ObservationPhase::Idle,
            route_phase: RoutePhase::Idle,
            state: ObservationState::default(),
            mutation_count: 0,
        }
    }
}

/// Read-only debug and control surface of one running observer.
#[derive(Clone)]
pub struct ObserverHandle {
    config: Arc<ObserverConfig>,
    status: watch::Receiver<ObserverStatus>,
    control: mpsc::UnboundedSender<ControlRequest>,
    bus: EventBus,
}

impl ObserverHandle {
    pub(crate) fn new(
        config: Arc<ObserverConfig>,
        status: watch::Receiver<ObserverStatus>,
        control: mpsc::UnboundedSender<ControlRequest>,
        bus: EventBus,
    ) -> Self {
        Self { config, status, control, bus }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn status(&self) -> ObserverStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ObservationState {
        self.status.borrow().state.clone()
    }

    pub fn phase(&self) -> ObservationPhase {
        self.status.borrow().phase
    }

    pub fn current_route(&self) -> String {
        self.status.borrow().state.current_route.clone()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.bus.subscribe()
    }

    /// Run the aggregate check now and report the decision.
    pub async fn force_check(&self) -> Result<bool, ObserverError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlRequest::ForceCheck(tx))?;
        rx.await.map_err(|_| ObserverError::closed())
    }

    /// Publish the ready event now unless it was already published.
    pub async fn force_ready(&self) -> Result<(), ObserverError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlRequest::ForceReady(tx))?;
        rx.await.map_err(|_| ObserverError::closed())
    }

    pub async fn detect_framework(&self) -> Result<bool, ObserverError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlRequest::DetectFramework(tx))?;
        rx.await.map_err(|_| ObserverError::closed())
    }

    /// Register a route-change callback. A panicking callback is logged and
    /// never affects the observer or other callbacks.
    pub fn on_route_change<F>(&self, callback: F) -> Result<(), ObserverError>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.send(ControlRequest::OnRouteChange(Box::new(callback)))
    }

    /// Wait until the published status satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ObserverStatus, ObserverError>
    where
        F: FnMut(&ObserverStatus) -> bool,
    {
        let mut status = self.status.clone();
        let current = status
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| ObserverError::closed())?;
        Ok(current.clone())
    }

    fn send(&self, request: ControlRequest) -> Result<(), ObserverError> {
        self.control.send(request).map_err(|_| ObserverError::closed())
    }
}
