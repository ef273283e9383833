//! Route transition tracking: `Idle → Navigating → Stabilizing → Idle`.
//!
//! Router events, back/forward and committed history changes all funnel into
//! [`Detector::on_route_change_start`], which ignores a target equal to the
//! current route. That check is what deduplicates overlapping producers.

use chrono::Utc;
use nextwatch_core::{
    NavigationEvent, ObserverEvent, PageProbe, QUIESCENCE_WINDOW, ROUTE_SETTLE_DELAY,
    RouteChangeEvent, RouteLoadEvent,
};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use tokio::time::Instant;

use crate::scheduler::Detector;
use crate::signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoutePhase {
    Idle,
    Navigating,
    Stabilizing,
}

/// What the route timer does when it fires while still navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    /// The router announced a start; wait for its completion, bounded by
    /// the route load timeout.
    AwaitRouter,
    /// The router reported completion; finish at once if content is there.
    RouterComplete,
    /// History or back/forward navigation already committed.
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Navigating(Settle),
    Stabilizing { since: Instant, checks: u64 },
}

/// One in-flight navigation, discarded on completion or abandonment.
#[derive(Debug, Clone)]
pub(crate) struct RouteCycle {
    from: String,
    to: String,
    started_at: Instant,
    stage: Stage,
}

impl RouteCycle {
    pub(crate) fn phase_of(cycle: Option<&RouteCycle>) -> RoutePhase {
        match cycle.map(|c| c.stage) {
            None => RoutePhase::Idle,
            Some(Stage::Navigating(_)) => RoutePhase::Navigating,
            Some(Stage::Stabilizing { .. }) => RoutePhase::Stabilizing,
        }
    }
}

impl<P: PageProbe> Detector<P> {
    pub(crate) async fn on_navigation(&mut self, event: NavigationEvent) {
        if !self.config.route_change_detection {
            return;
        }

        match event {
            NavigationEvent::RouterChangeStart { url } => {
                if self.on_route_change_start(url) {
                    self.settle_after(Settle::AwaitRouter, self.config.route_load_timeout_duration());
                }
            }
            NavigationEvent::RouterChangeComplete => {
                let awaiting = matches!(
                    self.route.as_ref().map(|c| c.stage),
                    Some(Stage::Navigating(Settle::AwaitRouter))
                );
                if awaiting {
                    self.settle_after(Settle::RouterComplete, ROUTE_SETTLE_DELAY);
                }
            }
            NavigationEvent::RouterChangeError => {
                if self.state.route_change_in_progress {
                    milestone!(self.config, route = %self.state.current_route, "❌ route change error");
                }
                self.state.route_change_in_progress = false;
                self.route = None;
                self.route_at = None;
                self.publish_status();
            }
            NavigationEvent::PopState { route }
            | NavigationEvent::HistoryPush { route }
            | NavigationEvent::HistoryReplace { route } => {
                if self.on_route_change_start(route) {
                    self.settle_after(Settle::Committed, ROUTE_SETTLE_DELAY);
                }
            }
        }
    }

    /// Enter `Navigating` for `to`. Returns `false` when `to` is already the
    /// current route.
    pub(crate) fn on_route_change_start(&mut self, to: String) -> bool {
        let from = self.state.current_route.clone();
        if from == to {
            return false;
        }
        milestone!(self.config, from = %from, to = %to, "🔄 route change starting");

        self.state.previous_route = from.clone();
        self.state.current_route = to.clone();
        self.state.route_change_in_progress = true;
        self.state.reset_view_signals();

        let now = Instant::now();
        self.route = Some(RouteCycle {
            from: from.clone(),
            to: to.clone(),
            started_at: now,
            stage: Stage::Navigating(Settle::AwaitRouter),
        });
        // The navigation itself is a change; quiescence is re-earned per route.
        self.quiescence_at = Some(now + QUIESCENCE_WINDOW);

        self.bus.publish(ObserverEvent::RouteBeforeChange(RouteChangeEvent {
            from: from.clone(),
            to: to.clone(),
            timestamp: Utc::now(),
        }));
        self.notify_callbacks(&from, &to);
        self.publish_status();
        true
    }

    fn notify_callbacks(&self, from: &str, to: &str) {
        for callback in &self.callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(from, to))) {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(target: "nextwatch", from, to, reason = %reason, "route change callback panicked");
            }
        }
    }

    fn settle_after(&mut self, settle: Settle, delay: std::time::Duration) {
        if let Some(cycle) = self.route.as_mut() {
            cycle.stage = Stage::Navigating(settle);
            self.route_at = Some(Instant::now() + delay);
        }
    }

    fn begin_stabilizing(&mut self) {
        let Some(cycle) = self.route.as_mut() else {
            return;
        };
        milestone!(self.config, route = %cycle.to, "👀 starting route load observation");
        cycle.stage = Stage::Stabilizing { since: Instant::now(), checks: 0 };
        self.route_at = Some(Instant::now() + self.config.check_interval_duration());
        self.publish_status();
    }

    pub(crate) async fn on_route_timer(&mut self) {
        let Some(stage) = self.route.as_ref().map(|c| c.stage) else {
            self.route_at = None;
            return;
        };

        match stage {
            Stage::Navigating(Settle::Committed) => self.begin_stabilizing(),
            Stage::Navigating(Settle::RouterComplete) => {
                let content = match self.snapshot().await {
                    Some(snapshot) => {
                        signals::check_content_loaded(&mut self.state, &snapshot, &self.config)
                    }
                    None => false,
                };
                if content {
                    self.complete_route();
                } else {
                    self.begin_stabilizing();
                }
            }
            Stage::Navigating(Settle::AwaitRouter) => {
                milestone!(self.config, "⚠️ router never completed, forcing route load");
                self.complete_route();
            }
            Stage::Stabilizing { since, checks } => {
                let checks = checks + 1;
                if let Some(cycle) = self.route.as_mut() {
                    cycle.stage = Stage::Stabilizing { since, checks };
                }

                let loaded = match self.snapshot().await {
                    Some(snapshot) => {
                        signals::evaluate_view(&mut self.state, &snapshot, &self.config)
                    }
                    None => false,
                };

                if loaded {
                    self.complete_route();
                } else if since.elapsed() >= self.config.route_load_timeout_duration() {
                    milestone!(self.config, checks, "⚠️ route load timeout reached");
                    self.complete_route();
                } else {
                    self.route_at = Some(Instant::now() + self.config.check_interval_duration());
                    self.publish_status();
                }
            }
        }
    }

    /// Publish after-load for the in-flight cycle and return to `Idle`.
    fn complete_route(&mut self) {
        self.route_at = None;
        let Some(cycle) = self.route.take() else {
            return;
        };
        if !self.state.route_change_in_progress {
            return;
        }
        self.state.route_change_in_progress = false;

        let timing_ms = cycle.started_at.elapsed().as_secs_f64() * 1000.0;
        milestone!(self.config, from = %cycle.from, route = %cycle.to, timing_ms, "✅ route load complete");

        self.bus.publish(ObserverEvent::RouteAfterLoad(RouteLoadEvent {
            route: self.state.current_route.clone(),
            timestamp: Utc::now(),
            timing_ms,
            state: self.state.clone(),
        }));
        self.publish_status();
    }
}
