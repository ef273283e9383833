use chromiumoxide::page::Page;
use nextwatch_core::{ObserverConfig, ObserverError, ObserverEvent, ReadyEvent};
use nextwatch_observer::{EventSubscription, ObservationPhase, Observer, ObserverHandle};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::probe::ChromiumProbe;
use super::pump::{HOST_EVENT_BUFFER, spawn_pump};
use crate::shared::PumpConfig;

/// A running observer wired to a live page. Dropping it stops both tasks.
pub struct Attachment {
    pub handle: ObserverHandle,
    /// Subscribed before the observer started, so no event is missed.
    pub events: EventSubscription,
    observer: JoinHandle<()>,
    pump: JoinHandle<Result<(), ObserverError>>,
}

impl Attachment {
    /// Whether the pump stopped on its own, which means the page went away.
    pub fn pump_finished(&self) -> bool {
        self.pump.is_finished()
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.pump.abort();
        self.observer.abort();
    }
}

/// Start observing `page`. Events are delivered on [`Attachment::events`]
/// from the very first one; later subscriptions through the handle only see
/// what is published after they subscribe.
pub async fn attach(
    page: &Page,
    config: ObserverConfig,
    pump: PumpConfig,
) -> Result<Attachment, ObserverError> {
    let (host, host_events) = mpsc::channel(HOST_EVENT_BUFFER);
    let pump = spawn_pump(page.clone(), pump, host).await?;
    let (observer, handle) = Observer::new(config, ChromiumProbe::new(page.clone()), host_events);
    let (events, observer) = observer.spawn_subscribed();

    Ok(Attachment { handle, events, observer, pump })
}

/// Observe `page` until it is ready.
///
/// Fails with a timeout error when the observer gives up without a framework
/// or no ready event arrives within the observer timeout plus `pump.settle`.
pub async fn wait_until_ready(
    page: &Page,
    config: ObserverConfig,
    pump: PumpConfig,
) -> Result<ReadyEvent, ObserverError> {
    let deadline = config.timeout_duration() + pump.settle;
    let mut attachment = attach(page, config, pump).await?;
    let handle = &attachment.handle;
    let events = &mut attachment.events;

    let outcome = tokio::time::timeout(deadline, async {
        tokio::select! {
            event = events.recv_named(ObserverEvent::READY) => event,
            _ = handle.wait_for(|s| s.phase == ObservationPhase::Abandoned) => None,
        }
    })
    .await;

    match outcome {
        Ok(Some(ObserverEvent::Ready(ready))) => Ok(ready),
        Ok(_) => Err(ObserverError::timeout_error("Observer gave up without detecting the framework")
            .with_context(json!({ "route": attachment.handle.current_route() }))),
        Err(_) => Err(ObserverError::timeout_error(format!(
            "No ready event within {}ms",
            deadline.as_millis()
        ))
        .with_context(json!({
            "route": attachment.handle.current_route(),
            "state": attachment.handle.state(),
        }))),
    }
}
