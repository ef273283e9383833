use chromiumoxide::cdp::browser_protocol::page::{
    EventDomContentEventFired, EventLoadEventFired, EventNavigatedWithinDocument,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use nextwatch_core::{HostEvent, NavigationEvent, ObserverError};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::shared::{PumpConfig, js, to_observer_error};

/// Capacity of the channel between the pump and the observer.
pub const HOST_EVENT_BUFFER: usize = 256;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Drained {
    mutations: u64,
    router: Vec<RouterSignal>,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum RouterSignal {
    RouteChangeStart { url: String },
    RouteChangeComplete,
    RouteChangeError,
}

impl From<RouterSignal> for NavigationEvent {
    fn from(signal: RouterSignal) -> Self {
        match signal {
            RouterSignal::RouteChangeStart { url } => NavigationEvent::RouterChangeStart { url },
            RouterSignal::RouteChangeComplete => NavigationEvent::RouterChangeComplete,
            RouterSignal::RouteChangeError => NavigationEvent::RouterChangeError,
        }
    }
}

impl Drained {
    fn into_events(self) -> Vec<HostEvent> {
        let mutations = (self.mutations > 0).then_some(HostEvent::Mutations(self.mutations));
        mutations
            .into_iter()
            .chain(self.router.into_iter().map(|s| HostEvent::Navigation(s.into())))
            .collect()
    }
}

/// `pathname + search` of a URL reported by the browser.
pub fn route_from_url(url: &str) -> String {
    let url = url.split('#').next().unwrap_or(url);
    let route = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find(['/', '?']) {
                Some(start) => &rest[start..],
                None => "",
            }
        }
        None => url,
    };

    if route.is_empty() {
        "/".to_string()
    } else if route.starts_with('?') {
        format!("/{}", route)
    } else {
        route.to_string()
    }
}

async fn drain(page: &Page) -> Result<Drained, ObserverError> {
    let result = page
        .evaluate(js::drain_call())
        .await
        .map_err(|e| to_observer_error(e, "Drain"))?;
    match result.value() {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ObserverError::parsing_error(format!("Malformed activity: {}", e))),
        None => Ok(Drained::default()),
    }
}

/// Turn page activity into host events until the observer side hangs up.
///
/// Lost execution contexts (a full navigation in progress) are skipped; any
/// other browser failure ends the pump with that error.
pub async fn spawn_pump(
    page: Page,
    config: PumpConfig,
    host: mpsc::Sender<HostEvent>,
) -> Result<JoinHandle<Result<(), ObserverError>>, ObserverError> {
    let mut loads = page
        .event_listener::<EventLoadEventFired>()
        .await
        .map_err(|e| to_observer_error(e, "Listen for load"))?;
    let mut dom_ready = page
        .event_listener::<EventDomContentEventFired>()
        .await
        .map_err(|e| to_observer_error(e, "Listen for DOMContentLoaded"))?;
    let mut in_document = page
        .event_listener::<EventNavigatedWithinDocument>()
        .await
        .map_err(|e| to_observer_error(e, "Listen for history changes"))?;

    Ok(tokio::spawn(async move {
        let mut ticker = interval(config.pump_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let events = tokio::select! {
                Some(_) = loads.next() => vec![HostEvent::Load],
                Some(_) = dom_ready.next() => vec![HostEvent::DomContentLoaded],
                Some(nav) = in_document.next() => vec![HostEvent::Navigation(
                    NavigationEvent::HistoryPush { route: route_from_url(&nav.url) },
                )],
                _ = ticker.tick() => match drain(&page).await {
                    Ok(drained) => drained.into_events(),
                    Err(e) if e.recoverable => {
                        tracing::debug!(target: "nextwatch", error = %e, "drain skipped");
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            for event in events {
                if host.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
    }))
}
