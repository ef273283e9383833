//! Fetch server-rendered markup and decide readiness without a browser.
//!
//!     cargo run -p nextwatch_browser --example static_check -- https://nextjs.org/docs

use nextwatch_core::{ObserverConfig, ObserverEvent};
use nextwatch_observer::Observer;
use nextwatch_parser::{HtmlProbe, static_host_events};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nextwatch=info")))
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "https://nextjs.org".to_string());
    let probe = HtmlProbe::fetch(&url).await?;

    let config = ObserverConfig::fast();
    let (host, host_events) = tokio::sync::mpsc::channel(8);
    let (observer, handle) = Observer::new(config, probe, host_events);
    let mut events = handle.subscribe();
    let task = observer.spawn();

    for event in static_host_events() {
        host.send(event).await?;
    }
    drop(host);

    let outcome = tokio::select! {
        event = events.recv_named(ObserverEvent::READY) => event,
        _ = handle.wait_for(|s| s.phase == nextwatch_observer::ObservationPhase::Abandoned) => None,
    };

    match outcome {
        Some(ObserverEvent::Ready(ready)) => println!("{}", serde_json::to_string_pretty(&ready)?),
        _ => println!("{url} does not look like a Next.js page"),
    }

    drop(handle);
    task.await?;
    Ok(())
}
