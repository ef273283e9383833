//! Open a page in chromium, wait until it is ready, then report client-side
//! route changes until interrupted.
//!
//!     RUST_LOG=nextwatch=info cargo run -p nextwatch_browser --example watch -- https://nextjs.org

use nextwatch_browser::{LaunchOptions, PumpConfig, attach, launch, open_page};
use nextwatch_core::{ObserverConfig, ObserverEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nextwatch=info")))
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "https://nextjs.org".to_string());
    let pump = PumpConfig::default();
    let session = launch(LaunchOptions::default()).await?;
    let page = open_page(session.browser(), &url, &pump).await?;

    let mut attachment = attach(&page, ObserverConfig::default(), pump).await?;
    attachment.handle.on_route_change(|from, to| println!("→ {from} to {to}"))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = attachment.events.recv() => match event {
                Some(ObserverEvent::Ready(ready)) => {
                    println!("ready after {:.0}ms on {}", ready.timing_ms, ready.state.current_route);
                }
                Some(ObserverEvent::RouteAfterLoad(load)) => {
                    println!("{} loaded in {:.0}ms", load.route, load.timing_ms);
                }
                Some(ObserverEvent::RouteBeforeChange(_)) => {}
                None => break,
            },
        }
    }

    println!("{}", serde_json::to_string_pretty(&attachment.handle.state())?);
    drop(attachment);
    session.close().await?;
    Ok(())
}
