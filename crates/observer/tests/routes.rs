mod common;

use common::{Harness, ScriptedProbe, advance, config, framework_shell, hydrated};
use nextwatch_core::{HostEvent, NavigationEvent, ObserverEvent, RouteLoadEvent};
use nextwatch_observer::RoutePhase;
use nextwatch_parser::HtmlProbe;
use std::sync::{Arc, Mutex};

fn push(route: &str) -> HostEvent {
    HostEvent::Navigation(NavigationEvent::HistoryPush { route: route.to_string() })
}

async fn ready_harness(probe: &ScriptedProbe) -> Harness {
    let mut h = Harness::start(config(15000, 100).with_route_load_timeout(1000), probe.clone());
    h.events.recv_named(ObserverEvent::READY).await.expect("ready");
    h
}

async fn next_after_load(h: &mut Harness) -> RouteLoadEvent {
    match h.events.recv_named(ObserverEvent::ROUTE_AFTER_LOAD).await {
        Some(ObserverEvent::RouteAfterLoad(event)) => event,
        other => panic!("expected after-load, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn same_route_is_ignored() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    h.send(push("/")).await;
    h.send(HostEvent::Navigation(NavigationEvent::PopState { route: "/".into() })).await;
    advance(2000).await;

    assert!(h.events.drain().is_empty());
    let state = h.handle.state();
    assert!(state.content_loaded);
    assert!(!state.route_change_in_progress);
    assert_eq!(state.previous_route, "");
}

#[tokio::test(start_paused = true)]
async fn route_cycle_resets_view_signals_and_completes_when_loaded() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    probe.set(framework_shell("/about"));
    h.send(push("/about")).await;

    match h.events.recv().await {
        Some(ObserverEvent::RouteBeforeChange(change)) => {
            assert_eq!(change.from, "/");
            assert_eq!(change.to, "/about");
        }
        other => panic!("expected before-change, got {other:?}"),
    }

    let status = h.handle.status();
    assert_eq!(status.route_phase, RoutePhase::Navigating);
    let state = status.state;
    assert!(state.framework_detected);
    assert!(state.first_paint);
    assert!(!state.content_loaded);
    assert!(!state.scripts_loaded);
    assert!(!state.images_loaded);
    assert!(!state.no_more_mutations);
    assert!(state.route_change_in_progress);
    assert_eq!(state.previous_route, "/");
    assert_eq!(state.current_route, "/about");

    advance(150).await;
    assert_eq!(h.handle.status().route_phase, RoutePhase::Stabilizing);

    probe.set(hydrated("/about"));
    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/about");
    assert!((loaded.timing_ms - 200.0).abs() < 1.0, "timing was {}", loaded.timing_ms);
    assert!(loaded.state.content_loaded);
    assert!(loaded.state.scripts_loaded);
    assert!(loaded.state.images_loaded);
    assert!(!loaded.state.route_change_in_progress);
    assert_eq!(h.handle.status().route_phase, RoutePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn route_load_times_out_into_forced_completion() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    probe.set(framework_shell("/slow"));
    h.send(push("/slow")).await;

    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/slow");
    assert!((loaded.timing_ms - 1100.0).abs() < 1.0, "timing was {}", loaded.timing_ms);
    assert!(!loaded.state.content_loaded);
    assert!(!loaded.state.scripts_loaded);

    advance(3000).await;
    assert!(h.events.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn router_completion_finishes_once_content_is_there() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeStart { url: "/docs".into() }))
        .await;
    probe.set(hydrated("/docs"));
    advance(50).await;
    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeComplete)).await;

    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/docs");
    assert!((loaded.timing_ms - 150.0).abs() < 1.0, "timing was {}", loaded.timing_ms);
}

#[tokio::test(start_paused = true)]
async fn router_error_abandons_without_after_load() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    probe.set(framework_shell("/broken"));
    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeStart { url: "/broken".into() }))
        .await;
    assert!(h.handle.state().route_change_in_progress);

    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeError)).await;
    assert!(!h.handle.state().route_change_in_progress);
    assert_eq!(h.handle.status().route_phase, RoutePhase::Idle);

    advance(5000).await;
    let names: Vec<_> = h.events.drain().iter().map(ObserverEvent::name).collect();
    assert_eq!(names, vec![ObserverEvent::ROUTE_BEFORE_CHANGE]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_producers_report_one_transition() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    probe.set(hydrated("/a"));
    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeStart { url: "/a".into() }))
        .await;
    h.send(push("/a")).await;
    h.send(HostEvent::Navigation(NavigationEvent::HistoryReplace { route: "/a".into() }))
        .await;
    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeComplete)).await;
    advance(3000).await;

    let names: Vec<_> = h.events.drain().iter().map(ObserverEvent::name).collect();
    assert_eq!(
        names,
        vec![ObserverEvent::ROUTE_BEFORE_CHANGE, ObserverEvent::ROUTE_AFTER_LOAD]
    );
}

#[tokio::test(start_paused = true)]
async fn newer_navigation_replaces_the_one_in_flight() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    probe.set(framework_shell("/first"));
    h.send(push("/first")).await;
    advance(300).await;
    probe.set(hydrated("/second"));
    h.send(push("/second")).await;

    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/second");
    assert_eq!(loaded.state.previous_route, "/first");

    advance(3000).await;
    let after_loads = h
        .events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ObserverEvent::RouteAfterLoad(_)))
        .count();
    assert_eq!(after_loads, 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_callback_is_isolated() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    h.handle.on_route_change(|_, _| panic!("callback bug")).unwrap();
    h.handle
        .on_route_change(move |from, to| record.lock().unwrap().push((from.to_string(), to.to_string())))
        .unwrap();

    probe.set(hydrated("/b"));
    h.send(push("/b")).await;

    assert_eq!(*seen.lock().unwrap(), vec![("/".to_string(), "/b".to_string())]);
    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/b");
}

#[tokio::test(start_paused = true)]
async fn detection_can_be_disabled() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = Harness::start(
        config(15000, 100).with_route_change_detection(false),
        probe.clone(),
    );
    h.events.recv_named(ObserverEvent::READY).await.expect("ready");

    probe.set(hydrated("/elsewhere"));
    h.send(push("/elsewhere")).await;
    advance(2000).await;

    assert!(h.events.drain().is_empty());
    assert_eq!(h.handle.current_route(), "/");
}

#[tokio::test(start_paused = true)]
async fn quiescence_is_re_earned_per_route() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let h = ready_harness(&probe).await;

    h.send(HostEvent::Mutations(4)).await;
    assert!(!h.handle.state().no_more_mutations);

    probe.set(hydrated("/next"));
    h.send(push("/next")).await;
    h.send(HostEvent::Mutations(2)).await;
    advance(400).await;
    assert!(!h.handle.state().no_more_mutations);

    advance(200).await;
    assert!(h.handle.state().no_more_mutations);
}

#[tokio::test(start_paused = true)]
async fn static_pages_drive_a_full_route_cycle() {
    let home = r#"<html><head><script src="/_next/static/chunks/main.js"></script></head>
<body><main><h1>Home</h1><p>Welcome to the product overview and changelog.</p><p>Latest release notes are below, with migration steps for every breaking change.</p></main>
<script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{}},"page":"/"}</script></body></html>"#;
    let blog = r#"<html><head><script src="/_next/static/chunks/main.js"></script></head>
<body><main><article><h1>Shipping notes</h1><p>We rewrote the renderer and cut startup time in half this month.</p></article></main>
<script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"slug":"notes"}},"page":"/blog/[slug]"}</script></body></html>"#;

    let probe = Arc::new(HtmlProbe::new(home, "/"));
    let mut h = Harness::start(config(15000, 100), Arc::clone(&probe));
    h.events.recv_named(ObserverEvent::READY).await.expect("ready");

    probe.navigate("/blog/notes?ref=home", blog);
    h.send(push("/blog/notes?ref=home")).await;

    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/blog/notes?ref=home");
    assert_eq!(loaded.state.previous_route, "/");
    assert!(loaded.state.content_loaded);
    assert!(loaded.state.scripts_loaded);
}

#[tokio::test(start_paused = true)]
async fn router_start_without_completion_is_forced_at_the_load_timeout() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    probe.set(framework_shell("/stuck"));
    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeStart { url: "/stuck".into() }))
        .await;

    advance(900).await;
    assert_eq!(h.handle.status().route_phase, RoutePhase::Navigating);

    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/stuck");
    assert!((loaded.timing_ms - 1000.0).abs() < 1.0, "timing was {}", loaded.timing_ms);
    assert!(!loaded.state.content_loaded);
    assert!(!loaded.state.route_change_in_progress);
}

#[tokio::test(start_paused = true)]
async fn router_completion_before_content_falls_through_to_stabilizing() {
    let probe = ScriptedProbe::new(hydrated("/"));
    let mut h = ready_harness(&probe).await;

    probe.set(framework_shell("/docs"));
    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeStart { url: "/docs".into() }))
        .await;
    advance(50).await;
    h.send(HostEvent::Navigation(NavigationEvent::RouterChangeComplete)).await;

    advance(110).await;
    assert_eq!(h.handle.status().route_phase, RoutePhase::Stabilizing);
    assert!(h.events.drain().iter().all(|e| e.name() != ObserverEvent::ROUTE_AFTER_LOAD));

    probe.set(hydrated("/docs"));
    let loaded = next_after_load(&mut h).await;
    assert_eq!(loaded.route, "/docs");
    assert!((loaded.timing_ms - 250.0).abs() < 1.0, "timing was {}", loaded.timing_ms);
    assert!(loaded.state.content_loaded);
}
