//! Signal evaluators and the readiness aggregate.
//!
//! Every evaluator reads a [`DocumentSnapshot`], sets only its own field of
//! [`ObservationState`] and never moves a field back to `false`. Once a field
//! is true the evaluator returns immediately without looking at the snapshot.

use nextwatch_core::{DocumentSnapshot, ObservationState, ObserverConfig, PaintTiming};
use regex::Regex;
use std::sync::LazyLock;

/// Path segment every framework-served asset lives under.
pub const FRAMEWORK_ASSET_PATH: &str = "/_next/";

/// Generator name the framework writes into `<meta name="generator">`.
pub const FRAMEWORK_GENERATOR: &str = "Next.js";

/// A container counts as populated above this many trimmed characters.
pub const CONTENT_BLOCK_MIN_CHARS: usize = 10;

/// Aggregate container text above which content counts as loaded.
pub const CONTENT_TOTAL_MIN_CHARS: usize = 100;

/// Body child count above which content counts as loaded regardless of text.
pub const BODY_CHILDREN_FALLBACK: usize = 5;

static BUILD_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/_next/static/[a-zA-Z0-9_-]+/").expect("build id pattern is valid")
});

fn framework_scripts(snapshot: &DocumentSnapshot) -> usize {
    snapshot
        .script_sources
        .iter()
        .filter(|src| src.contains(FRAMEWORK_ASSET_PATH))
        .count()
}

pub fn detect_framework(
    state: &mut ObservationState,
    snapshot: &DocumentSnapshot,
    config: &ObserverConfig,
) -> bool {
    if state.framework_detected {
        return true;
    }

    let scripts = framework_scripts(snapshot);
    let via = if snapshot.has_next_data {
        "__NEXT_DATA__"
    } else if scripts > 0 {
        "_next scripts"
    } else if snapshot
        .meta_generator
        .as_deref()
        .is_some_and(|generator| generator.contains(FRAMEWORK_GENERATOR))
    {
        "meta generator"
    } else if snapshot.has_route_announcer {
        "route announcer"
    } else if snapshot.script_sources.iter().any(|src| BUILD_ID_PATTERN.is_match(src)) {
        "buildId pattern"
    } else {
        return false;
    };

    milestone!(config, via, scripts, "✓ framework detected");
    state.framework_detected = true;
    true
}

pub fn check_content_loaded(
    state: &mut ObservationState,
    snapshot: &DocumentSnapshot,
    config: &ObserverConfig,
) -> bool {
    if state.content_loaded {
        return true;
    }
    if !snapshot.has_body {
        return false;
    }

    if !snapshot.content_text_lengths.is_empty() {
        let total_chars: usize = snapshot.content_text_lengths.iter().sum();
        let elements = snapshot
            .content_text_lengths
            .iter()
            .filter(|&&len| len > CONTENT_BLOCK_MIN_CHARS)
            .count();

        if elements >= config.min_content_check || total_chars > CONTENT_TOTAL_MIN_CHARS {
            milestone!(config, elements, total_chars, "✓ content loaded");
            state.content_loaded = true;
            return true;
        }
    }

    // A spinner-only shell rarely has this many top-level children.
    if snapshot.body_children > BODY_CHILDREN_FALLBACK {
        milestone!(config, children = snapshot.body_children, "✓ content loaded via body children");
        state.content_loaded = true;
        return true;
    }

    false
}

pub fn check_scripts_loaded(
    state: &mut ObservationState,
    snapshot: &DocumentSnapshot,
    config: &ObserverConfig,
) -> bool {
    if state.scripts_loaded {
        return true;
    }
    if framework_scripts(snapshot) == 0 {
        return false;
    }

    if snapshot.next_data_has_props || snapshot.has_next_runtime {
        milestone!(config, "✓ scripts loaded (framework runtime available)");
        state.scripts_loaded = true;
        return true;
    }

    if snapshot.has_hydration_markers || snapshot.has_obfuscated_classes {
        milestone!(config, "✓ scripts loaded (hydration detected)");
        state.scripts_loaded = true;
        return true;
    }

    false
}

pub fn check_images_loaded(
    state: &mut ObservationState,
    snapshot: &DocumentSnapshot,
    config: &ObserverConfig,
) -> bool {
    if state.images_loaded {
        return true;
    }

    let total = snapshot.images.len();
    if total == 0 {
        state.images_loaded = true;
        return true;
    }

    let loaded = snapshot.images.iter().filter(|img| img.is_loaded()).count();
    if loaded as f64 / total as f64 >= config.image_load_tolerance {
        milestone!(config, loaded, total, "✓ images loaded");
        state.images_loaded = true;
        return true;
    }

    false
}

pub fn check_first_paint(
    state: &mut ObservationState,
    snapshot: &DocumentSnapshot,
    config: &ObserverConfig,
) -> bool {
    if state.first_paint {
        return true;
    }

    match snapshot.paint {
        PaintTiming::Observed { first_contentful_paint: Some(fcp) } => {
            milestone!(config, fcp_ms = fcp, "✓ first contentful paint");
            state.first_paint = true;
            true
        }
        PaintTiming::Observed { first_contentful_paint: None } => false,
        PaintTiming::Unavailable => {
            // Degraded: any rendered child in the body stands in for a paint entry.
            if snapshot.has_body && snapshot.body_children > 0 {
                state.first_paint = true;
                return true;
            }
            false
        }
    }
}

/// Outcome of one aggregate check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalReport {
    pub framework_detected: bool,
    pub content_loaded: bool,
    pub scripts_loaded: bool,
    pub images_loaded: bool,
    pub first_paint: bool,
}

impl SignalReport {
    pub fn is_ready(&self) -> bool {
        self.framework_detected
            && self.content_loaded
            && self.scripts_loaded
            && self.first_paint
            && self.images_loaded
    }
}

/// Run all five evaluators.
///
/// None of them is skipped when an earlier one fails, so partial progress is
/// cached in `state` across checks.
pub fn evaluate_all(
    state: &mut ObservationState,
    snapshot: &DocumentSnapshot,
    config: &ObserverConfig,
) -> SignalReport {
    SignalReport {
        framework_detected: detect_framework(state, snapshot, config),
        content_loaded: check_content_loaded(state, snapshot, config),
        scripts_loaded: check_scripts_loaded(state, snapshot, config),
        images_loaded: check_images_loaded(state, snapshot, config),
        first_paint: check_first_paint(state, snapshot, config),
    }
}

/// Re-check the signals that describe the current view after a navigation.
pub fn evaluate_view(
    state: &mut ObservationState,
    snapshot: &DocumentSnapshot,
    config: &ObserverConfig,
) -> bool {
    let content = check_content_loaded(state, snapshot, config);
    let scripts = check_scripts_loaded(state, snapshot, config);
    let images = check_images_loaded(state, snapshot, config);
    content && scripts && images
}
