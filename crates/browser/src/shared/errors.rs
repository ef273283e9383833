use nextwatch_core::ObserverError;
use serde_json::json;

/// Markers chromium reports when the page's JS context went away mid-call.
const LOST_CONTEXT: [&str; 2] = ["Cannot find context", "Execution context was destroyed"];

pub fn is_lost_context(message: &str) -> bool {
    LOST_CONTEXT.iter().any(|marker| message.contains(marker))
}

pub fn to_observer_error(e: impl std::fmt::Display, action: &str) -> ObserverError {
    let s = e.to_string();
    let error = if is_lost_context(&s) {
        ObserverError::environment_unavailable(format!("{} lost its page context: {}", action, s))
    } else if s.contains("timeout") || s.contains("Timeout") {
        ObserverError::timeout_error(format!("{} timed out: {}", action, s))
    } else if s.contains("navigation") || s.contains("Navigation") {
        ObserverError::navigation_error(format!("{} navigation failed: {}", action, s))
    } else if s.contains("Uncaught") || s.contains("ReferenceError") || s.contains("TypeError") {
        ObserverError::script_error(format!("{} script failed: {}", action, s))
    } else {
        ObserverError::browser_error(format!("{} failed: {}", action, s))
    };
    error.with_context(json!({ "action": action }))
}
