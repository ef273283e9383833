pub mod snapshot;
pub mod hooks;

use serde_json::Value;

pub fn build_js_call(func: &str, args: &[Value]) -> String {
    let args_str = args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("({})({})", func, args_str)
}

/// Drain expression: installs the hooks if the current document lacks them,
/// then empties their queues.
pub fn drain_call() -> String {
    format!("({})(({})())", hooks::DRAIN_ACTIVITY, hooks::INSTALL_HOOKS)
}
