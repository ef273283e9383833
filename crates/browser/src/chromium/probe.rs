use async_trait::async_trait;
use chromiumoxide::page::Page;
use nextwatch_core::{CONTENT_CONTAINERS, DocumentSnapshot, ObserverError, PageProbe};
use serde_json::{Value, json};

use crate::shared::{js, to_observer_error};

/// Snapshots a live page with one script evaluation per call.
#[derive(Debug, Clone)]
pub struct ChromiumProbe {
    page: Page,
}

impl ChromiumProbe {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl PageProbe for ChromiumProbe {
    async fn snapshot(&self) -> Result<DocumentSnapshot, ObserverError> {
        let call = js::build_js_call(js::snapshot::SNAPSHOT, &[json!(CONTENT_CONTAINERS)]);
        let result = self
            .page
            .evaluate(call)
            .await
            .map_err(|e| to_observer_error(e, "Snapshot"))?;
        parse_snapshot(result.value().cloned())
    }
}

fn parse_snapshot(value: Option<Value>) -> Result<DocumentSnapshot, ObserverError> {
    let value = value.ok_or_else(|| ObserverError::script_error("Snapshot script returned nothing"))?;
    serde_json::from_value(value)
        .map_err(|e| ObserverError::parsing_error(format!("Malformed snapshot: {}", e)))
}
