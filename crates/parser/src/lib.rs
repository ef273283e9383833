use async_trait::async_trait;
use nextwatch_core::{
    CONTENT_CONTAINERS, DocumentSnapshot, HostEvent, ImageState, ObserverError, PageProbe,
    PaintTiming, ReadyState,
};
use scraper::{ElementRef, Html, Selector};
use std::sync::RwLock;

struct Selectors {
    next_data: Selector,
    scripts: Selector,
    generator: Selector,
    route_announcer: Selector,
    hydration: Selector,
    obfuscated: Selector,
    body: Selector,
    content: Selector,
    images: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ObserverError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| ObserverError::parsing_error(e.to_string()))
        };
        Ok(Self {
            next_data: parse("script#__NEXT_DATA__")?,
            scripts: parse("script[src]")?,
            generator: parse(r#"meta[name="generator"]"#)?,
            route_announcer: parse(r#"[aria-live="assertive"]#__next-route-announcer__"#)?,
            hydration: parse("[data-reactroot], [data-reactid]")?,
            obfuscated: parse(r#"body [class*="__"]"#)?,
            body: parse("body")?,
            content: parse(CONTENT_CONTAINERS)?,
            images: parse("img")?,
        })
    }
}

/// Trimmed text length in UTF-16 code units, the unit a browser's
/// `textContent.trim().length` reports.
fn trimmed_len(el: ElementRef<'_>) -> usize {
    el.text().collect::<String>().trim().encode_utf16().count()
}

/// Snapshot a server-rendered document.
///
/// Static markup has not run any script, so the framework runtime is never
/// reachable, images are never decoded and paint timing is unavailable. The
/// terminal load event (see [`static_host_events`]) is what marks images as
/// loaded for such a document.
pub fn snapshot_from_html(html: &str, location: &str) -> Result<DocumentSnapshot, ObserverError> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(html);

    let next_data = document.select(&selectors.next_data).next();
    let next_data_has_props = next_data
        .map(|el| el.text().collect::<String>())
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .is_some_and(|data| data.get("props").is_some_and(|props| !props.is_null()));

    let body = document.select(&selectors.body).next();
    let body_children = body
        .map(|body| body.children().filter_map(ElementRef::wrap).count())
        .unwrap_or(0);
    let content_text_lengths = body
        .map(|body| body.select(&selectors.content).map(trimmed_len).collect())
        .unwrap_or_default();

    Ok(DocumentSnapshot {
        ready_state: ReadyState::Complete,
        location: location.to_string(),
        has_next_data: next_data.is_some(),
        next_data_has_props,
        has_next_runtime: false,
        script_sources: document
            .select(&selectors.scripts)
            .filter_map(|el| el.value().attr("src"))
            .map(str::to_string)
            .collect(),
        meta_generator: document
            .select(&selectors.generator)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string),
        has_route_announcer: document.select(&selectors.route_announcer).next().is_some(),
        has_hydration_markers: document.select(&selectors.hydration).next().is_some(),
        has_obfuscated_classes: document.select(&selectors.obfuscated).next().is_some(),
        has_body: body.is_some(),
        body_children,
        content_text_lengths,
        images: document
            .select(&selectors.images)
            .map(|_| ImageState::pending())
            .collect(),
        paint: PaintTiming::Unavailable,
    })
}

/// Host notifications for a document that arrived complete.
pub fn static_host_events() -> Vec<HostEvent> {
    vec![HostEvent::DomContentLoaded, HostEvent::Load]
}

/// `pathname + search` of an absolute URL.
pub fn route_of(url: &reqwest::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Probe over static markup that can be swapped to simulate navigation.
pub struct HtmlProbe {
    page: RwLock<(String, String)>,
}

impl HtmlProbe {
    pub fn new(html: impl Into<String>, location: impl Into<String>) -> Self {
        Self { page: RwLock::new((html.into(), location.into())) }
    }

    /// Fetch a page over HTTP and probe its server-rendered markup.
    pub async fn fetch(url: &str) -> Result<Self, ObserverError> {
        let response = reqwest::get(url)
            .await
            .map_err(|e| ObserverError::network_error(format!("Fetch failed: {}", e)))?;
        let location = route_of(response.url());
        let html = response
            .text()
            .await
            .map_err(|e| ObserverError::network_error(format!("Reading body failed: {}", e)))?;

        tracing::debug!(target: "nextwatch", url, bytes = html.len(), "fetched static document");
        Ok(Self::new(html, location))
    }

    /// Replace the markup, keeping the location.
    pub fn set_html(&self, html: impl Into<String>) {
        if let Ok(mut page) = self.page.write() {
            page.0 = html.into();
        }
    }

    /// Replace markup and location together, as a client-side navigation would.
    pub fn navigate(&self, location: impl Into<String>, html: impl Into<String>) {
        if let Ok(mut page) = self.page.write() {
            *page = (html.into(), location.into());
        }
    }
}

#[async_trait]
impl PageProbe for HtmlProbe {
    async fn snapshot(&self) -> Result<DocumentSnapshot, ObserverError> {
        let page = self
            .page
            .read()
            .map_err(|_| ObserverError::environment_unavailable("Probe state poisoned"))?;
        snapshot_from_html(&page.0, &page.1)
    }
}
