use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::page::Page;
use futures::StreamExt;
use nextwatch_core::ObserverError;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::shared::{PumpConfig, to_observer_error};

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub viewport: Option<(u32, u32)>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self { headless: true, viewport: None }
    }
}

/// Throwaway chromium profile directory, removed on drop.
#[derive(Debug)]
pub(crate) struct ProfileDir(PathBuf);

impl ProfileDir {
    pub(crate) fn create() -> Result<Self, ObserverError> {
        let path = std::env::temp_dir().join(format!("nextwatch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)
            .map_err(|e| ObserverError::browser_error(format!("Failed to create temp dir: {}", e)))?;
        Ok(Self(path))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            tracing::debug!(target: "nextwatch", path = %self.0.display(), error = %e, "profile dir not removed");
        }
    }
}

/// A launched browser and its profile directory. The browser is dropped
/// (and its process killed) before the directory is removed.
pub struct BrowserSession {
    browser: Browser,
    profile: ProfileDir,
}

impl BrowserSession {
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn profile_dir(&self) -> &Path {
        self.profile.path()
    }

    /// Close the browser and wait for its process before the profile
    /// directory is removed.
    pub async fn close(mut self) -> Result<(), ObserverError> {
        self.browser
            .close()
            .await
            .map_err(|e| to_observer_error(e, "Close"))?;
        self.browser
            .wait()
            .await
            .map_err(|e| ObserverError::browser_error(format!("Waiting for browser exit failed: {}", e)))?;
        Ok(())
    }
}

/// Launch chromium with a throwaway profile directory and drive its CDP
/// handler on a background task.
pub async fn launch(options: LaunchOptions) -> Result<BrowserSession, ObserverError> {
    let profile = ProfileDir::create()?;

    let mut builder = BrowserConfig::builder()
        .headless_mode(if options.headless { HeadlessMode::True } else { HeadlessMode::False })
        .user_data_dir(profile.path());

    if let Some((w, h)) = options.viewport {
        builder = builder.window_size(w, h);
    }

    let config = builder
        .build()
        .map_err(|e| ObserverError::browser_error(format!("Config failed: {}", e)))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| to_observer_error(e, "Launch"))?;

    tokio::spawn(async move { while handler.next().await.is_some() {} });
    tracing::debug!(target: "nextwatch", headless = options.headless, "browser launched");
    Ok(BrowserSession { browser, profile })
}

/// Open a new tab on `url`, bounded by `pump.navigation`.
pub async fn open_page(browser: &Browser, url: &str, pump: &PumpConfig) -> Result<Page, ObserverError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| to_observer_error(e, "New page"))?;

    tokio::time::timeout(pump.navigation, page.goto(url.to_string()))
        .await
        .map_err(|_| {
            ObserverError::timeout_error(format!("Navigation to {} timed out", url))
                .with_context(json!({ "url": url, "timeout_ms": pump.navigation.as_millis() as u64 }))
        })?
        .map_err(|e| {
            ObserverError::navigation_error(format!("Navigation failed: {}", e))
                .with_context(json!({ "url": url }))
        })?;

    Ok(page)
}
