//! High-level browsing operations on top of an [`Automation`] backend.

use crate::Automation;
use personalens_classifier::classify;
use personalens_core::types::{NavigationAction, PageObservation, Rect, Viewport};
use personalens_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct BrowserController {
    automation: Arc<dyn Automation>,
    last_viewport: Mutex<Option<Viewport>>,
}

impl BrowserController {
    pub fn new(automation: Arc<dyn Automation>) -> Self {
        Self {
            automation,
            last_viewport: Mutex::new(None),
        }
    }

    /// Navigate to a URL, defaulting to https when no scheme is given.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let url = normalize_url(url);
        self.automation
            .navigate(&url)
            .await
            .map_err(|e| Error::NavigationFailed(format!("{url}: {e}")))
    }

    /// Capture the current page as a classified observation.
    ///
    /// Cookie banner dismissal is best effort and never fails the
    /// observation.
    pub async fn observe(&self) -> Result<PageObservation> {
        if self.automation.dismiss_cookie_banner().await {
            debug!("cookie banner dismissed before observation");
        }

        let signals = self.automation.page_signals().await?;
        let screenshot_b64 = self.automation.screenshot(None).await?;
        let viewport = self.automation.viewport().await?;
        let page_type = classify(&signals);

        {
            let mut guard = self.last_viewport.lock().await;
            *guard = Some(viewport.clone());
        }

        Ok(PageObservation {
            url: signals.url.clone(),
            screenshot_b64,
            page_type,
            signals,
            viewport,
        })
    }

    /// Execute one navigation action. Click coordinates are validated
    /// against the viewport from the most recent observation.
    pub async fn act(&self, action: &NavigationAction) -> Result<()> {
        match action {
            NavigationAction::ClickAt { x, y } => {
                let viewport = self.last_viewport.lock().await.clone();
                if let Some(viewport) = viewport {
                    if !viewport.contains(*x, *y) {
                        return Err(Error::InvalidAction(format!(
                            "click at ({x:.0}, {y:.0}) is outside the {}x{} viewport",
                            viewport.width, viewport.height
                        )));
                    }
                }
                self.automation.click(*x, *y).await
            }
            NavigationAction::ScrollBy { amount } => self.automation.scroll(*amount).await,
            NavigationAction::NavigateTo { url } => self.navigate(url).await,
            NavigationAction::GoBack => self.automation.go_back().await,
            NavigationAction::NoOp => Ok(()),
        }
    }

    /// Screenshot of a rectangular page region.
    pub async fn highlight(&self, rect: &Rect) -> Result<String> {
        let viewport = self.last_viewport.lock().await.clone();
        if let Some(viewport) = viewport {
            if !rect.fits_in(&viewport) {
                return Err(Error::InvalidAction(format!(
                    "highlight region {}x{} at ({:.0}, {:.0}) exceeds the viewport",
                    rect.width, rect.height, rect.x, rect.y
                )));
            }
        }
        self.automation.screenshot(Some(rect.clone())).await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.automation.current_url().await
    }

    pub async fn close(&self) {
        self.automation.close().await;
    }
}

fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        warn!(url = trimmed, "no scheme given, assuming https");
        format!("https://{trimmed}")
    }
}
