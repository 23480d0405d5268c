//! Browser automation for persona sessions.
//!
//! [`Automation`] is the low-level backend seam; [`ChromeAutomation`]
//! implements it over the Chrome DevTools Protocol. [`BrowserController`]
//! layers observation, action validation, and page classification on top.

pub mod cdp;
pub mod chrome;
pub mod controller;

use async_trait::async_trait;
use personalens_core::types::{PageSignals, Rect, Viewport};
use personalens_core::Result;

pub use chrome::ChromeAutomation;
pub use controller::BrowserController;

/// Low-level browser backend.
#[async_trait]
pub trait Automation: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    /// Base64-encoded PNG of the page, or of `clip` when given.
    async fn screenshot(&self, clip: Option<Rect>) -> Result<String>;
    async fn click(&self, x: f64, y: f64) -> Result<()>;
    async fn scroll(&self, dy: i64) -> Result<()>;
    async fn go_back(&self) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    /// Returns true when a consent banner was found and clicked away.
    async fn dismiss_cookie_banner(&self) -> bool;
    async fn page_signals(&self) -> Result<PageSignals>;
    async fn viewport(&self) -> Result<Viewport>;
    async fn close(&self);
}
