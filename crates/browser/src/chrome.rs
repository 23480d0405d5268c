//! Chrome lifecycle and the CDP-backed [`Automation`] implementation.

use crate::cdp::CdpClient;
use crate::Automation;
use async_trait::async_trait;
use personalens_core::types::{PageSignals, Rect, Viewport};
use personalens_core::{config::BrowserConfig, Error, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const NAVIGATION_TIMEOUT_SECS: u64 = 20;

/// Overlay selectors tried in order when dismissing consent banners.
const COOKIE_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    ".iubenda-cs-accept-btn",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    ".cc-allow",
    ".cc-accept",
    ".cookie-accept",
    "[data-cookiebanner='accept_button']",
    "button[aria-label='Accetta']",
    "button[aria-label='Accept']",
];

/// Accept-button texts matched case-insensitively when no selector hits.
const COOKIE_ACCEPT_TEXTS: &[&str] = &[
    "accetta tutti",
    "accetta",
    "accept all",
    "accept",
    "ho capito",
    "ok",
    "consenti",
    "agree",
];

pub struct ChromeAutomation {
    client: CdpClient,
    child: Mutex<Option<Child>>,
}

impl ChromeAutomation {
    /// Launch a Chrome instance and attach to its first page target.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let binary = find_chrome_binary(config)?;
        let port = find_free_port()?;

        let mut cmd = Command::new(&binary);
        cmd.arg(format!("--remote-debugging-port={port}"))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--mute-audio")
            .arg(format!(
                "--window-size={},{}",
                config.viewport_width, config.viewport_height
            ))
            .arg("about:blank")
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        if !config.headed {
            cmd.arg("--headless=new").arg("--disable-gpu");
        }
        if let Some(dir) = profile_dir() {
            cmd.arg(format!("--user-data-dir={}", dir.display()));
        }

        let child = cmd
            .spawn()
            .map_err(|e| Error::Browser(format!("failed to launch {binary}: {e}")))?;
        info!(%binary, port, headed = config.headed, "launched browser");

        wait_for_cdp_ready(port).await?;
        let ws_url = get_page_ws_url(port).await?;
        let client = CdpClient::connect(&ws_url).await?;

        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;
        client
            .set_viewport(config.viewport_width, config.viewport_height)
            .await?;

        Ok(Self {
            client,
            child: Mutex::new(Some(child)),
        })
    }

    async fn wait_for_load(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(NAVIGATION_TIMEOUT_SECS);
        loop {
            let state = self.client.evaluate("document.readyState").await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                // Treat a slow page as loaded enough; the observation
                // pipeline works on whatever has rendered.
                warn!("page did not reach readyState=complete, continuing");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[async_trait]
impl Automation for ChromeAutomation {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.client
            .send_command("Page.navigate", json!({ "url": url }))
            .await?;
        self.wait_for_load().await
    }

    async fn screenshot(&self, clip: Option<Rect>) -> Result<String> {
        let clip = clip.map(|r| {
            json!({
                "x": r.x,
                "y": r.y,
                "width": r.width,
                "height": r.height,
                "scale": 1.0,
            })
        });
        self.client.screenshot(clip).await
    }

    async fn click(&self, x: f64, y: f64) -> Result<()> {
        self.client.dispatch_click(x, y).await?;
        // Clicks may trigger navigation; give the page a moment to settle.
        tokio::time::sleep(Duration::from_millis(800)).await;
        self.wait_for_load().await
    }

    async fn scroll(&self, dy: i64) -> Result<()> {
        self.client
            .evaluate(&format!("window.scrollBy({{top: {dy}, behavior: 'instant'}})"))
            .await?;
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        self.client.evaluate("history.back()").await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.wait_for_load().await
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.client.evaluate("location.href").await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Browser("location.href returned no string".to_string()))
    }

    async fn dismiss_cookie_banner(&self) -> bool {
        let selectors = serde_json::to_string(COOKIE_SELECTORS).unwrap_or_default();
        let texts = serde_json::to_string(COOKIE_ACCEPT_TEXTS).unwrap_or_default();
        let script = format!(
            r#"(() => {{
                const selectors = {selectors};
                for (const sel of selectors) {{
                    const el = document.querySelector(sel);
                    if (el && el.offsetParent !== null) {{ el.click(); return true; }}
                }}
                const texts = {texts};
                const buttons = document.querySelectorAll('button, a[role="button"], [role="button"]');
                for (const btn of buttons) {{
                    const label = (btn.textContent || '').trim().toLowerCase();
                    if (texts.includes(label) && btn.offsetParent !== null) {{
                        btn.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#
        );
        match self.client.evaluate(&script).await {
            Ok(Value::Bool(clicked)) => {
                if clicked {
                    debug!("dismissed cookie banner");
                    tokio::time::sleep(Duration::from_millis(400)).await;
                }
                clicked
            }
            Ok(_) => false,
            Err(e) => {
                debug!(error = %e, "cookie banner probe failed");
                false
            }
        }
    }

    async fn page_signals(&self) -> Result<PageSignals> {
        let script = r#"(() => {
            const texts = (nodes, max) => Array.from(nodes)
                .map(el => (el.textContent || '').trim())
                .filter(t => t.length > 0 && t.length < 120)
                .slice(0, max);
            return {
                url: location.href,
                title: document.title || '',
                headings: texts(document.querySelectorAll('h1, h2'), 20),
                link_texts: texts(document.querySelectorAll('a, button'), 80),
            };
        })()"#;
        let value = self.client.evaluate(script).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Browser(format!("malformed page signals: {e}")))
    }

    async fn viewport(&self) -> Result<Viewport> {
        let value = self
            .client
            .evaluate("({ width: window.innerWidth, height: window.innerHeight })")
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Browser(format!("malformed viewport: {e}")))
    }

    async fn close(&self) {
        self.client.shutdown();
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill browser process");
            }
        }
    }
}

fn find_chrome_binary(config: &BrowserConfig) -> Result<String> {
    if let Some(binary) = &config.binary {
        return Ok(binary.clone());
    }
    let candidates = [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ];
    for name in candidates {
        if let Ok(path) = which::which(name) {
            return Ok(path.to_string_lossy().to_string());
        }
    }
    // macOS app bundle path is not on PATH.
    let mac_path = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";
    if std::path::Path::new(mac_path).exists() {
        return Ok(mac_path.to_string());
    }
    Err(Error::Browser(
        "no Chrome or Chromium binary found; set browser.binary in the config".to_string(),
    ))
}

fn find_free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .map_err(|e| Error::Browser(format!("failed to pick a debugging port: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Browser(format!("failed to read local addr: {e}")))?
        .port();
    Ok(port)
}

fn profile_dir() -> Option<std::path::PathBuf> {
    let dir = dirs::home_dir()?.join(".personalens").join("browser-profile");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

async fn wait_for_cdp_ready(port: u16) -> Result<()> {
    let url = format!("http://127.0.0.1:{port}/json/version");
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Err(Error::Browser(format!(
        "browser did not expose CDP on port {port} within 10s"
    )))
}

async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{port}/json/list");
    let targets: Vec<Value> = reqwest::get(&url)
        .await
        .map_err(|e| Error::Browser(format!("CDP target list failed: {e}")))?
        .json()
        .await
        .map_err(|e| Error::Browser(format!("CDP target list parse failed: {e}")))?;
    targets
        .iter()
        .find(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .and_then(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Browser("no page target available".to_string()))
}
