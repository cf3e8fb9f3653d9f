//! Chromium-backed `Tab` implementation using chromiumoxide.

use super::{BrowserError, BrowserResult, Point, Rect, Tab};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. BUILDSHEET_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("BUILDSHEET_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.buildsheet/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".buildsheet/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".buildsheet/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".buildsheet/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".buildsheet/chromium/chrome-linux64/chrome"),
                home.join(".buildsheet/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A headless Chromium instance; tabs are created from it per pass.
pub struct ChromiumDriver {
    browser: Browser,
}

impl ChromiumDriver {
    /// Launch a headless Chromium and start its event handler task.
    pub async fn launch() -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set BUILDSHEET_CHROMIUM_PATH or install Chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .window_size(1600, 1200)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }

    /// Open a fresh tab.
    pub async fn new_tab(&self) -> Result<ChromiumTab> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(ChromiumTab { page })
    }
}

/// One Chromium page implementing the automation surface.
pub struct ChromiumTab {
    page: Page,
}

impl ChromiumTab {
    /// Wrap `body` in a script that binds `el` to the nth selector match.
    /// The script returns `null` when the element does not exist.
    fn nth_script(selector: &str, index: usize, body: &str) -> String {
        let sel = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
        format!(
            "(() => {{ const els = document.querySelectorAll({sel}); \
             const el = els[{index}]; if (!el) return null; {body} }})()"
        )
    }

    async fn nth_element(
        &self,
        selector: &str,
        index: usize,
    ) -> BrowserResult<chromiumoxide::Element> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|_| BrowserError::NotFound(selector.to_string()))?;
        elements
            .into_iter()
            .nth(index)
            .ok_or_else(|| BrowserError::NotFound(format!("{selector}[{index}]")))
    }
}

#[async_trait]
impl Tab for ChromiumTab {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> BrowserResult<()> {
        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(BrowserError::Navigation(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} after {timeout_ms}ms"
            ))),
        }
    }

    async fn current_url(&self) -> BrowserResult<String> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?
            .map(|u| u.to_string())
            .ok_or_else(|| BrowserError::Protocol("page has no URL".to_string()))
    }

    async fn eval(&self, script: &str) -> BrowserResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Eval(e.to_string()))?;
        // Statements evaluating to undefined have no JSON value; treat as null.
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn count(&self, selector: &str) -> BrowserResult<usize> {
        let sel = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
        let value = self
            .eval(&format!("document.querySelectorAll({sel}).length"))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, selector: &str, index: usize) -> BrowserResult<bool> {
        let script = Self::nth_script(
            selector,
            index,
            "const r = el.getBoundingClientRect(); \
             return r.width > 0 && r.height > 0 && el.getClientRects().length > 0;",
        );
        Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
    }

    async fn inner_text(&self, selector: &str, index: usize) -> BrowserResult<String> {
        let script = Self::nth_script(selector, index, "return el.innerText;");
        match self.eval(&script).await? {
            serde_json::Value::String(text) => Ok(text),
            serde_json::Value::Null => {
                Err(BrowserError::NotFound(format!("{selector}[{index}]")))
            }
            other => Ok(other.to_string()),
        }
    }

    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        let attr = serde_json::to_string(name).unwrap_or_else(|_| "\"\"".to_string());
        let script = Self::nth_script(
            selector,
            index,
            &format!("return {{ v: el.getAttribute({attr}) }};"),
        );
        match self.eval(&script).await? {
            serde_json::Value::Null => {
                Err(BrowserError::NotFound(format!("{selector}[{index}]")))
            }
            value => Ok(value
                .get("v")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())),
        }
    }

    async fn click(&self, selector: &str, index: usize) -> BrowserResult<()> {
        let element = self.nth_element(selector, index).await?;
        let _ = element.scroll_into_view().await;
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Protocol(format!("click failed: {e}")))
    }

    async fn click_js(&self, selector: &str, index: usize) -> BrowserResult<()> {
        let script = Self::nth_script(selector, index, "el.click(); return true;");
        match self.eval(&script).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(BrowserError::NotFound(format!("{selector}[{index}]"))),
        }
    }

    async fn focus(&self, selector: &str, index: usize) -> BrowserResult<()> {
        let script = Self::nth_script(selector, index, "el.focus(); return true;");
        match self.eval(&script).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(BrowserError::NotFound(format!("{selector}[{index}]"))),
        }
    }

    async fn press_key(&self, key: &str) -> BrowserResult<()> {
        let down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key(key)
            .build()
            .map_err(BrowserError::Protocol)?;
        self.page
            .execute(down)
            .await
            .map_err(|e| BrowserError::Protocol(format!("key down failed: {e}")))?;

        let up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(key)
            .build()
            .map_err(BrowserError::Protocol)?;
        self.page
            .execute(up)
            .await
            .map_err(|e| BrowserError::Protocol(format!("key up failed: {e}")))?;
        Ok(())
    }

    async fn mouse_click_at(&self, point: Point) -> BrowserResult<()> {
        let press = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MousePressed)
            .x(point.x)
            .y(point.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::Protocol)?;
        self.page
            .execute(press)
            .await
            .map_err(|e| BrowserError::Protocol(format!("mouse down failed: {e}")))?;

        let release = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseReleased)
            .x(point.x)
            .y(point.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::Protocol)?;
        self.page
            .execute(release)
            .await
            .map_err(|e| BrowserError::Protocol(format!("mouse up failed: {e}")))?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str, index: usize) -> BrowserResult<()> {
        let script = Self::nth_script(
            selector,
            index,
            "el.scrollIntoView({ block: 'center' }); return true;",
        );
        match self.eval(&script).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(BrowserError::NotFound(format!("{selector}[{index}]"))),
        }
    }

    async fn bounding_box(&self, selector: &str, index: usize) -> BrowserResult<Option<Rect>> {
        let script = Self::nth_script(
            selector,
            index,
            "const r = el.getBoundingClientRect(); \
             return { x: r.left, y: r.top, width: r.width, height: r.height };",
        );
        match self.eval(&script).await? {
            serde_json::Value::Null => Ok(None),
            value => Ok(serde_json::from_value(value).ok()),
        }
    }

    async fn back(&self) -> BrowserResult<()> {
        self.eval("history.back()").await?;
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }

    async fn reload(&self) -> BrowserResult<()> {
        self.page
            .reload()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation(format!("reload failed: {e}")))
    }
}
