//! Browser automation layer.
//!
//! Defines the `Tab` trait that abstracts over a single browser page
//! (currently Chromium via chromiumoxide). The traversal and extraction
//! engines only ever talk to `&dyn Tab`, which keeps them drivable by a
//! scripted fake in integration tests.

pub mod chromium;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors surfaced by the automation layer.
///
/// `NotFound` and `Timeout` are the expected, retryable outcomes of poking
/// at a page that has not settled yet; the wait primitives absorb them.
/// The remaining variants are real automation failures and are at least
/// logged by callers, even where they are not fatal.
#[derive(thiserror::Error, Debug)]
pub enum BrowserError {
    #[error("no element matches {0}")]
    NotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script evaluation failed: {0}")]
    Eval(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// True for the "not found / not yet" outcomes that a bounded poll is
    /// expected to ride through.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Timeout(_))
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// A point in page (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An element's bounding box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Visual center of the box, the coordinate used for hit-testing and
    /// synthetic pointer events.
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

/// A single browser page.
///
/// Elements are addressed as (CSS selector, index into the matched set);
/// most call sites use index 0. Implementations must not panic on missing
/// elements; they return `BrowserError::NotFound` instead.
#[async_trait]
pub trait Tab: Send + Sync {
    /// Navigate to a URL, waiting up to `timeout_ms` for the load.
    async fn navigate(&self, url: &str, timeout_ms: u64) -> BrowserResult<()>;

    /// The page's current URL.
    async fn current_url(&self) -> BrowserResult<String>;

    /// Evaluate JavaScript in the page and return its JSON value.
    async fn eval(&self, script: &str) -> BrowserResult<serde_json::Value>;

    /// Number of elements matching the selector.
    async fn count(&self, selector: &str) -> BrowserResult<usize>;

    /// Whether the nth match is present and visually rendered.
    async fn is_visible(&self, selector: &str, index: usize) -> BrowserResult<bool>;

    /// Visible text of the nth match.
    async fn inner_text(&self, selector: &str, index: usize) -> BrowserResult<String>;

    /// Attribute value of the nth match, `None` when the attribute is absent.
    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> BrowserResult<Option<String>>;

    /// Trusted click on the nth match (scrolls it into view first).
    async fn click(&self, selector: &str, index: usize) -> BrowserResult<()>;

    /// Forced click: dispatch `el.click()` from script, bypassing hit-testing.
    async fn click_js(&self, selector: &str, index: usize) -> BrowserResult<()>;

    /// Move keyboard focus to the nth match.
    async fn focus(&self, selector: &str, index: usize) -> BrowserResult<()>;

    /// Press a key ("Enter", " ", "Escape", ...) on the focused element.
    async fn press_key(&self, key: &str) -> BrowserResult<()>;

    /// Raw pointer press/release at page coordinates.
    async fn mouse_click_at(&self, point: Point) -> BrowserResult<()>;

    /// Scroll the nth match into view.
    async fn scroll_into_view(&self, selector: &str, index: usize) -> BrowserResult<()>;

    /// Bounding box of the nth match, `None` when it has no layout.
    async fn bounding_box(&self, selector: &str, index: usize) -> BrowserResult<Option<Rect>>;

    /// History back.
    async fn back(&self) -> BrowserResult<()>;

    /// Reload the current page.
    async fn reload(&self) -> BrowserResult<()>;
}
