//! Site profile: the one-off DOM knowledge for the target configurator.
//!
//! Every selector the engines use lives here as an ordered strategy list
//! (first match wins), so the traversal logic itself stays free of literal
//! DOM strings and the lists can be exercised against a scripted page.

use crate::browser::Tab;
use std::time::Duration;
use tracing::debug;

/// Selector strategy lists, hosts and timing budgets for one configurator.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Model listing (grid) page.
    pub listing_url: String,
    /// Host serving the configure/summary flavors of a build URL.
    pub configure_host: String,
    /// Fallback host tried once when Pass-2 navigation fails outright.
    pub alternate_host: String,
    /// Template for a synthesized summary URL when none can be mined;
    /// `{model}` is replaced with the mined model code.
    pub summary_template: String,

    // ── Listing grid ──
    pub card: String,
    pub card_order_attr: String,
    pub card_names: Vec<String>,
    pub card_bodies: Vec<String>,
    pub build_buttons: Vec<String>,
    pub configurator_ready: Vec<String>,

    // ── Trim lines ──
    pub line_tiles: Vec<String>,
    pub selected_line: Vec<String>,
    pub line_hotspot: String,
    pub selected_class_token: String,

    // ── Engine selection ──
    pub change_engine: String,
    pub engine_modal: String,
    pub engine_modal_close: String,
    pub modal_tile: String,
    pub modal_tile_name: String,
    pub engine_tile: String,
    pub engine_tile_name: String,
    pub engine_continue: String,
    pub interstitial_continue: Vec<String>,
    pub back_to_lines: Vec<String>,

    // ── Summary page ──
    pub cookie_accept: Vec<String>,
    pub accordion_toggle: String,
    pub spec_item: String,
    pub spec_key_attr: String,
    pub spec_value: String,
    pub price_row: String,
    pub price_row_label: String,
    pub price_row_value: String,
    pub summary_image: Vec<String>,

    // ── Budgets ──
    pub poll_interval: Duration,
    pub settle: Duration,
    pub ready_budget: Duration,
    pub select_budget: Duration,
    pub modal_budget: Duration,
    pub interstitial_budget: Duration,
    pub nav_timeout_ms: u64,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            listing_url: "https://www.bmw.co.uk/en/all-models.html".to_string(),
            configure_host: "configure.bmw.co.uk".to_string(),
            alternate_host: "www.bmw.co.uk".to_string(),
            summary_template: "https://configure.bmw.co.uk/en_GB/summary/{model}".to_string(),

            card: "[data-filterable-item][data-order]".to_string(),
            card_order_attr: "data-order".to_string(),
            card_names: vec![
                ".cmp-modelcard__name".to_string(),
                "[data-test='model-name']".to_string(),
                "h3".to_string(),
            ],
            card_bodies: vec![
                ".cmp-modelcard__flyout-title".to_string(),
                "[data-test='body-type']".to_string(),
            ],
            build_buttons: vec![
                "a[href*='configure']".to_string(),
                "a[data-link-type='configurator']".to_string(),
                "button[data-test='build-your-own']".to_string(),
            ],
            configurator_ready: vec![
                "[data-component='line-selection']".to_string(),
                ".con-line-tile".to_string(),
                "[data-test='change-engine']".to_string(),
            ],

            line_tiles: vec![
                ".con-line-tile".to_string(),
                "[data-test='line-tile']".to_string(),
                "[role='radio'][data-line]".to_string(),
            ],
            selected_line: vec![
                ".con-line-tile.is-selected".to_string(),
                "[data-test='line-tile'][aria-pressed='true']".to_string(),
            ],
            line_hotspot: ".con-line-tile__cta".to_string(),
            selected_class_token: "is-selected".to_string(),

            change_engine: "[data-test='change-engine']".to_string(),
            engine_modal: "[role='dialog'][data-test='engine-chooser']".to_string(),
            engine_modal_close: "[data-test='engine-chooser'] [data-test='close']".to_string(),
            modal_tile: "[data-test='engine-chooser'] [data-test='engine-tile']".to_string(),
            modal_tile_name: "[data-test='engine-chooser'] [data-test='engine-tile'] .product-name"
                .to_string(),
            engine_tile: ".con-engine-tile".to_string(),
            engine_tile_name: ".con-engine-tile .product-name".to_string(),
            engine_continue: "[data-test='engine-chooser'] button[data-test='continue']"
                .to_string(),
            interstitial_continue: vec![
                "button[data-test='continue-in-tab']".to_string(),
                ".con-dialog button.con-dialog__confirm".to_string(),
            ],
            back_to_lines: vec![
                "[data-test='back-to-lines']".to_string(),
                "button.con-nav-back".to_string(),
            ],

            cookie_accept: vec![
                "#onetrust-accept-btn-handler".to_string(),
                "button[data-test='accept-cookies']".to_string(),
            ],
            accordion_toggle: "[data-test='spec-accordion'] > button".to_string(),
            spec_item: "[data-test='spec-item']".to_string(),
            spec_key_attr: "data-spec-key".to_string(),
            spec_value: ".spec-item__value".to_string(),
            price_row: "[data-test='price-panel'] [data-test='price-row']".to_string(),
            price_row_label: ".price-row__label".to_string(),
            price_row_value: ".price-row__value".to_string(),
            summary_image: vec![
                "meta[property='og:image']".to_string(),
                ".con-summary__vehicle-image img".to_string(),
            ],

            poll_interval: Duration::from_millis(250),
            settle: Duration::from_millis(600),
            ready_budget: Duration::from_secs(20),
            select_budget: Duration::from_secs(12),
            modal_budget: Duration::from_secs(8),
            interstitial_budget: Duration::from_secs(4),
            nav_timeout_ms: 30_000,
        }
    }
}

impl SiteProfile {
    /// Selector addressing one grid card by its order attribute value.
    pub fn card_by_order(&self, order: &str) -> String {
        let base = self.card.replace("[data-order]", "");
        format!("{base}[{}=\"{order}\"]", self.card_order_attr)
    }

    /// Build-affordance selectors scoped to one card.
    pub fn build_buttons_in(&self, card_selector: &str) -> Vec<String> {
        self.build_buttons
            .iter()
            .map(|b| format!("{card_selector} {b}"))
            .collect()
    }
}

/// Best-effort cookie banner dismissal; both passes run it after their
/// first navigation. Failures are logged and ignored.
pub async fn dismiss_cookie_banner(tab: &dyn Tab, profile: &SiteProfile) {
    for selector in &profile.cookie_accept {
        if tab.is_visible(selector, 0).await.unwrap_or(false) {
            if let Err(e) = tab.click(selector, 0).await {
                debug!("cookie banner click on {selector} failed: {e}");
                let _ = tab.click_js(selector, 0).await;
            }
            tokio::time::sleep(profile.settle).await;
            return;
        }
    }
}

/// First non-empty image URL readable through the given strategy list.
/// `<meta>` candidates are read from `content`, anything else from `src`.
pub async fn read_first_image(tab: &dyn Tab, selectors: &[String]) -> String {
    for selector in selectors {
        let attr = if selector.starts_with("meta") {
            "content"
        } else {
            "src"
        };
        if let Ok(Some(value)) = tab.attribute(selector, 0, attr).await {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    String::new()
}
