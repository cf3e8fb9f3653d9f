//! Scripted fake configurator used by the integration tests.
//!
//! `FakeTab` implements the automation surface over an in-memory model of
//! the site: a listing grid, one configurator per unit (classic inline
//! engine tiles or the chooser modal), and summary pages with spec items
//! and a price panel. Selectors are matched against the same `SiteProfile`
//! the engines use, so the traversal runs unmodified.

use async_trait::async_trait;
use buildsheet::browser::{BrowserError, BrowserResult, Point, Rect, Tab};
use buildsheet::site::SiteProfile;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeEngine {
    pub name: &'static str,
    pub series: &'static str,
    pub line_code: &'static str,
    pub model_code: &'static str,
}

#[derive(Debug, Clone)]
pub struct FakeLine {
    pub label: &'static str,
    pub engines: Vec<FakeEngine>,
}

#[derive(Debug, Clone)]
pub struct FakeUnit {
    pub order: u32,
    pub name: &'static str,
    pub body: &'static str,
    /// true = engine chooser modal; false = classic inline tile list.
    pub modal_ui: bool,
    pub lines: Vec<FakeLine>,
}

#[derive(Debug, Clone, PartialEq)]
enum PageState {
    Listing,
    Configurator { unit: usize },
    Summary { url: String },
}

#[derive(Debug)]
struct State {
    page: PageState,
    selected_line: Option<usize>,
    selected_engine: Option<usize>,
    modal_open: bool,
    accordion_expanded: bool,
}

pub struct FakeTab {
    profile: SiteProfile,
    units: Vec<FakeUnit>,
    state: Mutex<State>,
}

/// Profile wired for the fake site, with millisecond budgets so the wait
/// primitives spin fast.
pub fn test_profile() -> SiteProfile {
    let mut profile = SiteProfile::default();
    profile.listing_url = "https://grid.fake.test/models".to_string();
    profile.configure_host = "configure.fake.test".to_string();
    profile.alternate_host = "alt.fake.test".to_string();
    profile.summary_template = "https://configure.fake.test/en_GB/summary/{model}".to_string();
    profile.poll_interval = Duration::from_millis(1);
    profile.settle = Duration::from_millis(1);
    profile.ready_budget = Duration::from_millis(100);
    profile.select_budget = Duration::from_millis(100);
    profile.modal_budget = Duration::from_millis(100);
    profile.interstitial_budget = Duration::from_millis(20);
    profile.nav_timeout_ms = 1000;
    profile
}

/// Two cards, one line each, two engine variants each, all line codes
/// distinct. Card 0 uses the classic tile list, card 1 the chooser modal.
pub fn two_card_fixture() -> Vec<FakeUnit> {
    vec![
        FakeUnit {
            order: 0,
            name: "X5",
            body: "SUV",
            modal_ui: false,
            lines: vec![FakeLine {
                label: "M Sport",
                engines: vec![
                    FakeEngine {
                        name: "xDrive40i",
                        series: "X5",
                        line_code: "X540",
                        model_code: "SE000001",
                    },
                    FakeEngine {
                        name: "M60i",
                        series: "X5",
                        line_code: "X560",
                        model_code: "SE000002",
                    },
                ],
            }],
        },
        FakeUnit {
            order: 1,
            name: "i4",
            body: "Gran Coupé",
            modal_ui: true,
            lines: vec![FakeLine {
                label: "M Sport Pro",
                engines: vec![
                    FakeEngine {
                        name: "eDrive40",
                        series: "I4",
                        line_code: "I440",
                        model_code: "SE000003",
                    },
                    FakeEngine {
                        name: "M50",
                        series: "I4",
                        line_code: "I450",
                        model_code: "SE000004",
                    },
                ],
            }],
        },
    ]
}

impl FakeTab {
    pub fn new(units: Vec<FakeUnit>, profile: SiteProfile) -> Self {
        Self {
            profile,
            units,
            state: Mutex::new(State {
                page: PageState::Listing,
                selected_line: None,
                selected_engine: None,
                modal_open: false,
                accordion_expanded: false,
            }),
        }
    }

    fn engine_url(&self, unit: usize, line: usize, engine: usize) -> String {
        let e = &self.units[unit].lines[line].engines[engine];
        format!(
            "https://origin.fake.test/configure/{}/{}/en_GB/{}",
            e.series, e.line_code, e.model_code
        )
    }

    fn selected_engine_url(&self, state: &State) -> Option<String> {
        match state.page {
            PageState::Configurator { unit } => {
                let line = state.selected_line?;
                let engine = state.selected_engine?;
                Some(self.engine_url(unit, line, engine))
            }
            _ => None,
        }
    }

    fn engines_of(&self, state: &State) -> usize {
        match state.page {
            PageState::Configurator { unit } => state
                .selected_line
                .map(|l| self.units[unit].lines[l].engines.len())
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn unit_of(&self, state: &State) -> Option<&FakeUnit> {
        match state.page {
            PageState::Configurator { unit } => self.units.get(unit),
            _ => None,
        }
    }

    /// Order value embedded in a card-scoped selector, if any.
    fn order_in_selector(&self, selector: &str) -> Option<u32> {
        let marker = format!("[{}=\"", self.profile.card_order_attr);
        let at = selector.find(&marker)? + marker.len();
        let rest = &selector[at..];
        let end = rest.find('"')?;
        rest[..end].parse().ok()
    }

    fn is_build_button(&self, selector: &str) -> bool {
        self.profile
            .build_buttons
            .iter()
            .any(|b| selector.ends_with(b.as_str()) && selector.len() > b.len())
    }
}

#[async_trait]
impl Tab for FakeTab {
    async fn navigate(&self, url: &str, _timeout_ms: u64) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();
        state.selected_line = None;
        state.selected_engine = None;
        state.modal_open = false;
        state.accordion_expanded = false;
        if url == self.profile.listing_url {
            state.page = PageState::Listing;
            Ok(())
        } else if url.contains("/summary/") {
            // Test hooks: a host that never resolves, and a path that is
            // dead on every host.
            if url.contains("unreachable.fake.test") || url.contains("/DEAD") {
                return Err(BrowserError::Navigation("host unreachable".to_string()));
            }
            state.page = PageState::Summary {
                url: url.to_string(),
            };
            Ok(())
        } else {
            state.page = PageState::Listing;
            Ok(())
        }
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let state = self.state.lock().unwrap();
        Ok(match &state.page {
            PageState::Listing => self.profile.listing_url.clone(),
            PageState::Summary { url } => url.clone(),
            PageState::Configurator { .. } => self
                .selected_engine_url(&state)
                .unwrap_or_else(|| "https://configure.fake.test/start".to_string()),
        })
    }

    async fn eval(&self, script: &str) -> BrowserResult<Value> {
        let state = self.state.lock().unwrap();

        // Hit-test: every tile is topmost in the fake.
        if script.contains("elementFromPoint") {
            return Ok(json!(true));
        }

        // Grid harvest.
        if script.contains("data-filterable-item") {
            if state.page != PageState::Listing {
                return Ok(json!([]));
            }
            let cards: Vec<Value> = self
                .units
                .iter()
                .map(|u| {
                    let mut names = vec![Value::Null; self.profile.card_names.len()];
                    names[0] = json!(u.name);
                    let mut bodies = vec![Value::Null; self.profile.card_bodies.len()];
                    bodies[0] = json!(u.body);
                    json!({
                        "order": u.order.to_string(),
                        "text": format!("{}\nFrom £50,000\n{}", u.name, u.body),
                        "names": names,
                        "bodies": bodies,
                    })
                })
                .collect();
            return Ok(json!(cards));
        }

        // Candidate build links.
        if script.contains("og:url") {
            return Ok(match self.selected_engine_url(&state) {
                Some(url) => json!([url]),
                None => json!([]),
            });
        }

        // Summary spec items.
        if script.contains("data-spec-key") {
            if !matches!(state.page, PageState::Summary { .. }) {
                return Ok(json!([]));
            }
            return Ok(json!([
                { "key": "battery_size value", "value": "83.9 kWh" },
                { "key": "emission wltp value", "value": "17.1 kWh/100km" },
                { "key": "", "value": "ignored" },
            ]));
        }

        // Summary price rows.
        if script.contains("price-row__label") {
            if !matches!(state.page, PageState::Summary { .. }) {
                return Ok(json!([]));
            }
            return Ok(json!([
                { "label": "Basic price", "value": "£54,985.00" },
                { "label": "Optional equipment", "value": "£1,200.00" },
                { "label": "VAT", "value": "£5,618.20" },
                { "label": "On the road fee", "value": "£1,450.00" },
                { "label": "OTR price", "value": "£63,253.20" },
            ]));
        }

        // Scrolling, history and other side-effect scripts.
        Ok(Value::Null)
    }

    async fn count(&self, selector: &str) -> BrowserResult<usize> {
        let state = self.state.lock().unwrap();
        match &state.page {
            PageState::Listing => {
                if selector == self.profile.card {
                    return Ok(self.units.len());
                }
                if let Some(order) = self.order_in_selector(selector) {
                    if !self.is_build_button(selector) {
                        return Ok(self.units.iter().filter(|u| u.order == order).count());
                    }
                }
                Ok(0)
            }
            PageState::Configurator { .. } => {
                let unit = self.unit_of(&state).unwrap();
                if selector == self.profile.line_tiles[0] {
                    return Ok(unit.lines.len());
                }
                if selector == self.profile.engine_tile
                    || selector == self.profile.engine_tile_name
                {
                    if !unit.modal_ui {
                        return Ok(self.engines_of(&state));
                    }
                    return Ok(0);
                }
                if selector == self.profile.modal_tile
                    || selector == self.profile.modal_tile_name
                {
                    if state.modal_open {
                        return Ok(self.engines_of(&state));
                    }
                    return Ok(0);
                }
                Ok(0)
            }
            PageState::Summary { .. } => {
                if selector == self.profile.accordion_toggle {
                    return Ok(1);
                }
                if selector == self.profile.spec_item {
                    return Ok(if state.accordion_expanded { 2 } else { 0 });
                }
                Ok(0)
            }
        }
    }

    async fn is_visible(&self, selector: &str, _index: usize) -> BrowserResult<bool> {
        let state = self.state.lock().unwrap();
        match &state.page {
            PageState::Listing => Ok(self.is_build_button(selector)
                && self.order_in_selector(selector).is_some_and(|order| {
                    self.units.iter().any(|u| u.order == order)
                })),
            PageState::Configurator { .. } => {
                let unit = self.unit_of(&state).unwrap();
                if selector == self.profile.line_tiles[0] {
                    return Ok(true);
                }
                if selector == self.profile.change_engine {
                    return Ok(unit.modal_ui);
                }
                if selector == self.profile.engine_modal {
                    return Ok(state.modal_open);
                }
                if selector == self.profile.engine_tile {
                    return Ok(!unit.modal_ui && self.engines_of(&state) > 0);
                }
                Ok(false)
            }
            PageState::Summary { .. } => Ok(false),
        }
    }

    async fn inner_text(&self, selector: &str, index: usize) -> BrowserResult<String> {
        let state = self.state.lock().unwrap();
        if let Some(unit) = self.unit_of(&state) {
            if selector == self.profile.line_tiles[0] {
                return unit
                    .lines
                    .get(index)
                    .map(|l| format!("{}\nFrom £2,500", l.label))
                    .ok_or_else(|| BrowserError::NotFound(selector.to_string()));
            }
            let engine_name = |i: usize| {
                state
                    .selected_line
                    .and_then(|l| unit.lines[l].engines.get(i))
                    .map(|e| e.name.to_string())
            };
            if selector == self.profile.engine_tile_name && !unit.modal_ui {
                return engine_name(index)
                    .ok_or_else(|| BrowserError::NotFound(selector.to_string()));
            }
            if selector == self.profile.modal_tile_name && state.modal_open {
                return engine_name(index)
                    .ok_or_else(|| BrowserError::NotFound(selector.to_string()));
            }
            if self.profile.selected_line.contains(&selector.to_string()) {
                return state
                    .selected_line
                    .map(|l| unit.lines[l].label.to_string())
                    .ok_or_else(|| BrowserError::NotFound(selector.to_string()));
            }
        }
        Err(BrowserError::NotFound(selector.to_string()))
    }

    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        let state = self.state.lock().unwrap();
        if selector == self.profile.line_tiles[0] && name == "class" {
            let selected = state.selected_line == Some(index);
            return Ok(Some(if selected {
                "con-line-tile is-selected".to_string()
            } else {
                "con-line-tile".to_string()
            }));
        }
        if selector == self.profile.accordion_toggle && name == "aria-expanded" {
            return Ok(Some(state.accordion_expanded.to_string()));
        }
        if selector == self.profile.summary_image[0] && name == "content" {
            if state.page != PageState::Listing {
                return Ok(Some("https://img.fake.test/vehicle.jpg".to_string()));
            }
        }
        Ok(None)
    }

    async fn click(&self, selector: &str, index: usize) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();

        if state.page == PageState::Listing {
            if self.is_build_button(selector) {
                if let Some(order) = self.order_in_selector(selector) {
                    if let Some(at) = self.units.iter().position(|u| u.order == order) {
                        state.page = PageState::Configurator { unit: at };
                        state.selected_line = None;
                        state.selected_engine = None;
                        return Ok(());
                    }
                }
                return Err(BrowserError::NotFound(selector.to_string()));
            }
            return Ok(());
        }

        if selector == self.profile.line_tiles[0] {
            let Some(unit) = self.unit_of(&state) else {
                return Err(BrowserError::NotFound(selector.to_string()));
            };
            if index >= unit.lines.len() {
                return Err(BrowserError::NotFound(selector.to_string()));
            }
            state.selected_line = Some(index);
            state.selected_engine = None;
            return Ok(());
        }
        if selector == self.profile.change_engine {
            state.modal_open = true;
            return Ok(());
        }
        if selector == self.profile.engine_modal_close {
            state.modal_open = false;
            return Ok(());
        }
        if selector == self.profile.engine_tile_name || selector == self.profile.engine_tile {
            if index < self.engines_of(&state) {
                state.selected_engine = Some(index);
                return Ok(());
            }
            return Err(BrowserError::NotFound(selector.to_string()));
        }
        if selector == self.profile.modal_tile {
            if state.modal_open && index < self.engines_of(&state) {
                state.selected_engine = Some(index);
                state.modal_open = false;
                return Ok(());
            }
            return Err(BrowserError::NotFound(selector.to_string()));
        }
        if selector == self.profile.accordion_toggle {
            state.accordion_expanded = true;
            return Ok(());
        }
        Ok(())
    }

    async fn click_js(&self, selector: &str, index: usize) -> BrowserResult<()> {
        self.click(selector, index).await
    }

    async fn focus(&self, _selector: &str, _index: usize) -> BrowserResult<()> {
        Ok(())
    }

    async fn press_key(&self, _key: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn mouse_click_at(&self, _point: Point) -> BrowserResult<()> {
        Ok(())
    }

    async fn scroll_into_view(&self, _selector: &str, _index: usize) -> BrowserResult<()> {
        Ok(())
    }

    async fn bounding_box(&self, _selector: &str, _index: usize) -> BrowserResult<Option<Rect>> {
        Ok(Some(Rect {
            x: 0.0,
            y: 0.0,
            width: 120.0,
            height: 48.0,
        }))
    }

    async fn back(&self) -> BrowserResult<()> {
        Ok(())
    }

    async fn reload(&self) -> BrowserResult<()> {
        Ok(())
    }
}
