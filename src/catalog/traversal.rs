//! Pass-1 traversal: model grid → trim line → engine variant.
//!
//! The harvester walks every grid unit, selects each trim line through a
//! prioritized chain of click strategies, then enumerates engine variants
//! through whichever of the two competing selection UIs the page happens
//! to render: the inline tile list or the chooser modal. Every captured
//! variant goes through the dedup context before becoming a record.
//!
//! Failures are contained at the smallest useful boundary: a line that
//! blows up is logged and skipped, a model that will not open is logged
//! and skipped, and the run always proceeds to the end of the work list.

use crate::browser::Tab;
use crate::catalog::codes;
use crate::catalog::identity::{Acceptance, DedupContext};
use crate::catalog::grid;
use crate::records::{BuildRecord, GridUnit};
use crate::site::{self, SiteProfile};
use crate::wait;
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Consecutive already-seen engine names tolerated in the chooser modal
/// before the rest of its tile list is treated as stale. Tunable policy,
/// not an invariant.
pub const DUP_STREAK_LIMIT: usize = 2;

/// Strict line selection gives up after this many click-strategy rounds.
pub const LINE_SELECT_ATTEMPTS: usize = 4;

/// Engine capture runs at most preferred → other → preferred once more.
pub const ENGINE_PATH_ATTEMPTS: usize = 3;

/// Pass-1 driver. Holds the tab, the site profile and the run-wide dedup
/// context; accumulates accepted records.
pub struct Harvester<'a> {
    tab: &'a dyn Tab,
    profile: &'a SiteProfile,
    dedup: &'a mut DedupContext,
    records: Vec<BuildRecord>,
}

impl<'a> Harvester<'a> {
    pub fn new(tab: &'a dyn Tab, profile: &'a SiteProfile, dedup: &'a mut DedupContext) -> Self {
        Self {
            tab,
            profile,
            dedup,
            records: Vec::new(),
        }
    }

    /// Walk the whole grid and return the accepted build records.
    pub async fn run(mut self) -> Result<Vec<BuildRecord>> {
        self.tab
            .navigate(&self.profile.listing_url, self.profile.nav_timeout_ms)
            .await
            .map_err(|e| anyhow::anyhow!("listing page did not load: {e}"))?;
        site::dismiss_cookie_banner(self.tab, self.profile).await;

        let units = grid::enumerate(self.tab, self.profile).await?;
        info!("grid: {} units to visit", units.len());

        let mut visited: HashSet<String> = HashSet::new();
        for unit in units {
            if !visited.insert(unit.identity_key()) {
                debug!("already visited {} {}", unit.model_name, unit.body_type);
                continue;
            }
            info!(
                "unit #{}: {} ({})",
                unit.order, unit.model_name, unit.body_type
            );
            if let Err(e) = self.process_unit(&unit).await {
                warn!(
                    "model {} failed: {e:#}; returning to grid",
                    unit.model_name
                );
            }
        }

        info!("pass 1 complete: {} build records", self.records.len());
        Ok(self.records)
    }

    /// One grid unit: open its configurator, then walk every trim line.
    async fn process_unit(&mut self, unit: &GridUnit) -> Result<()> {
        // Fresh grid for every unit; this doubles as recovery from
        // whatever state the previous unit left behind.
        self.tab
            .navigate(&self.profile.listing_url, self.profile.nav_timeout_ms)
            .await
            .map_err(|e| anyhow::anyhow!("grid reload failed: {e}"))?;
        site::dismiss_cookie_banner(self.tab, self.profile).await;

        self.open_configurator(unit).await?;

        let labels = self.enumerate_line_labels().await;
        if labels.is_empty() {
            bail!("no trim lines found");
        }
        info!("{}: {} trim lines", unit.model_name, labels.len());

        for label in labels {
            if let Err(e) = self.process_line(unit, &label).await {
                warn!("line '{label}' failed: {e:#}");
            }
            self.return_to_lines().await;
        }
        Ok(())
    }

    /// Open a unit's card and wait for the configurator to come up.
    async fn open_configurator(&mut self, unit: &GridUnit) -> Result<()> {
        let card_sel = self.profile.card_by_order(&unit.order.to_string());
        if self.tab.count(&card_sel).await.unwrap_or(0) == 0 {
            bail!("card {card_sel} not on grid");
        }
        // Some cards only reveal their build affordance once opened.
        let _ = self.tab.click(&card_sel, 0).await;

        let mut opened = false;
        for button in self.profile.build_buttons_in(&card_sel) {
            let appeared = wait::poll_until(
                self.profile.poll_interval,
                Duration::from_secs(3),
                || async { self.tab.is_visible(&button, 0).await.unwrap_or(false) },
            )
            .await;
            if appeared && self.tab.click(&button, 0).await.is_ok() {
                opened = true;
                break;
            }
        }
        if !opened {
            bail!("no build affordance on {card_sel}");
        }

        let ready = wait::poll_until(
            self.profile.poll_interval,
            self.profile.ready_budget,
            || async {
                for signal in &self.profile.configurator_ready {
                    if self.tab.is_visible(signal, 0).await.unwrap_or(false) {
                        return true;
                    }
                }
                self.tab
                    .current_url()
                    .await
                    .map(|u| u.contains("/configure/"))
                    .unwrap_or(false)
            },
        )
        .await;
        if !ready {
            bail!("configurator did not become ready");
        }
        Ok(())
    }

    /// Labels of all selectable trim lines, falling back to the single
    /// currently-selected line when the list is not rendered.
    async fn enumerate_line_labels(&self) -> Vec<String> {
        for selector in &self.profile.line_tiles {
            let n = self.tab.count(selector).await.unwrap_or(0);
            if n == 0 {
                continue;
            }
            let mut labels = Vec::new();
            for i in 0..n {
                if let Ok(text) = self.tab.inner_text(selector, i).await {
                    let label = first_line(&text);
                    if !label.is_empty() && !labels.contains(&label) {
                        labels.push(label);
                    }
                }
            }
            if !labels.is_empty() {
                return labels;
            }
        }

        for selector in &self.profile.selected_line {
            if let Ok(text) = self.tab.inner_text(selector, 0).await {
                let label = first_line(&text);
                if !label.is_empty() {
                    return vec![label];
                }
            }
        }
        Vec::new()
    }

    /// One trim line: select it, then capture every engine variant.
    async fn process_line(&mut self, unit: &GridUnit, label: &str) -> Result<()> {
        self.close_chooser().await;

        let Some((selector, index)) = self.locate_line_tile(label).await else {
            bail!("line tile not found");
        };

        if self.tile_is_disabled(&selector, index).await {
            info!("line '{label}' is disabled; skipping");
            return Ok(());
        }

        if !self.select_line(&selector, index).await {
            info!("line '{label}' never reached selected state; skipping");
            return Ok(());
        }
        self.handle_interstitial().await;

        let prefer_modal = self.modal_available().await;
        let mut seen_engines: HashSet<String> = HashSet::new();
        let mut captured = 0usize;
        for attempt in 0..ENGINE_PATH_ATTEMPTS {
            let use_modal = if attempt == 1 { !prefer_modal } else { prefer_modal };
            captured = if use_modal {
                self.modal_engines(unit, label, &mut seen_engines).await
            } else {
                self.classic_engines(unit, label, &mut seen_engines).await
            };
            if captured > 0 {
                break;
            }
            debug!(
                "engine path {} yielded nothing for '{label}' (attempt {})",
                if use_modal { "modal" } else { "classic" },
                attempt + 1
            );
        }
        if captured == 0 {
            warn!("no engine variants captured for line '{label}'");
        }
        Ok(())
    }

    /// Find the tile whose first text line matches the label, across all
    /// selector variants, case-insensitively.
    async fn locate_line_tile(&self, label: &str) -> Option<(String, usize)> {
        for selector in &self.profile.line_tiles {
            let n = self.tab.count(selector).await.unwrap_or(0);
            for i in 0..n {
                if let Ok(text) = self.tab.inner_text(selector, i).await {
                    if first_line(&text).eq_ignore_ascii_case(label) {
                        return Some((selector.clone(), i));
                    }
                }
            }
        }
        None
    }

    async fn tile_is_disabled(&self, selector: &str, index: usize) -> bool {
        if let Ok(Some(_)) = self.tab.attribute(selector, index, "disabled").await {
            return true;
        }
        if let Ok(Some(v)) = self.tab.attribute(selector, index, "aria-disabled").await {
            if v == "true" {
                return true;
            }
        }
        if let Ok(Some(class)) = self.tab.attribute(selector, index, "class").await {
            if class.split_whitespace().any(|t| t.contains("disabled")) {
                return true;
            }
        }
        false
    }

    async fn line_is_selected(&self, selector: &str, index: usize) -> bool {
        if let Ok(Some(class)) = self.tab.attribute(selector, index, "class").await {
            if class
                .split_whitespace()
                .any(|t| t == self.profile.selected_class_token)
            {
                return true;
            }
        }
        matches!(
            self.tab.attribute(selector, index, "aria-pressed").await,
            Ok(Some(v)) if v == "true"
        )
    }

    /// Strict selection: a bounded number of rounds through the click
    /// strategy chain, each followed by a settle and a selected-state
    /// check. Returns whether the tile confirmed selection.
    async fn select_line(&self, selector: &str, index: usize) -> bool {
        let deadline = Instant::now() + self.profile.select_budget;
        let hotspot = format!("{selector} {}", self.profile.line_hotspot);
        let tiles = self.tab.count(selector).await.unwrap_or(0);
        let hotspot_aligned = self.tab.count(&hotspot).await.unwrap_or(0) == tiles;

        for _ in 0..LINE_SELECT_ATTEMPTS {
            if Instant::now() >= deadline {
                break;
            }
            let _ = self.tab.scroll_into_view(selector, index).await;

            // Strategy chain: hotspot → plain → forced → keyboard.
            if hotspot_aligned {
                let _ = self.tab.click(&hotspot, index).await;
                if self.settle_and_check(selector, index).await {
                    return true;
                }
            }
            let _ = self.tab.click(selector, index).await;
            if self.settle_and_check(selector, index).await {
                return true;
            }
            let _ = self.tab.click_js(selector, index).await;
            if self.settle_and_check(selector, index).await {
                return true;
            }
            if self.tab.focus(selector, index).await.is_ok() {
                let _ = self.tab.press_key("Enter").await;
                if self.settle_and_check(selector, index).await {
                    return true;
                }
                let _ = self.tab.press_key(" ").await;
                if self.settle_and_check(selector, index).await {
                    return true;
                }
            }
        }
        false
    }

    async fn settle_and_check(&self, selector: &str, index: usize) -> bool {
        tokio::time::sleep(self.profile.settle).await;
        self.line_is_selected(selector, index).await
    }

    /// Optional "continue in current tab" dialog: click it if present, or
    /// just wait briefly for any expected next-state signal, whichever
    /// happens first.
    async fn handle_interstitial(&self) {
        for selector in &self.profile.interstitial_continue {
            if self.tab.is_visible(selector, 0).await.unwrap_or(false) {
                if self.tab.click(selector, 0).await.is_err() {
                    let _ = self.tab.click_js(selector, 0).await;
                }
                tokio::time::sleep(self.profile.settle).await;
                return;
            }
        }
        let _ = wait::poll_until(
            self.profile.poll_interval,
            self.profile.interstitial_budget,
            || async {
                self.tab
                    .is_visible(&self.profile.change_engine, 0)
                    .await
                    .unwrap_or(false)
                    || self.tab.count(&self.profile.engine_tile).await.unwrap_or(0) > 0
                    || self
                        .tab
                        .is_visible(&self.profile.engine_modal, 0)
                        .await
                        .unwrap_or(false)
            },
        )
        .await;
    }

    /// The modal chooser path is preferred when its opener is visible and
    /// not disabled.
    async fn modal_available(&self) -> bool {
        let opener = &self.profile.change_engine;
        if !self.tab.is_visible(opener, 0).await.unwrap_or(false) {
            return false;
        }
        !self.tile_is_disabled(opener, 0).await
    }

    /// Classic path: inline engine tiles identified by their product-name
    /// element. The list is re-counted every iteration because selecting a
    /// variant can re-render it; per-line seen names keep a reordered list
    /// from producing repeats.
    async fn classic_engines(
        &mut self,
        unit: &GridUnit,
        label: &str,
        seen: &mut HashSet<String>,
    ) -> usize {
        let name_sel = self.profile.engine_tile_name.clone();
        let mut captured = 0usize;
        let mut index = 0usize;
        loop {
            let n = self.tab.count(&name_sel).await.unwrap_or(0);
            if index >= n {
                break;
            }
            let i = index;
            index += 1;

            let Ok(text) = self.tab.inner_text(&name_sel, i).await else {
                continue;
            };
            let name = first_line(&text);
            if name.is_empty() || seen.contains(&name) {
                continue;
            }

            if self.tab.click(&name_sel, i).await.is_err() {
                let _ = self.tab.click_js(&name_sel, i).await;
            }
            self.handle_interstitial().await;
            tokio::time::sleep(self.profile.settle).await;

            if self.capture_variant(unit, label, &name).await.is_some() {
                captured += 1;
            }
            seen.insert(name);
        }
        captured
    }

    /// Modal path: open the chooser, debounce the tile count, then click
    /// tiles one by one with a topmost hit-test. The chooser closes on
    /// selection and is reopened for the next tile.
    async fn modal_engines(
        &mut self,
        unit: &GridUnit,
        label: &str,
        seen: &mut HashSet<String>,
    ) -> usize {
        if !self.open_chooser().await {
            return 0;
        }
        let tile_sel = self.profile.modal_tile.clone();
        let name_sel = self.profile.modal_tile_name.clone();

        let stable = wait::stable_count(
            self.profile.poll_interval,
            self.profile.modal_budget,
            || async { self.tab.count(&tile_sel).await.unwrap_or(0) },
        )
        .await;
        if stable == 0 {
            self.close_chooser().await;
            return 0;
        }
        debug!("engine chooser stabilized at {stable} tiles");

        let mut captured = 0usize;
        let mut dup_streak = 0usize;
        for i in 0..stable {
            if !self
                .tab
                .is_visible(&self.profile.engine_modal, 0)
                .await
                .unwrap_or(false)
                && !self.open_chooser().await
            {
                break;
            }

            let Ok(text) = self.tab.inner_text(&name_sel, i).await else {
                continue;
            };
            let name = first_line(&text);
            if name.is_empty() {
                continue;
            }
            if seen.contains(&name) {
                dup_streak += 1;
                if dup_streak >= DUP_STREAK_LIMIT {
                    debug!("{dup_streak} consecutive stale tiles; abandoning chooser list");
                    break;
                }
                continue;
            }
            dup_streak = 0;

            if !wait::click_when_topmost(
                self.tab,
                &tile_sel,
                i,
                self.profile.poll_interval,
                self.profile.modal_budget,
            )
            .await
            {
                warn!("engine tile '{name}' unclickable; resetting chooser");
                self.close_chooser().await;
                if !self.open_chooser().await {
                    break;
                }
                continue;
            }

            if self
                .tab
                .is_visible(&self.profile.engine_continue, 0)
                .await
                .unwrap_or(false)
            {
                let _ = self.tab.click(&self.profile.engine_continue, 0).await;
            }
            self.handle_interstitial().await;
            tokio::time::sleep(self.profile.settle).await;

            if self.capture_variant(unit, label, &name).await.is_some() {
                captured += 1;
            }
            seen.insert(name);
        }

        self.close_chooser().await;
        captured
    }

    async fn open_chooser(&self) -> bool {
        if self
            .tab
            .is_visible(&self.profile.engine_modal, 0)
            .await
            .unwrap_or(false)
        {
            return true;
        }
        if self.tab.click(&self.profile.change_engine, 0).await.is_err()
            && self.tab.click_js(&self.profile.change_engine, 0).await.is_err()
        {
            return false;
        }
        wait::poll_until(
            self.profile.poll_interval,
            self.profile.modal_budget,
            || async { self.tab.count(&self.profile.modal_tile).await.unwrap_or(0) > 0 },
        )
        .await
    }

    async fn close_chooser(&self) {
        if !self
            .tab
            .is_visible(&self.profile.engine_modal, 0)
            .await
            .unwrap_or(false)
        {
            return;
        }
        if self.tab.click(&self.profile.engine_modal_close, 0).await.is_err()
            && self
                .tab
                .click_js(&self.profile.engine_modal_close, 0)
                .await
                .is_err()
        {
            let _ = self.tab.press_key("Escape").await;
        }
        let _ = wait::poll_until(
            self.profile.poll_interval,
            self.profile.interstitial_budget,
            || async {
                !self
                    .tab
                    .is_visible(&self.profile.engine_modal, 0)
                    .await
                    .unwrap_or(false)
            },
        )
        .await;
    }

    /// Capture the identity of the currently selected variant and offer it
    /// to the dedup context. `Some(true)` appended a record, `Some(false)`
    /// was a duplicate, `None` means no identity could be mined at all.
    async fn capture_variant(
        &mut self,
        unit: &GridUnit,
        line_label: &str,
        engine_name: &str,
    ) -> Option<bool> {
        let candidates = self.mine_link_candidates().await;
        let current = self.tab.current_url().await.unwrap_or_default();

        let urls = codes::forge_urls(&candidates, &current, self.profile)
            .or_else(|| codes::forge_from_model_code(&candidates, self.profile));
        let Some(urls) = urls else {
            warn!("no configure/summary URL mineable for '{engine_name}'");
            return None;
        };
        let build_codes = codes::extract_codes(&urls);

        match self
            .dedup
            .try_accept(&build_codes.line, &urls.configure_url, &urls.summary_url)
        {
            Acceptance::Accepted => {
                let image_url =
                    site::read_first_image(self.tab, &self.profile.summary_image).await;
                info!(
                    "captured {} / {} / {} [{}]",
                    unit.model_name, line_label, engine_name, build_codes.line
                );
                self.records.push(BuildRecord {
                    car: unit.model_name.clone(),
                    body_type: unit.body_type.clone(),
                    model: line_label.to_string(),
                    engine: engine_name.to_string(),
                    series_code: build_codes.series,
                    line_code: build_codes.line,
                    model_code: build_codes.model,
                    image_url,
                    configure_url: urls.configure_url,
                    summary_url: urls.summary_url,
                });
                Some(true)
            }
            Acceptance::DuplicateLine(code) => {
                debug!("'{engine_name}': line code {code} already captured");
                Some(false)
            }
            Acceptance::DuplicateUrl(key) => {
                debug!("'{engine_name}': URL {key} already captured");
                Some(false)
            }
        }
    }

    /// Candidate build URLs from the page: configure/summary outbound
    /// links, the canonical link, and og:url metadata, in document order.
    async fn mine_link_candidates(&self) -> Vec<String> {
        let script = "(() => { \
             const urls = []; \
             const push = (u) => { if (u && !urls.includes(u)) urls.push(u); }; \
             document.querySelectorAll(\"a[href*='/configure/'], a[href*='/summary/']\") \
               .forEach(a => push(a.href)); \
             const canonical = document.querySelector(\"link[rel='canonical']\"); \
             if (canonical) push(canonical.href); \
             const og = document.querySelector(\"meta[property='og:url']\"); \
             if (og) push(og.getAttribute('content')); \
             return urls.slice(0, 50); })()";
        match self.tab.eval(script).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(e) => {
                debug!("link mining failed: {e}");
                Vec::new()
            }
        }
    }

    /// Get back to the trim-line list: back control, browser history,
    /// then reload-to-grid as last resort.
    async fn return_to_lines(&self) {
        if self.lines_visible().await {
            return;
        }
        for selector in &self.profile.back_to_lines {
            if self.tab.is_visible(selector, 0).await.unwrap_or(false) {
                let _ = self.tab.click(selector, 0).await;
                if self.wait_for_lines().await {
                    return;
                }
            }
        }
        let _ = self.tab.back().await;
        if self.wait_for_lines().await {
            return;
        }
        debug!("line list unreachable; reloading grid");
        let _ = self
            .tab
            .navigate(&self.profile.listing_url, self.profile.nav_timeout_ms)
            .await;
    }

    async fn lines_visible(&self) -> bool {
        for selector in &self.profile.line_tiles {
            if self.tab.count(selector).await.unwrap_or(0) > 0
                && self.tab.is_visible(selector, 0).await.unwrap_or(false)
            {
                return true;
            }
        }
        false
    }

    async fn wait_for_lines(&self) -> bool {
        wait::poll_until(
            self.profile.poll_interval,
            self.profile.interstitial_budget,
            || async { self.lines_visible().await },
        )
        .await
    }
}

/// First non-empty line of an element's text; tiles append pricing and
/// footnotes below the label.
pub fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line_skips_leading_blanks() {
        assert_eq!(first_line("\n\n  M Sport  \nFrom £3,000"), "M Sport");
        assert_eq!(first_line(""), "");
        assert_eq!(first_line("   \n \t "), "");
    }

    #[test]
    fn test_engine_path_attempt_order() {
        // preferred, other, preferred again, bounded at three rounds.
        let order: Vec<bool> = (0..ENGINE_PATH_ATTEMPTS)
            .map(|attempt| {
                let prefer_modal = true;
                if attempt == 1 {
                    !prefer_modal
                } else {
                    prefer_modal
                }
            })
            .collect();
        assert_eq!(order, vec![true, false, true]);
    }
}
