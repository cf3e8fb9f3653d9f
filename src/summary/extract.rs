//! Pass 2: summary page extraction.
//!
//! Visits each unique summary URL from the catalog, expands the lazily
//! loaded spec accordions, and reads the key/value items and the price
//! panel into an enriched record. Pass 2 never reuses Pass 1's tab or any
//! of its state beyond the written records.

use crate::browser::Tab;
use crate::catalog::codes;
use crate::catalog::identity::canonical_url_key;
use crate::records::{BuildRecord, SummaryRecord};
use crate::site::{self, SiteProfile};
use crate::summary::normalize::normalize_key;
use crate::summary::prices::PriceBreakdown;
use crate::wait;
use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything Pass 2 produces: the enriched rows plus the union of
/// normalized spec keys, which sizes the output schema.
#[derive(Debug, Default)]
pub struct SummaryOutcome {
    pub records: Vec<SummaryRecord>,
    pub spec_keys: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct RawSpecItem {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawPriceRow {
    #[serde(default)]
    label: String,
    #[serde(default)]
    value: String,
}

/// Enrich every unique summary URL. Builds are grouped by canonical URL
/// key; the first occurrence wins. Navigation failures skip the record and
/// the run continues.
pub async fn enrich_all(
    tab: &dyn Tab,
    profile: &SiteProfile,
    builds: &[BuildRecord],
) -> SummaryOutcome {
    let mut seen: HashSet<String> = HashSet::new();
    let mut outcome = SummaryOutcome::default();

    for build in builds {
        if build.summary_url.is_empty() {
            debug!("{} {}: no summary URL, skipping", build.car, build.engine);
            continue;
        }
        let key = canonical_url_key(&build.summary_url);
        if !seen.insert(key) {
            debug!("{}: grouped into an earlier record", build.summary_url);
            continue;
        }
        match enrich_one(tab, profile, build).await {
            Ok(record) => {
                outcome.spec_keys.extend(record.specs.keys().cloned());
                outcome.records.push(record);
            }
            Err(e) => warn!("summary {} failed: {e:#}", build.summary_url),
        }
    }

    info!(
        "pass 2 complete: {} records, {} distinct spec keys",
        outcome.records.len(),
        outcome.spec_keys.len()
    );
    outcome
}

async fn enrich_one(
    tab: &dyn Tab,
    profile: &SiteProfile,
    build: &BuildRecord,
) -> Result<SummaryRecord> {
    navigate_with_fallback(tab, profile, &build.summary_url).await?;
    site::dismiss_cookie_banner(tab, profile).await;
    trigger_lazy_sections(tab, profile).await;
    expand_accordions(tab, profile).await;

    // Give the spec values a beat to render after expansion.
    let _ = wait::poll_until(
        profile.poll_interval,
        Duration::from_secs(5),
        || async { tab.count(&profile.spec_item).await.unwrap_or(0) > 0 },
    )
    .await;
    tokio::time::sleep(profile.settle).await;

    let mut record = SummaryRecord::from_build(build);

    for item in read_spec_items(tab, profile).await {
        let Some(key) = normalize_key(&item.key) else {
            continue;
        };
        // First occurrence of a normalized key wins within one record.
        record
            .specs
            .entry(key)
            .or_insert_with(|| item.value.trim().to_string());
    }

    let rows: Vec<(String, String)> = read_price_rows(tab, profile)
        .await
        .into_iter()
        .map(|r| (r.label, r.value))
        .collect();
    record.prices = PriceBreakdown::from_rows(&rows).to_fields();

    backfill_identity(tab, profile, &mut record).await;
    Ok(record)
}

/// Navigate to the summary URL; when the primary host fails outright, try
/// once more on the alternate host before giving up on the record.
async fn navigate_with_fallback(tab: &dyn Tab, profile: &SiteProfile, url: &str) -> Result<()> {
    if tab.navigate(url, profile.nav_timeout_ms).await.is_ok() {
        return Ok(());
    }
    let Some(fallback) = swap_host(url, &profile.alternate_host) else {
        bail!("navigation failed and no alternate host applies");
    };
    warn!("primary navigation failed, retrying on {fallback}");
    match tab.navigate(&fallback, profile.nav_timeout_ms).await {
        Ok(()) => Ok(()),
        Err(e) => bail!("both hosts failed: {e}"),
    }
}

fn swap_host(raw: &str, host: &str) -> Option<String> {
    let mut url = url::Url::parse(raw).ok()?;
    if url.host_str() == Some(host) {
        return None;
    }
    url.set_host(Some(host)).ok()?;
    Some(url.to_string())
}

/// Scroll through the page to trigger lazily loaded sections.
async fn trigger_lazy_sections(tab: &dyn Tab, profile: &SiteProfile) {
    let _ = tab
        .eval("window.scrollTo(0, document.body.scrollHeight)")
        .await;
    tokio::time::sleep(profile.settle).await;
    let _ = tab.eval("window.scrollTo(0, 0)").await;
}

/// Expand every collapsed spec accordion.
async fn expand_accordions(tab: &dyn Tab, profile: &SiteProfile) {
    let n = tab.count(&profile.accordion_toggle).await.unwrap_or(0);
    for i in 0..n {
        let expanded = matches!(
            tab.attribute(&profile.accordion_toggle, i, "aria-expanded").await,
            Ok(Some(v)) if v == "true"
        );
        if expanded {
            continue;
        }
        if tab.click(&profile.accordion_toggle, i).await.is_err() {
            let _ = tab.click_js(&profile.accordion_toggle, i).await;
        }
        tokio::time::sleep(profile.poll_interval).await;
    }
}

async fn read_spec_items(tab: &dyn Tab, profile: &SiteProfile) -> Vec<RawSpecItem> {
    let item = serde_json::to_string(&profile.spec_item).unwrap_or_default();
    let key_attr = serde_json::to_string(&profile.spec_key_attr).unwrap_or_default();
    let value_sel = serde_json::to_string(&profile.spec_value).unwrap_or_default();
    let script = format!(
        "(() => Array.from(document.querySelectorAll({item})).map(el => {{ \
         const v = el.querySelector({value_sel}); \
         return {{ key: el.getAttribute({key_attr}) || '', \
                   value: (v ? v.innerText : el.innerText) || '' }}; }}))()"
    );
    match tab.eval(&script).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_default(),
        Err(e) => {
            debug!("spec item harvest failed: {e}");
            Vec::new()
        }
    }
}

async fn read_price_rows(tab: &dyn Tab, profile: &SiteProfile) -> Vec<RawPriceRow> {
    let row = serde_json::to_string(&profile.price_row).unwrap_or_default();
    let label_sel = serde_json::to_string(&profile.price_row_label).unwrap_or_default();
    let value_sel = serde_json::to_string(&profile.price_row_value).unwrap_or_default();
    let script = format!(
        "(() => Array.from(document.querySelectorAll({row})).map(el => {{ \
         const l = el.querySelector({label_sel}); \
         const v = el.querySelector({value_sel}); \
         return {{ label: (l ? l.innerText : '') || '', \
                   value: (v ? v.innerText : '') || '' }}; }}))()"
    );
    match tab.eval(&script).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_default(),
        Err(e) => {
            debug!("price row harvest failed: {e}");
            Vec::new()
        }
    }
}

/// Carry-forward rule: image URL and codes come from Pass 1 and are only
/// overwritten when empty and a better value is readable from the page.
async fn backfill_identity(tab: &dyn Tab, profile: &SiteProfile, record: &mut SummaryRecord) {
    if record.image_url.is_empty() {
        record.image_url = site::read_first_image(tab, &profile.summary_image).await;
    }

    if record.series_code.is_empty()
        || record.line_code.is_empty()
        || record.model_code.is_empty()
    {
        let current = tab.current_url().await.unwrap_or_default();
        let parsed = codes::parse_summary_codes(&current)
            .or_else(|| codes::parse_summary_codes(&record.summary_url));
        if let Some((series, line)) = parsed {
            if record.series_code.is_empty() {
                record.series_code = series;
            }
            if record.line_code.is_empty() {
                record.line_code = line;
            }
        }
        if record.model_code.is_empty() {
            if let Some(model) = codes::parse_model_code(&current)
                .or_else(|| codes::parse_model_code(&record.summary_url))
            {
                record.model_code = model;
            }
        }
    }
}
