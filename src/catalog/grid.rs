//! Grid enumerator: turns the model listing page into ordered `GridUnit`s.
//!
//! One script harvests every visible card (order attribute, full text, and
//! the text of each name/body selector candidate); the resolution
//! heuristics are pure functions over that harvest, so they are testable
//! without a live page.

use crate::browser::Tab;
use crate::records::GridUnit;
use crate::site::SiteProfile;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Fixed body-type vocabulary, most specific first. Keys are diacritic
/// folded and lowercase; values are the canonical labels.
const BODY_TYPES: &[(&str, &str)] = &[
    ("gran coupe", "Gran Coupé"),
    ("coupe", "Coupé"),
    ("suv", "SUV"),
    ("saloon", "Saloon"),
    ("touring", "Touring"),
    ("convertible", "Convertible"),
];

pub const UNKNOWN_BODY_TYPE: &str = "Unknown";

/// Raw harvest of one listing card.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCard {
    /// Value of the explicit order attribute, if present.
    pub order: Option<String>,
    /// Full visible text of the card.
    pub text: String,
    /// Text of each model-name selector candidate, in strategy order.
    pub names: Vec<Option<String>>,
    /// Text of each body-type selector candidate, in strategy order.
    pub bodies: Vec<Option<String>>,
}

fn harvest_script(profile: &SiteProfile) -> String {
    let card = serde_json::to_string(&profile.card).unwrap_or_default();
    let order_attr = serde_json::to_string(&profile.card_order_attr).unwrap_or_default();
    let names = serde_json::to_string(&profile.card_names).unwrap_or_default();
    let bodies = serde_json::to_string(&profile.card_bodies).unwrap_or_default();
    format!(
        "(() => {{ \
         const pick = (root, sel) => {{ const n = root.querySelector(sel); \
           return n ? n.innerText : null; }}; \
         return Array.from(document.querySelectorAll({card})).map(card => ({{ \
           order: card.getAttribute({order_attr}), \
           text: card.innerText || '', \
           names: {names}.map(sel => pick(card, sel)), \
           bodies: {bodies}.map(sel => pick(card, sel)), \
         }})); }})()"
    )
}

/// Enumerate the listing grid: one `GridUnit` per resolvable card, sorted
/// ascending by the explicit order attribute. Read-only.
pub async fn enumerate(tab: &dyn Tab, profile: &SiteProfile) -> Result<Vec<GridUnit>> {
    let value = tab
        .eval(&harvest_script(profile))
        .await
        .context("grid harvest script failed")?;
    let cards: Vec<RawCard> =
        serde_json::from_value(value).context("grid harvest returned unexpected shape")?;

    let mut units: Vec<GridUnit> = cards.iter().filter_map(resolve_unit).collect();
    units.sort_by_key(|u| u.order);
    debug!("grid: {} cards, {} resolvable units", cards.len(), units.len());
    Ok(units)
}

/// Resolve one raw card into a unit, or drop it.
///
/// Cards without a numeric order attribute or a resolvable model name are
/// skipped outright; a card with no recognizable body style is still kept,
/// labeled "Unknown".
pub fn resolve_unit(raw: &RawCard) -> Option<GridUnit> {
    let order: u32 = raw.order.as_deref()?.trim().parse().ok()?;
    let model_name = resolve_model_name(&raw.names, &raw.text)?;
    let body_type = resolve_body_type(&raw.bodies, &raw.text);
    Some(GridUnit {
        order,
        model_name,
        body_type,
    })
}

/// Lowercase and fold the accents the vocabulary cares about.
fn fold(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' => 'e',
            _ => c,
        })
        .collect()
}

/// Match `text` against the body-type vocabulary on word boundaries.
pub fn match_body_type(text: &str) -> Option<&'static str> {
    let folded = fold(text);
    for (key, label) in BODY_TYPES {
        let mut from = 0;
        while let Some(at) = folded[from..].find(key) {
            let start = from + at;
            let end = start + key.len();
            let before_ok = start == 0
                || !folded[..start]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_alphanumeric());
            let after_ok = end == folded.len()
                || !folded[end..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_alphanumeric());
            if before_ok && after_ok {
                return Some(label);
            }
            from = end;
        }
    }
    None
}

/// Body type: first selector candidate that resolves through the
/// vocabulary, then the card's full text, then "Unknown".
pub fn resolve_body_type(candidates: &[Option<String>], full_text: &str) -> String {
    for candidate in candidates.iter().flatten() {
        if let Some(label) = match_body_type(candidate) {
            return label.to_string();
        }
    }
    match_body_type(full_text)
        .unwrap_or(UNKNOWN_BODY_TYPE)
        .to_string()
}

/// True for lines that name the card's price, not its model.
fn is_price_line(line: &str) -> bool {
    let folded = fold(line);
    folded.starts_with("from") && line.contains('£')
}

/// Model name: first non-empty selector candidate, else the first line of
/// the card's text that is not a body-type word, a "From £…" price line,
/// or the literal word "Electric".
pub fn resolve_model_name(candidates: &[Option<String>], full_text: &str) -> Option<String> {
    for candidate in candidates.iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    full_text
        .lines()
        .map(str::trim)
        .find(|&line| {
            !line.is_empty()
                && !line.eq_ignore_ascii_case("electric")
                && !is_price_line(line)
                && match_body_type(line)
                    .map(|label| fold(label) != fold(line))
                    .unwrap_or(true)
        })
        .map(|line| line.to_string())
}
