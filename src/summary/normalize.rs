//! Spec-sheet key normalization.
//!
//! Raw keys arrive as DOM tokens ("td-battery-size-value", "Battery_Size
//! Value", ...). A small synonym table catches the known irregular ones;
//! everything else goes through the generic rule: collapse separators,
//! strip the "td" prefix and "value" suffix tokens, title-case.

/// Known irregular tokens, keyed on the collapsed (and stripped) form.
const SYNONYMS: &[(&str, &str)] = &[
    ("battery size", "Battery Capacity"),
    ("battery size net", "Battery Capacity"),
    ("bhp", "Power (bhp)"),
    ("co2", "CO2 Emissions"),
];

/// Collapse a raw key to its lookup token: lowercase, separators
/// (underscore, hyphen, any whitespace run) to single spaces.
fn collapse(raw: &str) -> String {
    let mut token = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.trim().chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            pending_space = !token.is_empty();
        } else {
            if pending_space {
                token.push(' ');
                pending_space = false;
            }
            token.extend(c.to_lowercase());
        }
    }
    token
}

/// Strip the literal leading "td" token and trailing "value" token.
fn strip_wrappers(token: &str) -> String {
    let mut words: Vec<&str> = token.split(' ').filter(|w| !w.is_empty()).collect();
    if words.first() == Some(&"td") {
        words.remove(0);
    }
    if words.last() == Some(&"value") {
        words.pop();
    }
    words.join(" ")
}

fn title_case(token: &str) -> String {
    token
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn synonym(token: &str) -> Option<&'static str> {
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == token)
        .map(|(_, label)| *label)
}

/// Normalize a raw spec key to its column label. Empty keys yield `None`.
pub fn normalize_key(raw: &str) -> Option<String> {
    let token = collapse(raw);
    if token.is_empty() {
        return None;
    }
    let core = strip_wrappers(&token);
    if let Some(label) = synonym(&token).or_else(|| synonym(&core)) {
        return Some(label.to_string());
    }
    let label = title_case(&core);
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}
