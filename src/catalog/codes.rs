//! Series/Line/Model code extraction and URL forging.
//!
//! Build identity lives in two URL flavors of the same configuration:
//! `.../configure/{series}/{line}/...` for continued editing and
//! `.../summary/{series}/{line}/.../{model}` for the priced spec sheet.
//! Either flavor can be mined from a page; the other is forged from it.

use crate::site::SiteProfile;
use regex::Regex;
use url::Url;

/// The two URL flavors of one build identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUrls {
    pub configure_url: String,
    pub summary_url: String,
}

/// Codes parsed out of the build URLs. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildCodes {
    pub series: String,
    pub line: String,
    pub model: String,
}

/// `SE000001`-shaped model code: two uppercase letters, six digits.
fn is_model_code(segment: &str) -> bool {
    Regex::new(r"^[A-Z]{2}[0-9]{6}$")
        .map(|re| re.is_match(segment))
        .unwrap_or(false)
}

fn path_segments(raw: &str) -> Vec<String> {
    match Url::parse(raw) {
        Ok(url) => url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or(raw)
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Series and line codes from a configure-flavor URL:
/// the two path segments following "configure".
pub fn parse_configure_codes(raw: &str) -> Option<(String, String)> {
    codes_after(raw, "configure")
}

/// Series and line codes from a summary-flavor URL.
pub fn parse_summary_codes(raw: &str) -> Option<(String, String)> {
    codes_after(raw, "summary")
}

fn codes_after(raw: &str, marker: &str) -> Option<(String, String)> {
    let segments = path_segments(raw);
    let at = segments.iter().position(|s| s == marker)?;
    let series = segments.get(at + 1)?.clone();
    let line = segments.get(at + 2)?.clone();
    Some((series, line))
}

/// Model code from a summary URL: the last path segment, if it matches the
/// two-letters-six-digits pattern.
pub fn parse_model_code(raw: &str) -> Option<String> {
    let segments = path_segments(raw);
    let last = segments.last()?;
    is_model_code(last).then(|| last.clone())
}

/// Best-effort secondary guess: scan the configure URL's segments after the
/// line code for an all-caps-and-digits token of length 3-6.
pub fn guess_model_code(configure_url: &str) -> Option<String> {
    let segments = path_segments(configure_url);
    let at = segments.iter().position(|s| s == "configure")?;
    let token = Regex::new(r"^[A-Z0-9]{3,6}$").ok()?;
    segments
        .iter()
        .skip(at + 3)
        .find(|s| {
            token.is_match(s)
                && s.chars().any(|c| c.is_ascii_uppercase())
                && s.chars().any(|c| c.is_ascii_digit())
        })
        .cloned()
}

/// Loose model-code mining anywhere in a URL or path fragment.
pub fn mine_model_code(raw: &str) -> Option<String> {
    let re = Regex::new(r"[A-Z]{2}[0-9]{6}").ok()?;
    re.find(raw).map(|m| m.as_str().to_string())
}

/// Forge the canonical URL pair from whatever the page exposed.
///
/// `candidates` are the configure/summary-looking URLs mined from the
/// page's outbound links, canonical link and og:url metadata, in document
/// order; `current_url` is the tab's own navigation URL. The first usable
/// source wins: its path is re-homed onto the configure host, normalized to
/// the configure flavor, and the summary flavor is derived by substituting
/// the "/configure/" path segment exactly once. With no usable source at
/// all, a model code is mined loosely and the profile's summary template
/// fills the gap.
pub fn forge_urls(
    candidates: &[String],
    current_url: &str,
    profile: &SiteProfile,
) -> Option<BuildUrls> {
    let source = candidates
        .iter()
        .find(|u| u.contains("/configure/") || u.contains("/summary/"))
        .map(|s| s.as_str())
        .or_else(|| current_url.contains("/configure/").then_some(current_url))?;

    let path = match Url::parse(source) {
        Ok(url) => url.path().to_string(),
        Err(_) => return None,
    };
    let configure_path = if path.contains("/summary/") {
        path.replacen("/summary/", "/configure/", 1)
    } else {
        path
    };
    let configure_url = format!("https://{}{}", profile.configure_host, configure_path);
    let summary_url = configure_url.replacen("/configure/", "/summary/", 1);
    Some(BuildUrls {
        configure_url,
        summary_url,
    })
}

/// Last-resort URL pair: mine a model code from any loosely matched path
/// fragment among the candidates and synthesize a summary URL from the
/// profile template. The configure flavor stays empty.
pub fn forge_from_model_code(candidates: &[String], profile: &SiteProfile) -> Option<BuildUrls> {
    let model = candidates.iter().find_map(|u| mine_model_code(u))?;
    Some(BuildUrls {
        configure_url: String::new(),
        summary_url: profile.summary_template.replace("{model}", &model),
    })
}

/// Extract all three codes for a forged URL pair.
pub fn extract_codes(urls: &BuildUrls) -> BuildCodes {
    let (series, line) = parse_configure_codes(&urls.configure_url)
        .or_else(|| parse_summary_codes(&urls.summary_url))
        .unwrap_or_default();
    let model = parse_model_code(&urls.summary_url)
        .or_else(|| guess_model_code(&urls.configure_url))
        .unwrap_or_default();
    BuildCodes {
        series,
        line,
        model,
    }
}
