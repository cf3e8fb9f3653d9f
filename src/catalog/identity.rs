//! Build identity and run-wide deduplication.
//!
//! One `DedupContext` is created per run and threaded by reference through
//! the traversal; its two sets only ever grow. A build reachable through
//! several navigation paths is therefore captured exactly once per run.

use std::collections::HashSet;
use url::Url;

/// Outcome of offering a candidate build to the dedup context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    /// The line code was already captured earlier in the run.
    DuplicateLine(String),
    /// The canonical URL key was already captured earlier in the run.
    DuplicateUrl(String),
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Run-wide identity sets: seen line codes and seen canonical URL keys.
#[derive(Debug, Default)]
pub struct DedupContext {
    line_codes: HashSet<String>,
    url_keys: HashSet<String>,
}

impl DedupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate. The line code is checked first (when non-empty),
    /// then the canonical URL key of the configure URL (falling back to the
    /// summary URL). Both sets are updated only on acceptance, so the check
    /// is insert-or-reject from the caller's perspective.
    pub fn try_accept(
        &mut self,
        line_code: &str,
        configure_url: &str,
        summary_url: &str,
    ) -> Acceptance {
        if !line_code.is_empty() && self.line_codes.contains(line_code) {
            return Acceptance::DuplicateLine(line_code.to_string());
        }

        let primary = if configure_url.is_empty() {
            summary_url
        } else {
            configure_url
        };
        let key = canonical_url_key(primary);
        if !key.is_empty() && self.url_keys.contains(&key) {
            return Acceptance::DuplicateUrl(key);
        }

        if !line_code.is_empty() {
            self.line_codes.insert(line_code.to_string());
        }
        if !key.is_empty() {
            self.url_keys.insert(key);
        }
        Acceptance::Accepted
    }

    pub fn len(&self) -> usize {
        self.url_keys.len().max(self.line_codes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.line_codes.is_empty() && self.url_keys.is_empty()
    }
}

/// Canonical identity key of a URL: scheme + lowercased host + path with
/// any trailing slash trimmed. Query string and fragment are ignored.
pub fn canonical_url_key(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default().to_lowercase();
            let path = url.path().trim_end_matches('/');
            format!("{}://{}{}", url.scheme(), host, path)
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or(raw)
            .trim_end_matches('/')
            .to_string(),
    }
}
