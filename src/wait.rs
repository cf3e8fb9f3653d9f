//! Readiness and retry primitives.
//!
//! Every wait in the traversal and extraction engines goes through these
//! three helpers instead of ad hoc sleep loops. They absorb the transient
//! automation errors ("not found", "not yet visible") internally and report
//! only success or failure; raw browser errors never propagate past here.

use crate::browser::{Point, Tab};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Repeatedly evaluate `probe` every `interval` until it returns true or
/// `budget` elapses. Never throws; a timeout is just `false`.
pub async fn poll_until<F, Fut>(interval: Duration, budget: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + budget;
    loop {
        if probe().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Sample `sample` every `interval` until two consecutive samples are equal
/// and non-zero, or `budget` elapses. Returns the last observed count.
///
/// Used to debounce the engine chooser modal, whose tile list renders
/// incrementally: a single early read would undercount it.
pub async fn stable_count<F, Fut>(interval: Duration, budget: Duration, mut sample: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = usize>,
{
    let deadline = Instant::now() + budget;
    let mut previous = sample().await;
    loop {
        if Instant::now() >= deadline {
            return previous;
        }
        tokio::time::sleep(interval).await;
        let current = sample().await;
        if current == previous && current > 0 {
            return current;
        }
        previous = current;
    }
}

/// Script asking whether the nth selector match is the topmost element at
/// its own visual center (or an ancestor/descendant of it).
fn topmost_script(selector: &str, index: usize) -> String {
    let sel = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{ const els = document.querySelectorAll({sel}); \
         const el = els[{index}]; if (!el) return false; \
         const r = el.getBoundingClientRect(); \
         if (r.width === 0 || r.height === 0) return false; \
         const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2); \
         return top === el || el.contains(top) || (top !== null && top.contains(el)); }})()"
    )
}

/// Click an element that may be occluded by animating overlays.
///
/// Hit-tests the element's center against the actual topmost element there
/// and only issues a trusted click once they match. If the element never
/// surfaces within `budget`, falls back to a synthetic pointer press and
/// release at the same coordinates. Returns whether anything was clicked.
pub async fn click_when_topmost(
    tab: &dyn Tab,
    selector: &str,
    index: usize,
    interval: Duration,
    budget: Duration,
) -> bool {
    let script = topmost_script(selector, index);
    let surfaced = poll_until(interval, budget, || async {
        let _ = tab.scroll_into_view(selector, index).await;
        tab.eval(&script)
            .await
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or(false)
    })
    .await;

    if surfaced {
        match tab.click(selector, index).await {
            Ok(()) => return true,
            Err(e) => debug!("topmost click on {selector}[{index}] failed: {e}"),
        }
    }

    // Occluded or the trusted click raced an overlay: raw pointer at center.
    if let Ok(Some(rect)) = tab.bounding_box(selector, index).await {
        let Point { x, y } = rect.center();
        if tab.mouse_click_at(Point { x, y }).await.is_ok() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_poll_until_succeeds_before_budget() {
        let calls = AtomicUsize::new(0);
        let ok = poll_until(
            Duration::from_millis(1),
            Duration::from_millis(200),
            || async { calls.fetch_add(1, Ordering::SeqCst) >= 2 },
        )
        .await;
        assert!(ok);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let ok = poll_until(
            Duration::from_millis(1),
            Duration::from_millis(10),
            || async { false },
        )
        .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_stable_count_waits_for_two_equal_samples() {
        let calls = AtomicUsize::new(0);
        // Samples: 1, 2, 3, 4, 4 -> stable at 4.
        let count = stable_count(
            Duration::from_millis(1),
            Duration::from_millis(500),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                n.min(3) + 1
            },
        )
        .await;
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_stable_count_zero_is_not_stable() {
        // Always zero: runs out the budget and reports zero.
        let count = stable_count(
            Duration::from_millis(1),
            Duration::from_millis(10),
            || async { 0 },
        )
        .await;
        assert_eq!(count, 0);
    }

    #[test]
    fn test_topmost_script_mentions_hit_test() {
        let script = topmost_script(".engine-tile", 3);
        assert!(script.contains("elementFromPoint"));
        assert!(script.contains("els[3]"));
    }
}
