//! Page automation boundary consumed by the replay engine
//!
//! Only `launch` and `navigate` may fail fatally. Every other operation
//! reports its outcome as a value so the engine can branch on it.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Affordances more than this far above the bottom-most one are considered stale
pub const BOTTOM_BAND_PX: f64 = 220.0;

/// Upper bound on the delay used when a wait times out
pub const MAX_FALLBACK_DELAY: Duration = Duration::from_millis(1500);

/// A visible, interactable control discovered by its text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleAffordance {
    pub label: String,
    /// Vertical centre of the element in page pixels
    pub y: f64,
}

impl VisibleAffordance {
    pub fn new(label: impl Into<String>, y: f64) -> Self {
        Self {
            label: label.into(),
            y,
        }
    }
}

/// Outcome of a single UI interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Done,
    NotFound,
    Failed(String),
}

impl Interaction {
    pub fn is_done(&self) -> bool {
        matches!(self, Interaction::Done)
    }
}

/// Outcome of a best-effort wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    /// The condition never held; the caller slept `fallback` instead
    TimedOut { fallback: Duration },
}

/// Best-effort wait, bounded fallback.
///
/// Waits up to `timeout` for a condition. On expiry the wait is not an
/// error: the caller sleeps `fallback` and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestEffortWait {
    pub timeout: Duration,
    pub fallback: Duration,
}

impl BestEffortWait {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            fallback: timeout.min(MAX_FALLBACK_DELAY),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Outcome to report when the condition did not hold in time
    pub fn timed_out(&self) -> WaitOutcome {
        WaitOutcome::TimedOut {
            fallback: self.fallback,
        }
    }
}

/// Browser session operations required by the replay engine
#[async_trait]
pub trait PageAutomation: Send {
    /// Start the browser. Fatal on failure.
    async fn launch(&mut self) -> E2eResult<()>;

    /// Open a URL. Fatal on failure.
    async fn navigate(&mut self, url: &str) -> E2eResult<()>;

    async fn wait_network_idle(&mut self, wait: BestEffortWait) -> WaitOutcome;

    /// Wait for the "processing" indicator to disappear
    async fn wait_processing_done(&mut self, wait: BestEffortWait) -> WaitOutcome;

    /// Unconditional pause to let UI transitions finish
    async fn settle(&mut self, duration: Duration);

    /// Visible affordances in the bottom band, ordered top to bottom
    async fn list_visible_affordances(&mut self) -> Vec<VisibleAffordance>;

    async fn click_by_label(&mut self, label: &str, exact: bool) -> Interaction;

    /// Type into the chat input and submit it
    async fn type_and_submit(&mut self, text: &str) -> Interaction;

    /// Inner text of the last element matching `selector`
    async fn read_text(&mut self, selector: &str) -> Option<String>;

    async fn screenshot(&mut self, name: &str) -> Option<PathBuf>;

    async fn scroll_down(&mut self, pixels: u32);

    /// Release the browser. Safe to call more than once.
    async fn close(&mut self);
}

/// Keep the bottom-most cluster of affordances.
///
/// Duplicate labels collapse to their lowest position; anything more than
/// `band` pixels above the bottom-most affordance is dropped. The result is
/// sorted top to bottom.
pub fn bottom_cluster(items: Vec<VisibleAffordance>, band: f64) -> Vec<VisibleAffordance> {
    let mut best: Vec<VisibleAffordance> = Vec::new();
    for item in items {
        let label = item.label.trim();
        if label.is_empty() {
            continue;
        }
        match best.iter_mut().find(|b| b.label == label) {
            Some(existing) => existing.y = existing.y.max(item.y),
            None => best.push(VisibleAffordance::new(label, item.y)),
        }
    }

    best.sort_by(|a, b| a.y.total_cmp(&b.y));
    let max_y = match best.last() {
        Some(last) => last.y,
        None => return best,
    };
    best.retain(|a| max_y - a.y <= band);
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_cluster_drops_stale_choices() {
        let items = vec![
            VisibleAffordance::new("Get started", 100.0),
            VisibleAffordance::new("Live in it", 900.0),
            VisibleAffordance::new("Rent it out", 950.0),
            VisibleAffordance::new("Live in it", 300.0),
            VisibleAffordance::new("  ", 1000.0),
        ];
        let cluster = bottom_cluster(items, BOTTOM_BAND_PX);
        let labels: Vec<_> = cluster.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Live in it", "Rent it out"]);
        assert_eq!(cluster[0].y, 900.0);
    }

    #[test]
    fn test_bottom_cluster_empty() {
        assert!(bottom_cluster(Vec::new(), BOTTOM_BAND_PX).is_empty());
    }

    #[test]
    fn test_best_effort_fallback_is_bounded() {
        assert_eq!(
            BestEffortWait::from_millis(4000).fallback,
            Duration::from_millis(1500)
        );
        assert_eq!(
            BestEffortWait::from_millis(800).timed_out(),
            WaitOutcome::TimedOut {
                fallback: Duration::from_millis(800)
            }
        );
    }
}
