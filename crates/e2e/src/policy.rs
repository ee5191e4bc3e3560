//! Decision policy for transcript replay
//!
//! Each tick the engine shows the policy the labels currently visible and
//! the policy picks exactly one rule, in fixed priority order:
//!
//! ```text
//!   P  progress button         ("Continue", "Next", primary CTA, ...)
//!   A  term-end question       (once; needs >= 2 term-end labels visible)
//!   B  occupancy question      (once; needs >= 1 occupancy label visible)
//!   C  terminal choice         ("Check here"; not gated, may repeat)
//!   D  transcript click        (queued click whose label is visible)
//!   E  transcript free text    (earliest queued free text)
//! ```
//!
//! When nothing applies the engine falls back to scrolling (rule F).

use std::collections::{BTreeMap, BTreeSet};

use compare_qa_common::ContextTurn;
use serde::{Deserialize, Serialize};

use crate::actions::{ActionQueue, PendingAction};

/// Generic "move forward" labels, in preference order
pub const PROGRESS_LABELS: &[&str] = &[
    "Compare live mortgage deals",
    "Get an expert recommendation",
    "Continue",
    "Next",
    "Compare deals",
    "Start comparison",
    "Proceed",
    "OK",
];

/// Main call to action, preferred over any other progress label when visible
pub const PRIMARY_CTA: &str = "Compare live mortgage deals";

/// Product results entry point
pub const TERMINAL_LABEL: &str = "Check here";

/// Consent banners dismissed once after opening the app
pub const CONSENT_LABELS: &[&str] = &["Accept all cookies", "Accept", "I agree", "Got it", "Close"];

const TERM_END_LABELS: &[&str] = &[
    "6+ months away",
    "3-6 months away",
    "Less than 3 months",
    "It's already ended",
];

const OCCUPANCY_LABELS: &[&str] = &["Live in it", "Rent it out"];

/// A question the application asks once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TermEnd,
    Occupancy,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::TermEnd, Category::Occupancy];

    pub fn key(&self) -> &'static str {
        match self {
            Category::TermEnd => "term_end",
            Category::Occupancy => "occupancy",
        }
    }

    /// Closed set of answer labels for this question
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            Category::TermEnd => TERM_END_LABELS,
            Category::Occupancy => OCCUPANCY_LABELS,
        }
    }

    /// Answer used when the transcript expresses no preference
    pub fn default_choice(&self) -> &'static str {
        match self {
            Category::TermEnd => "3-6 months away",
            Category::Occupancy => "Live in it",
        }
    }

    /// How many vocabulary labels must be visible for the question to count as asked
    pub fn min_visible(&self) -> usize {
        match self {
            Category::TermEnd => 2,
            Category::Occupancy => 1,
        }
    }

    /// Preference expressed by one lowercase transcript turn, if any
    fn preference_in(&self, text: &str) -> Option<&'static str> {
        match self {
            Category::Occupancy => {
                if text.contains("live in it") {
                    Some("Live in it")
                } else if text.contains("rent it out") {
                    Some("Rent it out")
                } else {
                    None
                }
            }
            Category::TermEnd => {
                if text.contains("6+ months") {
                    Some("6+ months away")
                } else if ["3-6 months", "3 – 6 months", "3–6 months"]
                    .iter()
                    .any(|p| text.contains(p))
                {
                    Some("3-6 months away")
                } else if text.contains("less than 3 months") {
                    Some("Less than 3 months")
                } else if text.contains("already ended") {
                    Some("It's already ended")
                } else {
                    None
                }
            }
        }
    }

    /// Number of distinct vocabulary labels present in `visible`
    fn visible_count<S: AsRef<str>>(&self, visible: &[S]) -> usize {
        self.vocabulary()
            .iter()
            .filter(|v| visible.iter().any(|l| l.as_ref().trim().eq_ignore_ascii_case(v)))
            .count()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Preferred answer per category, inferred once from the whole transcript.
/// A later turn overrides an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChoicePreferences {
    preferred: BTreeMap<Category, String>,
}

impl ChoicePreferences {
    pub fn from_context(context: &[ContextTurn]) -> Self {
        let mut preferred = BTreeMap::new();
        for turn in context {
            let text = turn.text.to_lowercase();
            for category in Category::ALL {
                if let Some(choice) = category.preference_in(&text) {
                    preferred.insert(category, choice.to_string());
                }
            }
        }
        Self { preferred }
    }

    pub fn get(&self, category: Category) -> Option<&str> {
        self.preferred.get(&category).map(String::as_str)
    }

    /// Preferred answer, or the category default
    pub fn choice_for(&self, category: Category) -> &str {
        self.get(category).unwrap_or(category.default_choice())
    }
}

/// Categories already answered this session. Flags only ever go false -> true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnsweredFlags {
    answered: BTreeSet<Category>,
}

impl AnsweredFlags {
    pub fn is_answered(&self, category: Category) -> bool {
        self.answered.contains(&category)
    }

    /// Mark answered; returns false if it already was
    pub fn mark(&mut self, category: Category) -> bool {
        self.answered.insert(category)
    }
}

/// The single action chosen for a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Rule P
    Progress { label: String },
    /// Rules A and B
    Answer { category: Category, choice: String },
    /// Rule C
    Terminal,
    /// Rule D; `index` is the queue position of the click
    TranscriptChoice { index: usize, label: String },
    /// Rule E; `index` is the queue position of the free text
    FreeText { index: usize, text: String },
}

impl Decision {
    pub fn rule(&self) -> char {
        match self {
            Decision::Progress { .. } => 'P',
            Decision::Answer {
                category: Category::TermEnd,
                ..
            } => 'A',
            Decision::Answer {
                category: Category::Occupancy,
                ..
            } => 'B',
            Decision::Terminal => 'C',
            Decision::TranscriptChoice { .. } => 'D',
            Decision::FreeText { .. } => 'E',
        }
    }
}

/// Mutable replay state owned by one engine instance
#[derive(Debug, Clone)]
pub struct ReplayState {
    pub queue: ActionQueue,
    pub preferences: ChoicePreferences,
    pub answered: AnsweredFlags,
}

impl ReplayState {
    pub fn new(queue: ActionQueue, preferences: ChoicePreferences) -> Self {
        Self {
            queue,
            preferences,
            answered: AnsweredFlags::default(),
        }
    }

    /// Pick the first applicable rule for the visible labels. Pure: nothing
    /// is consumed until [`ReplayState::commit`].
    pub fn decide<S: AsRef<str>>(&self, visible: &[S]) -> Option<Decision> {
        if let Some(label) = progress_label(visible) {
            return Some(Decision::Progress { label });
        }

        for category in Category::ALL {
            if !self.answered.is_answered(category)
                && category.visible_count(visible) >= category.min_visible()
            {
                return Some(Decision::Answer {
                    category,
                    choice: self.preferences.choice_for(category).to_string(),
                });
            }
        }

        if visible.iter().any(|l| contains_phrase(l.as_ref(), TERMINAL_LABEL)) {
            return Some(Decision::Terminal);
        }

        if let Some(index) = self.queue.find_matching_click(visible) {
            if let Some(PendingAction::Click { label }) = self.queue.get(index) {
                return Some(Decision::TranscriptChoice {
                    index,
                    label: label.clone(),
                });
            }
        }

        if let Some(index) = self.queue.find_next_free_text() {
            if let Some(PendingAction::FreeText { text }) = self.queue.get(index) {
                return Some(Decision::FreeText {
                    index,
                    text: text.clone(),
                });
            }
        }

        None
    }

    /// Apply the bookkeeping of an executed decision
    pub fn commit(&mut self, decision: &Decision) {
        match decision {
            Decision::Answer { category, .. } => {
                self.answered.mark(*category);
            }
            Decision::TranscriptChoice { index, .. } | Decision::FreeText { index, .. } => {
                self.queue.remove(*index);
            }
            Decision::Progress { .. } | Decision::Terminal => {}
        }
    }
}

/// Rule P: first progress label visible, upgraded to the primary CTA when that is visible too
fn progress_label<S: AsRef<str>>(visible: &[S]) -> Option<String> {
    let shown = |needle: &str| visible.iter().any(|l| contains_phrase(l.as_ref(), needle));
    let first = PROGRESS_LABELS.iter().find(|p| shown(p))?;
    if shown(PRIMARY_CTA) {
        Some(PRIMARY_CTA.to_string())
    } else {
        Some(first.to_string())
    }
}

/// Case-insensitive whole-word containment, so "OK" does not match "Book a call"
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric();

    haystack.match_indices(&needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use compare_qa_common::{Role, TranscriptRow};
    use test_case::test_case;

    fn state(actions: Vec<PendingAction>) -> ReplayState {
        ReplayState::new(ActionQueue::new(actions), ChoicePreferences::default())
    }

    #[test_case("Continue", "Continue", true)]
    #[test_case("Book a call", "OK", false)]
    #[test_case("OK, got it", "OK", true)]
    #[test_case("Next steps", "next", true)]
    #[test_case("Check here for deals", "Check here", true)]
    fn test_contains_phrase(haystack: &str, needle: &str, expected: bool) {
        assert_eq!(contains_phrase(haystack, needle), expected);
    }

    #[test]
    fn test_preferences_last_turn_wins() {
        let context: Vec<ContextTurn> = [
            ("Anant", "I'd live in it"),
            ("Compare", "When does your deal end?"),
            ("Anant", "maybe 6+ months"),
            ("Anant", "actually I will rent it out, 3–6 months"),
        ]
        .iter()
        .map(|(s, m)| ContextTurn::from(&TranscriptRow::new(*s, *m)))
        .collect();
        assert_eq!(context[1].role, Role::Assistant);

        let prefs = ChoicePreferences::from_context(&context);
        assert_eq!(prefs.get(Category::Occupancy), Some("Rent it out"));
        assert_eq!(prefs.get(Category::TermEnd), Some("3-6 months away"));
    }

    #[test]
    fn test_defaults_without_preference() {
        let prefs = ChoicePreferences::default();
        assert_eq!(prefs.choice_for(Category::TermEnd), "3-6 months away");
        assert_eq!(prefs.choice_for(Category::Occupancy), "Live in it");
    }

    #[test]
    fn test_progress_prefers_primary_cta() {
        let s = state(vec![]);
        let decision = s.decide(&["Continue", "Compare live mortgage deals"]).unwrap();
        assert_eq!(
            decision,
            Decision::Progress {
                label: PRIMARY_CTA.to_string()
            }
        );
        assert_eq!(
            s.decide(&["Next"]).unwrap(),
            Decision::Progress { label: "Next".into() }
        );
    }

    #[test]
    fn test_term_end_needs_two_labels() {
        let mut s = state(vec![]);
        assert_eq!(s.decide(&["6+ months away"]), None);

        let visible = ["6+ months away", "3-6 months away"];
        let decision = s.decide(&visible).unwrap();
        assert_eq!(decision.rule(), 'A');
        s.commit(&decision);
        assert!(s.answered.is_answered(Category::TermEnd));
        assert_eq!(s.decide(&visible), None);
    }

    #[test]
    fn test_terminal_choice_repeats() {
        let mut s = state(vec![]);
        let decision = s.decide(&["Check here"]).unwrap();
        s.commit(&decision);
        assert_eq!(s.decide(&["Check here"]), Some(Decision::Terminal));
    }

    #[test]
    fn test_transcript_click_before_free_text() {
        let mut s = state(vec![
            PendingAction::FreeText { text: "hello".into() },
            PendingAction::Click { label: "Yes please".into() },
        ]);
        let decision = s.decide(&["Yes please", "No thanks"]).unwrap();
        assert_eq!(
            decision,
            Decision::TranscriptChoice {
                index: 1,
                label: "Yes please".into()
            }
        );
        s.commit(&decision);

        let decision = s.decide::<&str>(&[]).unwrap();
        assert_eq!(decision.rule(), 'E');
        s.commit(&decision);
        assert!(s.queue.is_empty());
        assert_eq!(s.decide::<&str>(&[]), None);
    }

    #[test]
    fn test_unmatched_click_is_skipped() {
        let s = state(vec![PendingAction::Click { label: "Rent it out".into() }]);
        assert_eq!(s.decide(&["Something else"]), None);
    }
}
