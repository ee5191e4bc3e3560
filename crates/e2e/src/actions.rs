//! Compiling recorded utterances into pending UI actions

use compare_qa_common::{ContextTurn, TranscriptRow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Phrases in a human turn that map onto a known UI choice
const DEFAULT_CLICK_PATTERNS: &[(&str, &str)] = &[
    (r"\bLive\s+in\s+it\b", "Live in it"),
    (r"\bRent\s+it\s+out\b", "Rent it out"),
    (r"\b6\+\s*months\b", "6+ months away"),
    (r"\b3\s*-\s*6\s*months\b", "3-6 months away"),
    (r"\bless\s+than\s+3\s+months\b", "Less than 3 months"),
    (r"\balready\s+ended\b", "It's already ended"),
    (r"\bCheck\s+here\b", "Check here"),
];

/// A UI action derived from a human transcript turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PendingAction {
    /// Choose a visible option by its canonical label
    Click { label: String },
    /// Type the message into the chat box
    FreeText { text: String },
}

/// Ordered actions awaiting replay. Each action is taken at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionQueue {
    actions: Vec<PendingAction>,
}

impl ActionQueue {
    pub fn new(actions: Vec<PendingAction>) -> Self {
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PendingAction> {
        self.actions.get(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<PendingAction> {
        (index < self.actions.len()).then(|| self.actions.remove(index))
    }

    /// Position of the earliest click whose label appears inside any visible label
    pub fn find_matching_click<S: AsRef<str>>(&self, visible: &[S]) -> Option<usize> {
        self.actions.iter().position(|action| match action {
            PendingAction::Click { label } => {
                let needle = label.to_lowercase();
                visible
                    .iter()
                    .any(|v| v.as_ref().to_lowercase().contains(&needle))
            }
            PendingAction::FreeText { .. } => false,
        })
    }

    /// Position of the earliest free-text action, skipping over clicks
    pub fn find_next_free_text(&self) -> Option<usize> {
        self.actions
            .iter()
            .position(|a| matches!(a, PendingAction::FreeText { .. }))
    }
}

/// Result of compiling a transcript
#[derive(Debug, Clone)]
pub struct CompiledTranscript {
    /// Human turns turned into actions, in transcript order
    pub actions: ActionQueue,
    /// Every row, for the report
    pub context: Vec<ContextTurn>,
}

struct ClickPattern {
    regex: Regex,
    label: String,
}

/// Maps human transcript turns to clicks or free text; first matching pattern wins
pub struct ActionCompiler {
    human_speaker: String,
    patterns: Vec<ClickPattern>,
}

impl ActionCompiler {
    /// Compiler with the built-in Compare choice vocabulary
    pub fn new(human_speaker: &str) -> Self {
        Self::with_patterns(human_speaker, DEFAULT_CLICK_PATTERNS)
            .unwrap_or_else(|_| unreachable!("built-in click patterns are valid"))
    }

    /// Compiler with a custom `(pattern, label)` table. Patterns match case-insensitively.
    pub fn with_patterns(human_speaker: &str, table: &[(&str, &str)]) -> E2eResult<Self> {
        let patterns = table
            .iter()
            .map(|(pattern, label)| {
                Regex::new(&format!("(?i){}", pattern))
                    .map(|regex| ClickPattern {
                        regex,
                        label: label.to_string(),
                    })
                    .map_err(|e| {
                        E2eError::TranscriptParse(format!("bad click pattern {pattern:?}: {e}"))
                    })
            })
            .collect::<E2eResult<Vec<_>>>()?;
        Ok(Self {
            human_speaker: human_speaker.trim().to_lowercase(),
            patterns,
        })
    }

    /// Map one message to its action
    pub fn classify(&self, message: &str) -> PendingAction {
        let message = message.trim();
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(message))
            .map(|p| PendingAction::Click {
                label: p.label.clone(),
            })
            .unwrap_or_else(|| PendingAction::FreeText {
                text: message.to_string(),
            })
    }

    pub fn compile(&self, rows: &[TranscriptRow]) -> CompiledTranscript {
        let mut actions = Vec::new();
        let mut context = Vec::with_capacity(rows.len());

        for row in rows {
            context.push(ContextTurn::from(row));

            let message = row.message.trim();
            if row.speaker.trim().to_lowercase() == self.human_speaker && !message.is_empty() {
                actions.push(self.classify(message));
            }
        }

        CompiledTranscript {
            actions: ActionQueue::new(actions),
            context,
        }
    }
}

/// Compile `rows` with the built-in vocabulary for `human_speaker`
pub fn build_steps(rows: &[TranscriptRow], human_speaker: &str) -> CompiledTranscript {
    ActionCompiler::new(human_speaker).compile(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn rows() -> Vec<TranscriptRow> {
        vec![
            TranscriptRow::new("Compare", "Welcome! Do you live in it?"),
            TranscriptRow::new("Anant", "I will  LIVE in it"),
            TranscriptRow::new("anant ", "looking good"),
            TranscriptRow::new("Anant", "   "),
            TranscriptRow::new("Anant", "it is 3 - 6 months away, check here"),
        ]
    }

    #[test]
    fn test_compile_splits_actions_and_context() {
        let compiled = ActionCompiler::new("Anant").compile(&rows());
        assert_eq!(compiled.context.len(), 5);
        let actions: Vec<_> = compiled.actions.iter().cloned().collect();
        assert_eq!(
            actions,
            vec![
                PendingAction::Click { label: "Live in it".into() },
                PendingAction::FreeText { text: "looking good".into() },
                // term-end pattern precedes "Check here" in the table
                PendingAction::Click { label: "3-6 months away".into() },
            ]
        );
    }

    #[test_case("rent it out", "Rent it out")]
    #[test_case("6+months", "6+ months away")]
    #[test_case("Less than 3 Months", "Less than 3 months")]
    #[test_case("it has already   ended", "It's already ended")]
    fn test_classify_click(message: &str, label: &str) {
        let compiler = ActionCompiler::new("Anant");
        assert_eq!(
            compiler.classify(message),
            PendingAction::Click { label: label.into() }
        );
    }

    #[test]
    fn test_queue_find_order() {
        let mut queue = ActionQueue::new(vec![
            PendingAction::Click { label: "Live in it".into() },
            PendingAction::FreeText { text: "first".into() },
            PendingAction::FreeText { text: "second".into() },
        ]);
        assert_eq!(queue.find_matching_click(&["Rent it out"]), None);
        assert_eq!(queue.find_next_free_text(), Some(1));
        assert_eq!(
            queue.remove(1),
            Some(PendingAction::FreeText { text: "first".into() })
        );
        assert_eq!(queue.find_matching_click(&["I'll live in it"]), Some(0));
        assert_eq!(queue.remove(0), Some(PendingAction::Click { label: "Live in it".into() }));
        assert_eq!(queue.find_next_free_text(), Some(0));
        assert_eq!(queue.remove(5), None);
    }
}
