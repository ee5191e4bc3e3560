//! Core types for the Compare QA harness

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Timestamp format used in reports and the artifact log (seconds precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Current local time, formatted for event rows
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One row of a recorded conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRow {
    pub speaker: String,
    pub message: String,
}

impl TranscriptRow {
    pub fn new(speaker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
        }
    }
}

/// Who produced an event in the session log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
    User,
    Action,
    Info,
    Judge,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Assistant => write!(f, "assistant"),
            Role::User => write!(f, "user"),
            Role::Action => write!(f, "action"),
            Role::Info => write!(f, "info"),
            Role::Judge => write!(f, "judge"),
        }
    }
}

/// A transcript row kept for reporting context.
///
/// Rows spoken by the application (speaker starting with "compare") are
/// assistant turns; everyone else is a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextTurn {
    pub role: Role,
    pub agent: String,
    pub text: String,
}

impl From<&TranscriptRow> for ContextTurn {
    fn from(row: &TranscriptRow) -> Self {
        let speaker = row.speaker.trim();
        let role = if speaker.to_lowercase().starts_with("compare") {
            Role::Assistant
        } else {
            Role::User
        };
        Self {
            role,
            agent: if speaker.is_empty() {
                "Unknown".to_string()
            } else {
                speaker.to_string()
            },
            text: row.message.trim().to_string(),
        }
    }
}

/// Append-only session log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub timestamp: String,
    pub role: Role,
    pub agent: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl TranscriptEvent {
    /// Create an event stamped with the current time
    pub fn now(role: Role, agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self::at(timestamp(), role, agent, text)
    }

    pub fn at(
        timestamp: impl Into<String>,
        role: Role,
        agent: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            role,
            agent: agent.into(),
            text: text.into(),
            screenshot: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: Option<PathBuf>) -> Self {
        self.screenshot = screenshot;
        self
    }

    pub fn from_context(turn: &ContextTurn, timestamp: impl Into<String>) -> Self {
        Self::at(timestamp, turn.role, turn.agent.clone(), turn.text.clone())
    }
}
