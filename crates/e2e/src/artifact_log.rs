//! Append-only CSV event log shared across runs

use std::path::{Path, PathBuf};

use compare_qa_common::TranscriptEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::E2eResult;
use crate::runner::{TickObservation, TESTING_AGENT};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// One log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub timestamp: String,
    pub agent: String,
    pub role: String,
    pub content: String,
}

impl LogRow {
    pub fn new(
        timestamp: impl Into<String>,
        agent: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            agent: agent.into(),
            role: role.into(),
            content: content.into(),
        }
    }

    /// Rows for one event: the event itself, then its screenshot if any
    pub fn from_event(event: &TranscriptEvent) -> Vec<Self> {
        let mut rows = vec![Self::new(
            &event.timestamp,
            &event.agent,
            event.role.to_string(),
            &event.text,
        )];
        if let Some(shot) = &event.screenshot {
            rows.push(Self::new(
                &event.timestamp,
                &event.agent,
                "screenshot",
                shot.display().to_string(),
            ));
        }
        rows
    }

    pub fn from_observation(observation: &TickObservation) -> Self {
        Self::new(
            &observation.timestamp,
            TESTING_AGENT,
            "buttons(current)",
            observation.labels.join(", "),
        )
    }

    /// Engine events with each tick's observation placed before the events it led to
    pub fn interleave(events: &[TranscriptEvent], observations: &[TickObservation]) -> Vec<Self> {
        let mut rows = Vec::new();
        let mut pending = observations.iter().peekable();
        for (index, event) in events.iter().enumerate() {
            while let Some(observation) = pending.next_if(|o| o.events_before <= index) {
                rows.push(Self::from_observation(observation));
            }
            rows.extend(Self::from_event(event));
        }
        rows.extend(pending.map(Self::from_observation));
        rows
    }
}

/// CSV log with reload-merge-rewrite semantics
#[derive(Debug, Clone)]
pub struct ArtifactLog {
    path: PathBuf,
}

impl ArtifactLog {
    /// Open the log at `configured`. Spreadsheet extensions are swapped for `.csv`.
    pub fn new(configured: &Path) -> Self {
        let is_spreadsheet = configured
            .extension()
            .map(|e| SPREADSHEET_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
            .unwrap_or(false);
        let path = if is_spreadsheet {
            let csv = configured.with_extension("csv");
            warn!(
                "Artifact log {} is written as CSV to {}",
                configured.display(),
                csv.display()
            );
            csv
        } else {
            configured.to_path_buf()
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Existing rows, empty when the file does not exist yet
    pub fn load(&self) -> E2eResult<Vec<LogRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader.deserialize().collect::<Result<Vec<LogRow>, _>>()?;
        Ok(rows)
    }

    /// Append rows: reload existing ones, concatenate, rewrite the whole file.
    /// Returns the total row count.
    pub fn append(&self, rows: &[LogRow]) -> E2eResult<usize> {
        let mut all = self.load()?;
        all.extend_from_slice(rows);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        for row in &all {
            writer.serialize(row)?;
        }
        writer.flush()?;

        debug!(
            "Appended {} row(s) to {} ({} total)",
            rows.len(),
            self.path.display(),
            all.len()
        );
        Ok(all.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compare_qa_common::Role;

    #[test]
    fn test_append_accumulates_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let log = ArtifactLog::new(&dir.path().join("logs").join("dialog.csv"));

        assert_eq!(log.append(&[LogRow::new("t1", "A", "user", "hello, world")]).unwrap(), 1);
        assert_eq!(log.append(&[LogRow::new("t2", "B", "info", "line\nbreak")]).unwrap(), 2);

        let rows = log.load().unwrap();
        assert_eq!(rows[0].content, "hello, world");
        assert_eq!(rows[1], LogRow::new("t2", "B", "info", "line\nbreak"));
    }

    #[test]
    fn test_spreadsheet_path_becomes_csv() {
        let log = ArtifactLog::new(Path::new("logs/compare_dialog.xlsx"));
        assert_eq!(log.path(), Path::new("logs/compare_dialog.csv"));
    }

    #[test]
    fn test_interleave_keeps_tick_order() {
        let observe = |tick, events_before| TickObservation {
            tick,
            timestamp: format!("o{tick}"),
            labels: vec![format!("button {tick}")],
            events_before,
        };
        let events = [
            TranscriptEvent::at("e1", Role::Action, "TestingAgent", "first"),
            TranscriptEvent::at("e2", Role::Info, "TestingAgent", "idle"),
        ];
        let rows = LogRow::interleave(&events, &[observe(1, 0), observe(2, 1), observe(3, 2)]);

        let order: Vec<&str> = rows.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(order, vec!["o1", "e1", "o2", "e2", "o3"]);
        assert_eq!(rows[0].role, "buttons(current)");
    }

    #[test]
    fn test_event_with_screenshot_yields_two_rows() {
        let event = TranscriptEvent::at("t", Role::Action, "TestingAgent", "Opened app.")
            .with_screenshot(Some(PathBuf::from("shots/a.png")));
        let rows = LogRow::from_event(&event);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, "action");
        assert_eq!(rows[1].content, "shots/a.png");
    }
}
