//! Transcript Commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use compare_qa_common::ProjectConfig;
use compare_qa_e2e::policy::{Category, ChoicePreferences};
use compare_qa_e2e::{build_steps, load_transcript, PendingAction};
use serde::Serialize;

use crate::output::{print_info, print_list, print_value, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum TranscriptCommands {
    /// Load a transcript and show the actions it compiles to
    Inspect {
        /// Transcript file (.csv, .xlsx, .xls, .xlsb, .ods)
        path: Option<PathBuf>,

        /// Human speaker (defaults to scenario1.human_speaker)
        #[arg(long)]
        speaker: Option<String>,
    },
}

#[derive(Serialize)]
pub struct ActionDisplay {
    pub index: usize,
    pub kind: &'static str,
    pub value: String,
}

impl TableDisplay for ActionDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["#", "KIND", "VALUE"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.index.to_string(), self.kind.to_string(), self.value.clone()]
    }
}

#[derive(Serialize)]
struct PreferenceDisplay {
    category: &'static str,
    choice: String,
    /// "transcript" or "default"
    source: &'static str,
}

#[derive(Serialize)]
struct InspectDisplay {
    path: String,
    rows: usize,
    actions: Vec<ActionDisplay>,
    preferences: Vec<PreferenceDisplay>,
}

pub async fn execute(
    cmd: TranscriptCommands,
    config: ProjectConfig,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        TranscriptCommands::Inspect { path, speaker } => {
            let path = path.unwrap_or_else(|| config.scenario1.transcript.clone());
            let speaker = speaker.unwrap_or_else(|| config.scenario1.human_speaker.clone());

            let rows = load_transcript(&path)?;
            let compiled = build_steps(&rows, &speaker);
            let preferences = ChoicePreferences::from_context(&compiled.context);

            let actions: Vec<ActionDisplay> = compiled
                .actions
                .iter()
                .enumerate()
                .map(|(i, action)| match action {
                    PendingAction::Click { label } => ActionDisplay {
                        index: i + 1,
                        kind: "click",
                        value: label.clone(),
                    },
                    PendingAction::FreeText { text } => ActionDisplay {
                        index: i + 1,
                        kind: "free_text",
                        value: text.clone(),
                    },
                })
                .collect();
            let chosen: Vec<PreferenceDisplay> = Category::ALL
                .iter()
                .map(|c| PreferenceDisplay {
                    category: c.key(),
                    choice: preferences.choice_for(*c).to_string(),
                    source: if preferences.get(*c).is_some() {
                        "transcript"
                    } else {
                        "default"
                    },
                })
                .collect();

            match format {
                OutputFormat::Table => {
                    print_info(&format!(
                        "{}: {} row(s), {} action(s) for speaker '{}'",
                        path.display(),
                        rows.len(),
                        actions.len(),
                        speaker
                    ));
                    print_list(&actions, format);
                    for p in &chosen {
                        println!("{}: {} ({})", p.category, p.choice, p.source);
                    }
                }
                _ => print_value(
                    &InspectDisplay {
                        path: path.display().to_string(),
                        rows: rows.len(),
                        actions,
                        preferences: chosen,
                    },
                    format,
                ),
            }
        }
    }
    Ok(())
}
