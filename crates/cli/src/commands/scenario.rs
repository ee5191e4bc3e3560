//! Scenario Commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use compare_qa_common::ProjectConfig;
use compare_qa_e2e::llm::{OpenAiChat, OpenAiClient, OpenAiEmbeddings};
use compare_qa_e2e::{
    run_scenario1, run_scenario2, PlaywrightConfig, PlaywrightSession, Scenario1Report,
    Scenario2Report, StopReason, Summary,
};
use serde::Serialize;
use tracing::info;

use crate::output::{print_item, verdict, OutputFormat, TableDisplay};

/// Browser overrides shared by both scenarios
#[derive(Args, Debug, Default)]
pub struct UiOverrides {
    /// Override ui.start_url
    #[arg(long)]
    pub start_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

impl UiOverrides {
    fn apply(&self, config: &mut ProjectConfig) {
        if let Some(url) = &self.start_url {
            config.ui.start_url = url.clone();
        }
        if self.headed {
            config.ui.headless = false;
        }
    }
}

#[derive(Args, Debug)]
pub struct Scenario1Args {
    #[command(flatten)]
    pub ui: UiOverrides,

    /// Override scenario1.transcript
    #[arg(long)]
    pub transcript: Option<PathBuf>,

    /// Override scenario1.max_ticks
    #[arg(long)]
    pub max_ticks: Option<usize>,
}

#[derive(Args, Debug)]
pub struct Scenario2Args {
    #[command(flatten)]
    pub ui: UiOverrides,

    /// Override rag.question
    #[arg(long)]
    pub question: Option<String>,
}

#[derive(Serialize)]
pub struct Scenario1Display {
    pub session_id: String,
    pub stop: String,
    pub ticks: usize,
    pub events: usize,
    pub report: String,
    pub log: String,
}

impl From<&Scenario1Report> for Scenario1Display {
    fn from(report: &Scenario1Report) -> Self {
        Self {
            session_id: report.session_id.clone(),
            stop: match report.outcome.stop {
                StopReason::Idle => "idle".to_string(),
                StopReason::TickCap => "tick cap".to_string(),
            },
            ticks: report.outcome.ticks,
            events: report.events.len(),
            report: report.report_path.display().to_string(),
            log: report.log_path.display().to_string(),
        }
    }
}

impl TableDisplay for Scenario1Display {
    fn headers() -> Vec<&'static str> {
        vec!["SESSION", "STOP", "TICKS", "EVENTS", "REPORT", "LOG"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.session_id.clone(),
            self.stop.clone(),
            self.ticks.to_string(),
            self.events.to_string(),
            self.report.clone(),
            self.log.clone(),
        ]
    }
}

#[derive(Serialize)]
pub struct Scenario2Display {
    pub session_id: String,
    pub passed: bool,
    pub similarity: f64,
    pub threshold: f64,
    pub ui_answer: String,
    pub rag_answer: String,
    pub report: String,
}

impl From<&Scenario2Report> for Scenario2Display {
    fn from(report: &Scenario2Report) -> Self {
        Self {
            session_id: report.session_id.clone(),
            passed: report.passed(),
            similarity: report.judgment.score,
            threshold: report.threshold,
            ui_answer: report.ui_answer.clone(),
            rag_answer: report.rag_answer.clone(),
            report: report.report_path.display().to_string(),
        }
    }
}

impl TableDisplay for Scenario2Display {
    fn headers() -> Vec<&'static str> {
        vec!["VERDICT", "SIMILARITY", "THRESHOLD", "UI ANSWER", "RAG ANSWER", "REPORT"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            verdict(self.passed),
            format!("{:.3}", self.similarity),
            self.threshold.to_string(),
            self.ui_answer.clone(),
            self.rag_answer.clone(),
            self.report.clone(),
        ]
    }
}

fn browser_session(config: &ProjectConfig) -> Result<PlaywrightSession> {
    Ok(PlaywrightSession::new(PlaywrightConfig::from_project(config)?))
}

pub async fn scenario1(
    args: Scenario1Args,
    mut config: ProjectConfig,
    format: OutputFormat,
) -> Result<()> {
    args.ui.apply(&mut config);
    if let Some(transcript) = args.transcript {
        config.scenario1.transcript = transcript;
    }
    if let Some(max_ticks) = args.max_ticks {
        config.scenario1.max_ticks = max_ticks;
    }
    config.validate()?;

    let mut session = browser_session(&config)?;
    let summary = Summary::from_config(&config.llm);
    let report = run_scenario1(&config, &mut session, &summary).await?;
    info!("Scenario 1 finished after {} tick(s)", report.outcome.ticks);

    print_item(&Scenario1Display::from(&report), format);
    Ok(())
}

/// Returns whether the verdict was PASS
pub async fn scenario2(
    args: Scenario2Args,
    mut config: ProjectConfig,
    format: OutputFormat,
) -> Result<bool> {
    args.ui.apply(&mut config);
    if let Some(question) = args.question {
        config.rag.question = question;
    }
    config.validate()?;

    // credentials are checked before any browser starts
    let client = OpenAiClient::from_env(&config.llm)?;
    let embeddings = Arc::new(OpenAiEmbeddings::new(client.clone(), &config.llm.embedding_model));
    let chat = Arc::new(OpenAiChat::new(client, &config.llm.chat_model));

    let mut session = browser_session(&config)?;
    let report = run_scenario2(&config, &mut session, embeddings, chat).await?;

    print_item(&Scenario2Display::from(&report), format);
    Ok(report.passed())
}
