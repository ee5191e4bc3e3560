//! End-to-end scenarios: transcript replay and RAG answer validation
//!
//! Both scenarios own their page for the whole run and close it on every
//! exit path, including fatal errors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use compare_qa_common::config::LlmConfig;
use compare_qa_common::{ProjectConfig, Role, TranscriptEvent};
use serde::Serialize;
use tracing::{info, warn};

use crate::actions::ActionCompiler;
use crate::artifact_log::{ArtifactLog, LogRow};
use crate::error::E2eResult;
use crate::judge::{JudgmentResult, SemanticJudge};
use crate::llm::{ChatMessage, ChatModel, EmbeddingProvider, OpenAiChat, OpenAiClient};
use crate::page::{BestEffortWait, PageAutomation};
use crate::policy::CONSENT_LABELS;
use crate::rag::RagOracle;
use crate::report::{session_id, write_report};
use crate::runner::{EngineConfig, ReplayEngine, ReplayOutcome, TESTING_AGENT};
use crate::transcript::load_transcript;

pub const SCENARIO1_TITLE: &str = "Scenario 1 - Direct Entry To Comparison";
pub const SCENARIO2_TITLE: &str = "Scenario 2 - RAG Validation";

const SUMMARY_PROMPT: &str = "You are TestingAgent validating Scenario 1 (Direct Entry To Comparison) in the Compare app.

Goal
- Complete the remortgage comparison journey end-to-end, based on the provided transcript.

Rules
- Prefer typing the exact choice labels (e.g., \"3-6 months away\", \"Live in it\", \"Check here\").
- If typing is ineffective, clicking those options is acceptable.
- After each step, confirm the UI progressed (new question, results table, or product details).

Output
- Bullet list of the actions taken (Typed or Clicked), any assumptions, and the end state.";

/// End-of-run summary source
#[derive(Clone)]
pub enum Summary {
    Skipped,
    Model(Arc<dyn ChatModel>),
    /// The model could not be constructed; the reason ends up in the report
    Unavailable(String),
}

impl Summary {
    pub fn from_config(config: &LlmConfig) -> Self {
        if !config.summary_enabled() {
            return Summary::Skipped;
        }
        match OpenAiClient::from_env(config) {
            Ok(client) => Summary::Model(Arc::new(OpenAiChat::new(client, &config.summary_model))),
            Err(e) => Summary::Unavailable(e.to_string()),
        }
    }

    /// Summary text. Failures are reduced to a message, never raised.
    pub async fn produce(&self, events: &[TranscriptEvent]) -> String {
        let chat = match self {
            Summary::Skipped => return "LLM summary skipped.".to_string(),
            Summary::Unavailable(reason) => return format!("Summary failed: {}", reason),
            Summary::Model(chat) => chat,
        };

        let log = events
            .iter()
            .map(|e| format!("- [{}] {}", e.agent, e.text))
            .collect::<Vec<_>>()
            .join("\n");
        let messages = [
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(format!("Session log:\n{}", log)),
        ];
        match chat.complete(&messages, 0.0).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Summary failed: {}", e);
                format!("Summary failed: {}", e)
            }
        }
    }
}

/// The report already exists when this runs, so a broken log only warns
fn append_log(log: &ArtifactLog, rows: &[LogRow]) {
    if let Err(e) = log.append(rows) {
        warn!("Could not append to {}: {}", log.path().display(), e);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scenario1Report {
    pub session_id: String,
    pub report_path: PathBuf,
    pub log_path: PathBuf,
    pub outcome: ReplayOutcome,
    pub events: Vec<TranscriptEvent>,
}

/// Replay the configured transcript against the live app
pub async fn run_scenario1<P: PageAutomation>(
    config: &ProjectConfig,
    page: &mut P,
    summary: &Summary,
) -> E2eResult<Scenario1Report> {
    let result = scenario1_inner(config, page, summary).await;
    page.close().await;
    result
}

async fn scenario1_inner<P: PageAutomation>(
    config: &ProjectConfig,
    page: &mut P,
    summary: &Summary,
) -> E2eResult<Scenario1Report> {
    let start_url = config.start_url()?.to_string();
    let rows = load_transcript(&config.scenario1.transcript)?;
    let compiled = ActionCompiler::new(&config.scenario1.human_speaker).compile(&rows);
    info!(
        "Transcript: {} row(s), {} pending action(s)",
        rows.len(),
        compiled.actions.len()
    );

    let session = session_id("scenario1");
    let opened_at = compare_qa_common::timestamp();
    let mut events: Vec<TranscriptEvent> = compiled
        .context
        .iter()
        .map(|turn| TranscriptEvent::from_context(turn, opened_at.as_str()))
        .collect();
    let seeded = events.len();

    page.launch().await?;
    page.navigate(&start_url).await?;
    page.wait_network_idle(BestEffortWait::from_millis(3500)).await;
    page.settle(Duration::from_millis(600)).await;
    let shot = page.screenshot("after-open").await;
    events.push(
        TranscriptEvent::now(Role::Action, TESTING_AGENT, "Opened app.").with_screenshot(shot),
    );

    for label in CONSENT_LABELS {
        if page.click_by_label(label, false).await.is_done() {
            let shot = page.screenshot("after-cookie").await;
            let text = format!("Clicked consent: {}", label);
            events.push(
                TranscriptEvent::now(Role::Action, TESTING_AGENT, text).with_screenshot(shot),
            );
            break;
        }
    }

    let engine_config = EngineConfig::default().with_max_ticks(config.scenario1.max_ticks);
    let mut engine = ReplayEngine::new(page, &compiled, engine_config);
    let outcome = engine.run().await;
    let engine_start = events.len();
    events.extend(engine.into_events());
    let engine_end = events.len();

    let summary_text = summary.produce(&events[seeded..]).await;
    events.push(TranscriptEvent::now(Role::Assistant, TESTING_AGENT, summary_text));

    let report_path = write_report(
        &config.artifacts.reports_dir.join("scenario1_report.html"),
        &events,
        &session,
        SCENARIO1_TITLE,
    )?;

    let log = ArtifactLog::new(&config.artifacts.logs_excel);
    let mut log_rows: Vec<LogRow> = events[seeded..engine_start]
        .iter()
        .flat_map(LogRow::from_event)
        .collect();
    log_rows.extend(LogRow::interleave(
        &events[engine_start..engine_end],
        &outcome.observations,
    ));
    log_rows.extend(events[engine_end..].iter().flat_map(LogRow::from_event));
    append_log(&log, &log_rows);

    Ok(Scenario1Report {
        session_id: session,
        report_path,
        log_path: log.path().to_path_buf(),
        outcome,
        events,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Scenario2Report {
    pub session_id: String,
    pub report_path: PathBuf,
    pub question: String,
    pub ui_answer: String,
    pub rag_answer: String,
    pub threshold: f64,
    pub judgment: JudgmentResult,
}

impl Scenario2Report {
    pub fn passed(&self) -> bool {
        self.judgment.is_match
    }
}

/// Ask the app a question and judge its answer against the RAG oracle
pub async fn run_scenario2<P: PageAutomation>(
    config: &ProjectConfig,
    page: &mut P,
    embeddings: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatModel>,
) -> E2eResult<Scenario2Report> {
    let result = scenario2_inner(config, page, embeddings, chat).await;
    page.close().await;
    result
}

async fn scenario2_inner<P: PageAutomation>(
    config: &ProjectConfig,
    page: &mut P,
    embeddings: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatModel>,
) -> E2eResult<Scenario2Report> {
    let rag = &config.rag;
    let start_url = config.start_url()?.to_string();
    let session = session_id("scenario2");
    let mut events = Vec::new();

    page.launch().await?;
    page.navigate(&start_url).await?;
    page.wait_network_idle(BestEffortWait::from_millis(2500)).await;

    events.push(TranscriptEvent::now(
        Role::User,
        config.scenario1.human_speaker.as_str(),
        rag.question.as_str(),
    ));
    let sent = page.type_and_submit(&rag.question).await;
    if !sent.is_done() {
        warn!("Could not submit the question: {:?}", sent);
    }
    page.wait_processing_done(BestEffortWait::from_millis(8000)).await;

    let read = match &rag.answer_selector {
        Some(selector) => page.read_text(selector).await,
        None => None,
    };
    let ui_answer = read
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| rag.fallback_ui_answer.clone())
        .unwrap_or_default();
    let shot = page.screenshot("after-answer").await;
    events.push(
        TranscriptEvent::now(Role::Assistant, "Compare Bot", ui_answer.as_str())
            .with_screenshot(shot),
    );

    let oracle = RagOracle::from_file(&rag.ground_truth_file, rag, embeddings.clone(), chat).await?;
    let rag_answer = oracle.answer(&rag.question).await?;

    let judgment = SemanticJudge::new(embeddings)
        .agree(&ui_answer, &rag_answer, rag.similarity_threshold)
        .await?;
    info!(
        "RAG validation: {} (similarity={:.3}, threshold={})",
        judgment.verdict(),
        judgment.score,
        rag.similarity_threshold
    );
    events.push(TranscriptEvent::now(
        Role::Judge,
        "RAG Validator",
        format!(
            "{} (similarity={:.3}, threshold={})\nQ: {}\nUI: {}\nGT: {}",
            judgment.verdict(),
            judgment.score,
            rag.similarity_threshold,
            rag.question,
            ui_answer,
            rag_answer
        ),
    ));

    let report_path = write_report(
        &config.artifacts.reports_dir.join("scenario2_rag_report.html"),
        &events,
        &session,
        SCENARIO2_TITLE,
    )?;

    let log = ArtifactLog::new(&config.artifacts.logs_excel);
    let rows: Vec<LogRow> = events.iter().flat_map(LogRow::from_event).collect();
    append_log(&log, &rows);

    Ok(Scenario2Report {
        session_id: session,
        report_path,
        question: rag.question.clone(),
        ui_answer,
        rag_answer,
        threshold: rag.similarity_threshold,
        judgment,
    })
}
