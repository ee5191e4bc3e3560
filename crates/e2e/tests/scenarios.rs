//! Scenario orchestration with scripted page and model stubs

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{CannedChat, LetterEmbeddings, ScriptedPage};
use compare_qa_common::{ProjectConfig, Role};
use compare_qa_e2e::artifact_log::{ArtifactLog, LogRow};
use compare_qa_e2e::{run_scenario1, run_scenario2, E2eError, StopReason, Summary};
use tempfile::TempDir;

fn project(dir: &Path) -> ProjectConfig {
    let yaml = format!(
        r#"
ui:
  start_url: https://compare.example.test/
artifacts:
  reports_dir: {root}/reports
  files_root: {root}/files
  logs_excel: {root}/logs/compare_dialog.xlsx
scenario1:
  transcript: {root}/chat.csv
  human_speaker: Anant
rag:
  ground_truth_file: {root}/policy.txt
  similarity_threshold: 0.85
  question: When does my policy expire?
  answer_selector: ".answer"
  fallback_ui_answer: in 24 hours
"#,
        root = dir.display()
    );
    ProjectConfig::from_yaml(&yaml).unwrap()
}

fn workspace() -> (TempDir, ProjectConfig) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("chat.csv"),
        "Speaker,Message\nCompare,Welcome\nAnant,Live in it\nAnant,looking good\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("policy.txt"),
        "Cover starts today.\n\nYour policy expires in 24 hours.",
    )
    .unwrap();
    let config = project(dir.path());
    (dir, config)
}

#[tokio::test]
async fn test_scenario1_writes_report_and_log() {
    let (_dir, config) = workspace();
    let mut page = ScriptedPage::new(&[&["Live in it", "Rent it out"]]);
    // consent labels are clicked before the engine starts
    page.click_result = Some(compare_qa_e2e::Interaction::NotFound);

    let report = run_scenario1(&config, &mut page, &Summary::Skipped).await.unwrap();

    assert!(page.closed);
    assert_eq!(report.outcome.stop, StopReason::Idle);

    // 3 context turns, "Opened app.", 3 engine events, summary
    assert_eq!(report.events.len(), 8);
    assert_eq!(report.events[3].text, "Opened app.");
    let summary = report.events.last().unwrap();
    assert_eq!(summary.role, Role::Assistant);
    assert_eq!(summary.text, "LLM summary skipped.");

    let html = std::fs::read_to_string(&report.report_path).unwrap();
    assert!(report.report_path.ends_with("scenario1_report.html"));
    assert!(html.contains("Answered &#39;occupancy&#39; -&gt; Live in it via typed"));

    assert_eq!(report.log_path.extension().unwrap(), "csv");
    let rows = ArtifactLog::new(&report.log_path).load().unwrap();
    assert!(rows
        .iter()
        .any(|r| r.role == "buttons(current)" && r.content == "Live in it, Rent it out"));
    assert!(rows.iter().all(|r| r.content != "Welcome"));
}

#[tokio::test]
async fn test_scenario1_log_follows_tick_order() {
    let (_dir, config) = workspace();
    let mut page = ScriptedPage::new(&[&["Live in it", "Rent it out"]]);
    page.click_result = Some(compare_qa_e2e::Interaction::NotFound);

    let report = run_scenario1(&config, &mut page, &Summary::Skipped).await.unwrap();
    let rows = ArtifactLog::new(&report.log_path).load().unwrap();
    let position = |pred: fn(&LogRow) -> bool| rows.iter().position(pred).unwrap();

    let opened = position(|r| r.content == "Opened app.");
    let first_tick = position(|r| r.content == "Live in it, Rent it out");
    let answered = position(|r| r.content.starts_with("Answered 'occupancy'"));
    let second_tick = position(|r| r.role == "buttons(current)" && r.content.is_empty());
    let typed = position(|r| r.content == "looking good");
    let summary = position(|r| r.content == "LLM summary skipped.");

    assert!(opened < first_tick);
    assert!(first_tick < answered);
    assert!(answered < second_tick);
    assert!(second_tick < typed);
    assert_eq!(summary, rows.len() - 1);
}

#[tokio::test]
async fn test_scenario1_unreadable_log_still_reports() {
    let (dir, config) = workspace();
    let logs = dir.path().join("logs");
    std::fs::create_dir_all(&logs).unwrap();
    std::fs::write(logs.join("compare_dialog.csv"), "when,who\nx,y\n").unwrap();
    let mut page = ScriptedPage::default();

    let report = run_scenario1(&config, &mut page, &Summary::Skipped).await.unwrap();

    assert!(report.report_path.exists());
    assert!(page.closed);
    // the foreign file is left as it was
    let kept = std::fs::read_to_string(logs.join("compare_dialog.csv")).unwrap();
    assert_eq!(kept, "when,who\nx,y\n");
}

#[tokio::test]
async fn test_scenario1_log_accumulates_across_runs() {
    let (_dir, config) = workspace();

    let mut first = ScriptedPage::default();
    run_scenario1(&config, &mut first, &Summary::Skipped).await.unwrap();
    let log = ArtifactLog::new(&config.artifacts.logs_excel);
    let after_first = log.load().unwrap().len();

    let mut second = ScriptedPage::default();
    run_scenario1(&config, &mut second, &Summary::Skipped).await.unwrap();
    assert_eq!(log.load().unwrap().len(), after_first * 2);
}

#[tokio::test]
async fn test_scenario1_summary_failure_is_captured() {
    let (_dir, config) = workspace();
    let mut page = ScriptedPage::default();
    let summary = Summary::Model(Arc::new(CannedChat::failing("rate limited")));

    let report = run_scenario1(&config, &mut page, &summary).await.unwrap();
    let text = &report.events.last().unwrap().text;
    assert_eq!(text, "Summary failed: Language model error: rate limited");
    assert!(report.report_path.exists());
}

#[tokio::test]
async fn test_scenario1_launch_failure_is_fatal_and_closes() {
    let (_dir, config) = workspace();
    let mut page = ScriptedPage {
        fail_launch: true,
        ..Default::default()
    };

    let err = run_scenario1(&config, &mut page, &Summary::Skipped).await.unwrap_err();
    assert!(matches!(err, E2eError::BrowserLaunch(_)));
    assert!(page.closed);
    assert!(!config.artifacts.reports_dir.join("scenario1_report.html").exists());
}

#[tokio::test]
async fn test_scenario1_missing_transcript() {
    let (dir, mut config) = workspace();
    config.scenario1.transcript = dir.path().join("absent.csv");
    let mut page = ScriptedPage::default();

    let err = run_scenario1(&config, &mut page, &Summary::Skipped).await.unwrap_err();
    assert!(matches!(err, E2eError::TranscriptNotFound(_)));
    assert!(!page.launched);
}

#[tokio::test]
async fn test_scenario2_pass_with_fallback_answer() {
    let (_dir, config) = workspace();
    let mut page = ScriptedPage::default();
    let embeddings = Arc::new(LetterEmbeddings::default());

    let report = run_scenario2(
        &config,
        &mut page,
        embeddings,
        Arc::new(CannedChat::ok("in 24 hours")),
    )
    .await
    .unwrap();

    assert!(page.closed);
    assert_eq!(page.typed, vec!["When does my policy expire?"]);
    assert_eq!(report.ui_answer, "in 24 hours");
    assert!(report.passed());
    assert!((report.judgment.score - 1.0).abs() < 1e-9);

    let html = std::fs::read_to_string(&report.report_path).unwrap();
    assert!(html.contains("PASS (similarity=1.000, threshold=0.85)"));
    assert!(report.report_path.ends_with("scenario2_rag_report.html"));
}

#[tokio::test]
async fn test_scenario2_reads_ui_answer() {
    let (_dir, config) = workspace();
    let mut page = ScriptedPage {
        answer_text: Some("  zzz  ".to_string()),
        ..Default::default()
    };

    let report = run_scenario2(
        &config,
        &mut page,
        Arc::new(LetterEmbeddings::default()),
        Arc::new(CannedChat::ok("in 24 hours")),
    )
    .await
    .unwrap();

    assert_eq!(report.ui_answer, "zzz");
    assert!(!report.passed());
}

#[tokio::test]
async fn test_scenario2_missing_ground_truth() {
    let (dir, mut config) = workspace();
    config.rag.ground_truth_file = dir.path().join("absent.txt");
    let mut page = ScriptedPage::default();

    let err = run_scenario2(
        &config,
        &mut page,
        Arc::new(LetterEmbeddings::default()),
        Arc::new(CannedChat::ok("unused")),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, E2eError::GroundTruthNotFound(_)));
    assert!(page.closed);
}

#[tokio::test]
async fn test_scenario2_unreadable_log_still_reports() {
    let (dir, config) = workspace();
    let logs = dir.path().join("logs");
    std::fs::create_dir_all(&logs).unwrap();
    std::fs::write(logs.join("compare_dialog.csv"), "when,who\nx,y\n").unwrap();
    let mut page = ScriptedPage::default();

    let report = run_scenario2(
        &config,
        &mut page,
        Arc::new(LetterEmbeddings::default()),
        Arc::new(CannedChat::ok("in 24 hours")),
    )
    .await
    .unwrap();

    assert!(report.report_path.exists());
    assert!(report.passed());
}
