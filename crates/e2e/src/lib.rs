//! Compare QA E2E harness
//!
//! Replays a recorded Compare conversation against the live web app and
//! validates chat answers against a retrieval-augmented oracle. `metrics`
//! scores offline classifier predictions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario orchestration                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  transcript::load_transcript() -> Vec<TranscriptRow>        │
//! │  ActionCompiler::compile()     -> ActionQueue + context     │
//! │  ReplayEngine<P: PageAutomation>                            │
//! │    ├── observe bottom-band affordances                      │
//! │    ├── ReplayState::decide()  (rules P, A, B, C, D, E)      │
//! │    └── scroll recovery, idle stop or tick cap (rule F)      │
//! │  SemanticJudge / RagOracle (EmbeddingProvider, ChatModel)   │
//! │  report::render_report()       -> static HTML               │
//! │  ArtifactLog                   -> cumulative CSV            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightSession: Node.js bridge, line-delimited JSON     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod artifact_log;
pub mod error;
pub mod judge;
pub mod llm;
pub mod metrics;
pub mod page;
pub mod playwright;
pub mod policy;
pub mod rag;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod transcript;

pub use actions::{build_steps, ActionCompiler, ActionQueue, CompiledTranscript, PendingAction};
pub use error::{E2eError, E2eResult};
pub use judge::{JudgmentResult, SemanticJudge};
pub use metrics::{evaluate_predictions, ClassificationMetrics, ConfusionCounts};
pub use page::{BestEffortWait, Interaction, PageAutomation, VisibleAffordance, WaitOutcome};
pub use playwright::{PlaywrightConfig, PlaywrightSession};
pub use runner::{EngineConfig, ReplayEngine, ReplayOutcome, StopReason};
pub use scenario::{run_scenario1, run_scenario2, Scenario1Report, Scenario2Report, Summary};
pub use transcript::load_transcript;
