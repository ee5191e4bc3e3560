//! Judge Command

use anyhow::Result;
use clap::Args;
use compare_qa_common::ProjectConfig;
use compare_qa_e2e::{JudgmentResult, SemanticJudge};
use serde::Serialize;

use crate::output::{print_item, verdict, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct JudgeArgs {
    /// First text, e.g. the UI answer
    pub text_a: String,

    /// Second text, e.g. the ground-truth answer
    pub text_b: String,

    /// Minimum cosine similarity (defaults to rag.similarity_threshold)
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Serialize)]
struct JudgeDisplay {
    #[serde(flatten)]
    result: JudgmentResult,
    threshold: f64,
}

impl TableDisplay for JudgeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["VERDICT", "SIMILARITY", "THRESHOLD"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            verdict(self.result.is_match),
            format!("{:.3}", self.result.score),
            self.threshold.to_string(),
        ]
    }
}

pub async fn execute(args: JudgeArgs, config: ProjectConfig, format: OutputFormat) -> Result<()> {
    let threshold = args.threshold.unwrap_or(config.rag.similarity_threshold);
    let judge = SemanticJudge::from_config(&config.llm)?;
    let result = judge.agree(&args.text_a, &args.text_b, threshold).await?;

    print_item(&JudgeDisplay { result, threshold }, format);
    Ok(())
}
