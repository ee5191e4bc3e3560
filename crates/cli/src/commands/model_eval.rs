//! Model Evaluation Command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use compare_qa_e2e::{evaluate_predictions, ClassificationMetrics, ConfusionCounts};
use serde::Serialize;

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ModelEvalArgs {
    /// CSV with columns y_true,y_pred; "1" is the positive class
    #[arg(long, default_value = "datasets/preds.csv")]
    pub preds: PathBuf,
}

#[derive(Serialize)]
struct MetricsDisplay {
    #[serde(flatten)]
    metrics: ClassificationMetrics,
    #[serde(flatten)]
    counts: ConfusionCounts,
}

impl TableDisplay for MetricsDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["PRECISION", "RECALL", "F1", "TP", "FP", "FN"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            format!("{:.3}", self.metrics.precision),
            format!("{:.3}", self.metrics.recall),
            format!("{:.3}", self.metrics.f1),
            self.counts.true_positives.to_string(),
            self.counts.false_positives.to_string(),
            self.counts.false_negatives.to_string(),
        ]
    }
}

pub fn execute(args: ModelEvalArgs, format: OutputFormat) -> Result<()> {
    let counts = evaluate_predictions(&args.preds)?;
    print_item(
        &MetricsDisplay {
            metrics: counts.metrics(),
            counts,
        },
        format,
    );
    Ok(())
}
