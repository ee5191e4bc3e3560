//! Embedding-based semantic agreement between two answers

use std::sync::Arc;

use compare_qa_common::config::LlmConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::E2eResult;
use crate::llm::{EmbeddingProvider, OpenAiEmbeddings};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgmentResult {
    pub is_match: bool,
    /// Cosine similarity in [-1, 1]
    pub score: f64,
}

impl JudgmentResult {
    pub fn verdict(&self) -> &'static str {
        if self.is_match {
            "PASS"
        } else {
            "FAIL"
        }
    }
}

/// Compares texts by the cosine similarity of their embeddings
#[derive(Clone)]
pub struct SemanticJudge {
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl SemanticJudge {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embeddings }
    }

    /// Judge backed by the configured embedding service.
    ///
    /// Fails with `DependencyUnavailable` when credentials are missing.
    pub fn from_config(config: &LlmConfig) -> E2eResult<Self> {
        Ok(Self::new(Arc::new(OpenAiEmbeddings::from_config(config)?)))
    }

    /// `score >= threshold` means agreement. Empty input never reaches the
    /// embedding service and scores 0.
    pub async fn agree(
        &self,
        text_a: &str,
        text_b: &str,
        threshold: f64,
    ) -> E2eResult<JudgmentResult> {
        if text_a.is_empty() || text_b.is_empty() {
            return Ok(JudgmentResult {
                is_match: false,
                score: 0.0,
            });
        }

        let a = self.embeddings.embed(text_a).await?;
        let b = self.embeddings.embed(text_b).await?;
        let score = cosine_similarity(&a, &b);
        debug!("Semantic similarity {:.4} (threshold {})", score, threshold);

        Ok(JudgmentResult {
            is_match: score >= threshold,
            score,
        })
    }
}

/// Cosine similarity; 0 for zero-length, zero-norm or mismatched vectors
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
