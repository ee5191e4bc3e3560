//! Retrieval-augmented answer oracle over a ground-truth document
//!
//! The document is split into overlapping chunks, every chunk is embedded
//! once, and questions are answered by a chat model that sees only the
//! `top_k` most similar chunks.

use std::path::Path;
use std::sync::Arc;

use compare_qa_common::config::RagConfig;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::judge::cosine_similarity;
use crate::llm::{ChatMessage, ChatModel, EmbeddingProvider};

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

const SYSTEM_RULES: &str = "You are a strict policy quoting bot.\n\
Answer ONLY from the provided CONTEXT. If information is not in CONTEXT, say 'Not found in policy context.'\n\
Unify equivalent phrasings into one canonical line. Be concise and precise.";

/// Split text into chunks of at most `chunk_size` characters, preferring
/// paragraph, then line, then word boundaries. Consecutive chunks share up
/// to `overlap` characters.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    split_recursive(text, SEPARATORS, chunk_size, overlap)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let (idx, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(*sep))
        .map(|(i, sep)| (i, *sep))
        .unwrap_or((separators.len(), ""));
    let rest = separators.get(idx + 1..).unwrap_or(&[]);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();
    for piece in pieces {
        if char_len(&piece) < chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, separator, chunk_size, overlap));
            fitting.clear();
        }
        if rest.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, rest, chunk_size, overlap));
        }
    }
    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, separator, chunk_size, overlap));
    }
    chunks
}

/// Greedily join pieces into chunks, carrying a tail of up to `overlap` characters forward
fn merge_pieces(
    pieces: &[String],
    separator: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut total = 0usize;

    let join = |window: &[&str]| window.join(separator).trim().to_string();

    for piece in pieces {
        let len = char_len(piece);
        let joiner = if window.is_empty() { 0 } else { sep_len };
        if total + len + joiner > chunk_size && !window.is_empty() {
            let chunk = join(&window);
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
            while total > overlap || (total > 0 && total + len + sep_len > chunk_size) {
                let dropped = window.remove(0);
                total -= char_len(dropped) + if window.is_empty() { 0 } else { sep_len };
                if window.is_empty() {
                    total = 0;
                    break;
                }
            }
        }
        total += len + if window.is_empty() { 0 } else { sep_len };
        window.push(piece);
    }

    let chunk = join(&window);
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

/// In-memory vector index plus a chat model restricted to retrieved context
pub struct RagOracle {
    chunks: Vec<String>,
    vectors: Vec<Vec<f64>>,
    top_k: usize,
    embeddings: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatModel>,
}

impl RagOracle {
    /// Index a ground-truth file. A missing file is fatal.
    pub async fn from_file(
        path: &Path,
        config: &RagConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatModel>,
    ) -> E2eResult<Self> {
        if !path.exists() {
            let shown = path
                .canonicalize()
                .unwrap_or_else(|_| path.to_path_buf())
                .display()
                .to_string();
            return Err(E2eError::GroundTruthNotFound(shown));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text, config, embeddings, chat).await
    }

    pub async fn from_text(
        text: &str,
        config: &RagConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatModel>,
    ) -> E2eResult<Self> {
        let chunks = split_text(text, config.chunk_size, config.chunk_overlap);
        let vectors = embeddings.embed_batch(&chunks).await?;
        info!("Indexed {} ground-truth chunk(s)", chunks.len());
        Ok(Self {
            chunks,
            vectors,
            top_k: config.top_k.max(1),
            embeddings,
            chat,
        })
    }

    /// The `top_k` chunks most similar to the question, best first
    pub async fn retrieve(&self, question: &str) -> E2eResult<Vec<&str>> {
        let query = self.embeddings.embed(question).await?;
        let mut scored: Vec<(f64, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (cosine_similarity(&query, v), i))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, i)| self.chunks[i].as_str())
            .collect())
    }

    /// Answer from retrieved context only, at temperature 0
    pub async fn answer(&self, question: &str) -> E2eResult<String> {
        let context = self.retrieve(question).await?.join("\n\n");
        debug!("RAG context: {} char(s)", context.len());

        let messages = [
            ChatMessage::system(SYSTEM_RULES),
            ChatMessage::user(format!(
                "CONTEXT:\n{}\n\nQUESTION: {}\nFINAL ANSWER:",
                context, question
            )),
        ];
        self.chat.complete(&messages, 0.0).await
    }
}
