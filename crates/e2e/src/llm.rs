//! Language model collaborators: embeddings and chat completion
//!
//! Both are traits so the judge and the RAG oracle can run against scripted
//! stubs. The OpenAI-compatible implementations read `OPENAI_API_KEY` only
//! when constructed.

use std::time::Duration;

use async_trait::async_trait;
use compare_qa_common::config::LlmConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// Turns text into a dense vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> E2eResult<Vec<f64>>;

    async fn embed_batch(&self, texts: &[String]) -> E2eResult<Vec<Vec<f64>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> E2eResult<String>;
}

/// HTTP client for an OpenAI-compatible API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl OpenAiClient {
    /// Build a client from config and the API key in `config.api_key_env`
    pub fn from_env(config: &LlmConfig) -> E2eResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                E2eError::DependencyUnavailable(format!("{} is not set", config.api_key_env))
            })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: String) -> E2eResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| E2eError::DependencyUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, payload: &Value) -> E2eResult<Value> {
        let url = format!("{}/{}", self.api_base, path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(E2eError::LanguageModel(format!("API error {}: {}", status, body)));
        }
        Ok(response.json().await?)
    }
}

/// Embeddings endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: OpenAiClient,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> E2eResult<Self> {
        Ok(Self::new(OpenAiClient::from_env(config)?, &config.embedding_model))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> E2eResult<Vec<f64>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| E2eError::LanguageModel("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> E2eResult<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let payload = json!({ "model": self.model, "input": texts });
        let response = self.client.post("embeddings", &payload).await?;
        parse_embeddings(&response, texts.len())
    }
}

fn parse_embeddings(response: &Value, expected: usize) -> E2eResult<Vec<Vec<f64>>> {
    let data = response["data"]
        .as_array()
        .ok_or_else(|| E2eError::LanguageModel("embedding response has no data".to_string()))?;

    let mut indexed = data
        .iter()
        .map(|item| {
            let index = item["index"].as_u64().unwrap_or(0) as usize;
            let vector = item["embedding"]
                .as_array()
                .ok_or_else(|| E2eError::LanguageModel("embedding item has no vector".to_string()))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0))
                .collect::<Vec<_>>();
            Ok((index, vector))
        })
        .collect::<E2eResult<Vec<_>>>()?;
    indexed.sort_by_key(|(i, _)| *i);

    if indexed.len() != expected {
        return Err(E2eError::LanguageModel(format!(
            "expected {} embedding(s), got {}",
            expected,
            indexed.len()
        )));
    }
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Chat completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> E2eResult<String> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
        });
        let response = self.client.post("chat/completions", &payload).await?;
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                E2eError::LanguageModel("completion response has no content".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embeddings_reorders_by_index() {
        let response = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_embeddings(&response, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_embeddings_count_mismatch() {
        let response = json!({ "data": [] });
        assert!(matches!(
            parse_embeddings(&response, 1),
            Err(E2eError::LanguageModel(_))
        ));
    }

    #[test]
    fn test_missing_key_is_dependency_unavailable() {
        let config = LlmConfig {
            api_key_env: "COMPARE_QA_UNSET_KEY_FOR_CLIENT".to_string(),
            ..Default::default()
        };
        match OpenAiClient::from_env(&config) {
            Err(E2eError::DependencyUnavailable(msg)) => {
                assert!(msg.contains("COMPARE_QA_UNSET_KEY_FOR_CLIENT"))
            }
            other => panic!("expected DependencyUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_message_serializes_as_api_shape() {
        let value = serde_json::to_value(ChatMessage::system("be strict")).unwrap();
        assert_eq!(value, json!({ "role": "system", "content": "be strict" }));
    }
}
