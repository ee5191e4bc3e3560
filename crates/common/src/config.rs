//! Project configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable that disables the end-of-run LLM summary
pub const SKIP_LLM_ENV: &str = "COMPARE_QA_SKIP_LLM";

/// Top-level project configuration, loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Browser and target application settings
    pub ui: UiConfig,

    /// Where reports, screenshots and logs are written
    pub artifacts: ArtifactsConfig,

    /// Transcript replay settings
    pub scenario1: Scenario1Config,

    /// RAG validation settings
    pub rag: RagConfig,

    /// Language model service settings
    pub llm: LlmConfig,
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Entry URL of the Compare application
    pub start_url: String,

    /// Run the browser without a window
    pub headless: bool,

    /// Delay inserted by the browser driver between operations
    pub slow_mo_ms: u64,

    /// Browser engine: chromium, firefox or webkit
    pub browser: String,

    /// Viewport dimensions
    pub viewport: Viewport,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            headless: true,
            slow_mo_ms: 100,
            browser: "chromium".to_string(),
            viewport: Viewport::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory receiving one HTML report per scenario
    pub reports_dir: PathBuf,

    /// Root for screenshots and other run files
    pub files_root: PathBuf,

    /// Append-only event log (rewritten as CSV)
    pub logs_excel: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            files_root: PathBuf::from("files"),
            logs_excel: PathBuf::from("logs/compare_dialog.csv"),
        }
    }
}

impl ArtifactsConfig {
    /// Screenshot directory under the files root
    pub fn shots_dir(&self) -> PathBuf {
        self.files_root.join("shots")
    }
}

/// Transcript replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario1Config {
    /// Recorded conversation (CSV or spreadsheet)
    pub transcript: PathBuf,

    /// Speaker whose rows become UI actions
    pub human_speaker: String,

    /// Hard cap on replay ticks
    pub max_ticks: usize,
}

impl Default for Scenario1Config {
    fn default() -> Self {
        Self {
            transcript: PathBuf::from("files/chat_conversation.csv"),
            human_speaker: "Anant".to_string(),
            max_ticks: 80,
        }
    }
}

/// RAG validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Ground-truth policy document
    pub ground_truth_file: PathBuf,

    /// Minimum cosine similarity for a PASS verdict
    pub similarity_threshold: f64,

    /// Question asked to both the UI and the RAG oracle
    pub question: String,

    /// CSS selector of the chat answer in the UI
    pub answer_selector: Option<String>,

    /// Answer used when the UI answer cannot be read
    pub fallback_ui_answer: Option<String>,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            ground_truth_file: PathBuf::from("datasets/policy_sample.txt"),
            similarity_threshold: 0.85,
            question: "When does my policy expire?".to_string(),
            answer_selector: None,
            fallback_ui_answer: None,
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 3,
        }
    }
}

/// Language model service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model answering RAG questions
    pub chat_model: String,

    /// Model writing the end-of-run summary
    pub summary_model: String,

    pub embedding_model: String,

    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Generate the end-of-run summary
    pub summary: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4o-mini".to_string(),
            summary_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            summary: true,
        }
    }
}

impl LlmConfig {
    /// Whether the summary step should run, honoring the skip override
    pub fn summary_enabled(&self) -> bool {
        self.summary && std::env::var(SKIP_LLM_ENV).map(|v| v != "1").unwrap_or(true)
    }
}

impl ProjectConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.rag.similarity_threshold) {
            return Err(Error::InvalidConfig(format!(
                "rag.similarity_threshold must be within [-1, 1], got {}",
                self.rag.similarity_threshold
            )));
        }
        if self.scenario1.max_ticks == 0 {
            return Err(Error::InvalidConfig(
                "scenario1.max_ticks must be at least 1".to_string(),
            ));
        }
        if self.rag.chunk_size == 0 || self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        Ok(())
    }

    /// The start URL, or an error when it was never configured
    pub fn start_url(&self) -> Result<&str> {
        let url = self.ui.start_url.trim();
        if url.is_empty() {
            return Err(Error::InvalidConfig("ui.start_url is required".to_string()));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_yaml() {
        let yaml = r#"
ui:
  start_url: https://compare.example.com/
  headless: false
  slow_mo_ms: 50
artifacts:
  reports_dir: out/reports
  files_root: out/files
  logs_excel: out/logs/dialog.xlsx
rag:
  ground_truth_file: datasets/policy.txt
  similarity_threshold: 0.9
  question: When does my policy expire?
"#;
        let config = ProjectConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.start_url().unwrap(), "https://compare.example.com/");
        assert!(!config.ui.headless);
        assert_eq!(config.ui.slow_mo_ms, 50);
        assert_eq!(config.artifacts.shots_dir(), PathBuf::from("out/files/shots"));
        assert_eq!(config.rag.similarity_threshold, 0.9);
        // Untouched sections keep their defaults
        assert_eq!(config.scenario1.max_ticks, 80);
        assert_eq!(config.rag.top_k, 3);
    }

    #[test]
    fn test_missing_start_url_is_rejected() {
        let config = ProjectConfig::from_yaml("ui: {}").unwrap();
        assert!(matches!(config.start_url(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_viewport_keeps_defaults() {
        let config = ProjectConfig::from_yaml("ui:\n  viewport: { width: 1000 }\n").unwrap();
        assert_eq!(config.ui.viewport.width, 1000);
        assert_eq!(config.ui.viewport.height, 720);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = ProjectConfig::from_yaml("rag:\n  similarity_threshold: 1.5\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }
}
