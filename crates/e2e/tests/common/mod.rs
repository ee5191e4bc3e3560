//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use compare_qa_e2e::llm::{ChatMessage, ChatModel, EmbeddingProvider};
use compare_qa_e2e::page::{
    BestEffortWait, Interaction, PageAutomation, VisibleAffordance, WaitOutcome,
};
use compare_qa_e2e::{E2eError, E2eResult};

/// Page that replays a fixed sequence of observations and records every call
#[derive(Debug, Default)]
pub struct ScriptedPage {
    pub frames: VecDeque<Vec<String>>,
    pub last: Vec<String>,
    /// Keep returning the last frame once the script runs out
    pub repeat_last: bool,
    pub fail_launch: bool,
    pub type_result: Option<Interaction>,
    pub click_result: Option<Interaction>,
    pub answer_text: Option<String>,
    pub typed: Vec<String>,
    pub clicked: Vec<String>,
    pub scrolls: usize,
    pub observations: usize,
    pub launched: bool,
    pub closed: bool,
}

impl ScriptedPage {
    pub fn new(frames: &[&[&str]]) -> Self {
        Self {
            frames: frames
                .iter()
                .map(|f| f.iter().map(|s| s.to_string()).collect())
                .collect(),
            ..Default::default()
        }
    }

    pub fn repeating(frame: &[&str]) -> Self {
        let mut page = Self::new(&[frame]);
        page.repeat_last = true;
        page
    }
}

#[async_trait]
impl PageAutomation for ScriptedPage {
    async fn launch(&mut self) -> E2eResult<()> {
        if self.fail_launch {
            return Err(E2eError::BrowserLaunch("scripted failure".to_string()));
        }
        self.launched = true;
        Ok(())
    }

    async fn navigate(&mut self, _url: &str) -> E2eResult<()> {
        Ok(())
    }

    async fn wait_network_idle(&mut self, _wait: BestEffortWait) -> WaitOutcome {
        WaitOutcome::Ready
    }

    async fn wait_processing_done(&mut self, wait: BestEffortWait) -> WaitOutcome {
        wait.timed_out()
    }

    async fn settle(&mut self, _duration: Duration) {}

    async fn list_visible_affordances(&mut self) -> Vec<VisibleAffordance> {
        self.observations += 1;
        let labels = match self.frames.pop_front() {
            Some(frame) => {
                self.last = frame.clone();
                frame
            }
            None if self.repeat_last => self.last.clone(),
            None => Vec::new(),
        };
        labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| VisibleAffordance::new(label, 600.0 + i as f64 * 40.0))
            .collect()
    }

    async fn click_by_label(&mut self, label: &str, _exact: bool) -> Interaction {
        self.clicked.push(label.to_string());
        self.click_result.clone().unwrap_or(Interaction::Done)
    }

    async fn type_and_submit(&mut self, text: &str) -> Interaction {
        self.typed.push(text.to_string());
        self.type_result.clone().unwrap_or(Interaction::Done)
    }

    async fn read_text(&mut self, _selector: &str) -> Option<String> {
        self.answer_text.clone()
    }

    async fn screenshot(&mut self, name: &str) -> Option<PathBuf> {
        Some(PathBuf::from(format!("shots/{}.png", name)))
    }

    async fn scroll_down(&mut self, _pixels: u32) {
        self.scrolls += 1;
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Letter-frequency embeddings; identical texts embed identically
#[derive(Debug, Default)]
pub struct LetterEmbeddings {
    pub calls: AtomicUsize,
}

impl LetterEmbeddings {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for LetterEmbeddings {
    async fn embed(&self, text: &str) -> E2eResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0; 36];
        for c in text.to_lowercase().chars() {
            if let Some(d) = c.to_digit(36) {
                v[d as usize] += 1.0;
            }
        }
        Ok(v)
    }
}

/// Returns the same vector for every input
#[derive(Debug, Default)]
pub struct ConstantEmbeddings {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for ConstantEmbeddings {
    async fn embed(&self, _text: &str) -> E2eResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.3, 0.4, 0.5])
    }
}

/// Chat model with a canned reply, or a canned failure
#[derive(Debug)]
pub struct CannedChat {
    pub reply: Result<String, String>,
}

impl CannedChat {
    pub fn ok(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl ChatModel for CannedChat {
    async fn complete(&self, _messages: &[ChatMessage], _temperature: f32) -> E2eResult<String> {
        self.reply.clone().map_err(E2eError::LanguageModel)
    }
}
