//! Replay engine that drives the live UI from a compiled transcript

use std::time::Duration;

use compare_qa_common::{Role, TranscriptEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actions::CompiledTranscript;
use crate::page::{BestEffortWait, Interaction, PageAutomation, WaitOutcome};
use crate::policy::{Category, ChoicePreferences, Decision, ReplayState, TERMINAL_LABEL};

/// Agent name used for engine-originated events
pub const TESTING_AGENT: &str = "TestingAgent";

/// Agent name used for text typed on behalf of the human
pub const HUMAN_AGENT: &str = "You";

const IDLE_TEXT: &str = "No matching buttons or text left; pausing.";

/// Tunables for one replay run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_ticks: usize,
    pub network_idle: BestEffortWait,
    pub settle: Duration,
    pub scroll_attempts: u32,
    pub scroll_px: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ticks: 80,
            network_idle: BestEffortWait::from_millis(4000),
            settle: Duration::from_millis(450),
            scroll_attempts: 3,
            scroll_px: 900,
        }
    }
}

impl EngineConfig {
    pub fn with_max_ticks(mut self, max_ticks: usize) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

/// How an answer reached the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum How {
    Typed,
    Clicked,
    Failed,
}

impl std::fmt::Display for How {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            How::Typed => write!(f, "typed"),
            How::Clicked => write!(f, "clicked"),
            How::Failed => write!(f, "failed"),
        }
    }
}

/// Why the loop ended. Neither is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No rule applied even after scrolling
    Idle,
    /// The iteration cap was reached
    TickCap,
}

/// Labels seen at the start of one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickObservation {
    pub tick: usize,
    pub timestamp: String,
    pub labels: Vec<String>,
    /// Number of engine events recorded before this observation
    pub events_before: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub stop: StopReason,
    pub ticks: usize,
    pub observations: Vec<TickObservation>,
}

/// Runs the fixed-priority rule evaluator against a page until idle or the tick cap
pub struct ReplayEngine<'a, P: PageAutomation> {
    page: &'a mut P,
    state: ReplayState,
    config: EngineConfig,
    events: Vec<TranscriptEvent>,
}

impl<'a, P: PageAutomation> ReplayEngine<'a, P> {
    pub fn new(page: &'a mut P, compiled: &CompiledTranscript, config: EngineConfig) -> Self {
        let preferences = ChoicePreferences::from_context(&compiled.context);
        debug!("Choice preferences: {:?}", preferences);
        Self {
            page,
            state: ReplayState::new(compiled.actions.clone(), preferences),
            config,
            events: Vec::new(),
        }
    }

    pub fn into_events(self) -> Vec<TranscriptEvent> {
        self.events
    }

    /// Drive the loop to completion
    pub async fn run(&mut self) -> ReplayOutcome {
        let mut observations = Vec::new();
        let mut tick = 0;

        info!(
            "Replaying {} pending action(s), cap {} tick(s)",
            self.state.queue.len(),
            self.config.max_ticks
        );

        while tick < self.config.max_ticks {
            tick += 1;
            self.wait_network_idle().await;
            self.page.settle(self.config.settle).await;

            let mut labels = self.observe().await;
            debug!("Tick {}: visible {:?}", tick, labels);
            observations.push(TickObservation {
                tick,
                timestamp: compare_qa_common::timestamp(),
                labels: labels.clone(),
                events_before: self.events.len(),
            });

            let mut decision = self.state.decide(&labels);
            if decision.is_none() {
                decision = self.recover(&mut labels).await;
            }

            match decision {
                Some(decision) => {
                    info!("Tick {}: rule {} -> {:?}", tick, decision.rule(), decision);
                    self.execute(&decision).await;
                    self.state.commit(&decision);
                }
                None => {
                    let shot = self.page.screenshot("idle-no-action").await;
                    self.events.push(
                        TranscriptEvent::now(Role::Info, TESTING_AGENT, IDLE_TEXT)
                            .with_screenshot(shot),
                    );
                    info!("Stopping after {} tick(s): nothing left to do", tick);
                    return ReplayOutcome {
                        stop: StopReason::Idle,
                        ticks: tick,
                        observations,
                    };
                }
            }
        }

        info!("Stopping: reached the cap of {} tick(s)", self.config.max_ticks);
        ReplayOutcome {
            stop: StopReason::TickCap,
            ticks: tick,
            observations,
        }
    }

    async fn observe(&mut self) -> Vec<String> {
        self.page
            .list_visible_affordances()
            .await
            .into_iter()
            .map(|a| a.label)
            .collect()
    }

    async fn wait_network_idle(&mut self) {
        let wait = self.config.network_idle;
        if let WaitOutcome::TimedOut { fallback } = self.page.wait_network_idle(wait).await {
            debug!(
                "Network idle not reached within {:?}; waited {:?} instead",
                wait.timeout, fallback
            );
        }
    }

    /// Rule F: scroll and re-observe until some rule applies
    async fn recover(&mut self, labels: &mut Vec<String>) -> Option<Decision> {
        for attempt in 1..=self.config.scroll_attempts {
            self.page.scroll_down(self.config.scroll_px).await;
            self.page.settle(self.config.settle).await;
            *labels = self.observe().await;
            debug!("Scroll {}: visible {:?}", attempt, labels);
            if let Some(decision) = self.state.decide(labels.as_slice()) {
                return Some(decision);
            }
        }
        None
    }

    async fn execute(&mut self, decision: &Decision) {
        let (text, shot_name) = match decision {
            Decision::Progress { label } => {
                let how = self.answer_choice(label, false).await;
                (format!("Progressed via '{}' using {}", label, how), "after-progress")
            }
            Decision::Answer { category, choice } => {
                let how = self.answer_choice(choice, false).await;
                let (question, shot) = match category {
                    Category::TermEnd => ("term end", "after-term-end-answer"),
                    Category::Occupancy => ("occupancy", "after-occupancy-answer"),
                };
                (format!("Answered '{}' -> {} via {}", question, choice, how), shot)
            }
            Decision::Terminal => {
                let how = self.answer_choice(TERMINAL_LABEL, false).await;
                (format!("Chose product via {}", how), "after-check-here")
            }
            Decision::TranscriptChoice { label, .. } => {
                let how = self.answer_choice(label, false).await;
                (
                    format!("Matched transcript choice '{}' via {}", label, how),
                    "after-explicit-choice",
                )
            }
            Decision::FreeText { text, .. } => {
                let shown = match self.type_label(text).await {
                    How::Failed => {
                        warn!("Could not type free text {:?}", text);
                        format!("{} ({})", text, How::Failed)
                    }
                    _ => text.clone(),
                };
                let shot = self.page.screenshot("after-free-text").await;
                self.events.push(
                    TranscriptEvent::now(Role::User, HUMAN_AGENT, shown).with_screenshot(shot),
                );
                return;
            }
        };

        let shot = self.page.screenshot(shot_name).await;
        self.events
            .push(TranscriptEvent::now(Role::Action, TESTING_AGENT, text).with_screenshot(shot));
    }

    /// Answer a choice by typing it, or by clicking it.
    ///
    /// With `prefer_click` the order is reversed. Failure is reported as
    /// [`How::Failed`], never raised.
    pub async fn answer_choice(&mut self, label: &str, prefer_click: bool) -> How {
        let mut outcome = if prefer_click {
            self.click(label).await
        } else {
            self.type_label(label).await
        };
        if outcome == How::Failed {
            outcome = if prefer_click {
                self.type_label(label).await
            } else {
                self.click(label).await
            };
        }
        if outcome == How::Failed {
            warn!("Could not answer {:?} by typing or clicking", label);
        }
        outcome
    }

    async fn type_label(&mut self, label: &str) -> How {
        match self.page.type_and_submit(label).await {
            Interaction::Done => How::Typed,
            other => {
                debug!("Typing {:?} failed: {:?}", label, other);
                How::Failed
            }
        }
    }

    async fn click(&mut self, label: &str) -> How {
        match self.page.click_by_label(label, false).await {
            Interaction::Done => How::Clicked,
            other => {
                debug!("Clicking {:?} failed: {:?}", label, other);
                How::Failed
            }
        }
    }
}
