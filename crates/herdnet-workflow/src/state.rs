use chrono::{DateTime, Utc};
use herdnet_analysis::{AnalysisSnapshot, SimulationResult};
use herdnet_core::{AnimalId, InteractionRecord, ThreadId, TimeWindow};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EvidenceSummary;

/// Processing stages of one conversation turn. `Route` is the re-entry
/// point for every incoming message; `Done` and `Error` are terminal for a
/// turn while the thread itself stays resumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Route,
    LoadData,
    ComputeSna,
    Simulate,
    Research,
    Respond,
    Report,
    Done,
    Error,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Route => "route",
            Stage::LoadData => "load_data",
            Stage::ComputeSna => "compute_sna",
            Stage::Simulate => "simulate",
            Stage::Research => "research",
            Stage::Respond => "respond",
            Stage::Report => "report",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Discrete intent tag produced by the external classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// Load or refresh interaction data from a named dataset.
    LoadData {
        dataset: String,
        window: Option<TimeWindow>,
    },
    /// Compute or refresh the social network analysis.
    Analyze,
    /// Hypothetical removal of individuals from the herd.
    WhatIf { remove: Vec<AnimalId> },
    /// Literature / evidence lookup.
    Research { query: String },
    /// Document artifact request.
    Report,
    /// Plain question answerable from existing state.
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub stage: Stage,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            stage: Stage::Route,
            at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, stage: Stage) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            stage,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Done,
    Failed,
}

/// Full per-thread conversation state. Mutated exclusively by the workflow
/// engine, which checkpoints a new value after every stage transition; the
/// store never sees a partially-updated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: ThreadId,
    /// Strictly increasing turn sequence number; the checkpoint for turn N
    /// is durable before turn N+1 starts.
    pub turn_seq: u64,
    pub turns: Vec<Turn>,
    pub current_stage: Stage,
    /// Intent routed for the in-flight turn; cleared when the turn ends.
    pub pending_intent: Option<Intent>,
    pub dataset: Option<String>,
    pub window: Option<TimeWindow>,
    pub records: Option<Vec<InteractionRecord>>,
    pub snapshot: Option<AnalysisSnapshot>,
    pub simulation: Option<SimulationResult>,
    pub research_notes: Vec<EvidenceSummary>,
    pub status: ThreadStatus,
}

impl ConversationState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            turn_seq: 0,
            turns: Vec::new(),
            current_stage: Stage::Route,
            pending_intent: None,
            dataset: None,
            window: None,
            records: None,
            snapshot: None,
            simulation: None,
            research_notes: Vec::new(),
            status: ThreadStatus::Active,
        }
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}
