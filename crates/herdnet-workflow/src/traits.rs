use async_trait::async_trait;
use herdnet_core::{InteractionRecord, Result, ThreadId};
use serde::{Deserialize, Serialize};

use crate::{ConversationState, Intent, Turn};

/// Ranked evidence item from the literature collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub title: String,
    pub summary: String,
    pub relevance: f64,
}

/// Supplies validated, already-typed interaction records for a named
/// dataset.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, dataset: &str) -> Result<Vec<InteractionRecord>>;
}

/// Turns conversation history into a discrete intent tag. Opaque to the
/// core; typically backed by a language model.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, turns: &[Turn]) -> Result<Intent>;
}

/// Renders natural-language replies and document artifacts from the current
/// conversation state. Opaque to the core.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn respond(&self, state: &ConversationState) -> Result<String>;
    async fn render_report(&self, state: &ConversationState) -> Result<String>;
}

/// Literature / evidence lookup, consumed only by the research stage.
#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<EvidenceSummary>>;
}

/// Durable per-thread checkpoint store. `put` must be atomic per key:
/// either the whole updated state is visible or none of it.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, thread_id: ThreadId) -> Result<Option<ConversationState>>;
    async fn put(&self, state: &ConversationState) -> Result<()>;
    async fn list_history(&self, thread_id: ThreadId) -> Result<Vec<Turn>>;
}
