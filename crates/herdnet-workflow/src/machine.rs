use dashmap::DashMap;
use herdnet_analysis::{MetricsEngine, SimulationEngine};
use herdnet_core::{AnalysisConfig, HerdNetError, Result, ThreadId};
use herdnet_graph::GraphBuilder;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    CheckpointStore, ConversationState, Intent, IntentClassifier, LiteratureSearch,
    RecordSource, ResponseGenerator, Stage, ThreadStatus, Turn,
};

const MAX_STEPS_PER_TURN: usize = 8;
const FALLBACK_MESSAGE: &str =
    "Sorry, something went wrong while handling that request. Your conversation is saved; \
     please try again or rephrase.";

/// Pure routing decision: current state completeness plus the classified
/// intent select exactly one next stage for the turn.
pub fn route(state: &ConversationState, intent: &Intent) -> Stage {
    let has_data = state.records.is_some();
    let has_snapshot = state.snapshot.is_some();
    match intent {
        Intent::LoadData { .. } => Stage::LoadData,
        Intent::Analyze | Intent::WhatIf { .. } | Intent::Report if !has_data => Stage::LoadData,
        Intent::Analyze | Intent::WhatIf { .. } | Intent::Report if !has_snapshot => {
            Stage::ComputeSna
        }
        Intent::WhatIf { .. } => Stage::Simulate,
        Intent::Report => Stage::Report,
        Intent::Research { .. } => Stage::Research,
        Intent::Analyze | Intent::Question => Stage::Respond,
    }
}

/// Where control goes after a stage finishes its own work.
pub fn successor(stage: Stage, intent: Option<&Intent>) -> Stage {
    match stage {
        Stage::Route => unreachable!("route picks its successor from the intent"),
        Stage::LoadData | Stage::ComputeSna | Stage::Simulate | Stage::Research => {
            if matches!(intent, Some(Intent::Report)) {
                Stage::Report
            } else {
                Stage::Respond
            }
        }
        Stage::Respond | Stage::Report => Stage::Done,
        Stage::Done | Stage::Error => stage,
    }
}

fn routing_reason(next: Stage) -> &'static str {
    match next {
        Stage::LoadData => "no usable interaction data in this conversation; loading data first",
        Stage::ComputeSna => {
            "interaction data is loaded but no analysis snapshot exists; computing network metrics"
        }
        Stage::Simulate => "hypothetical removal requested; running a what-if simulation",
        Stage::Research => "evidence requested; consulting the literature collaborator",
        Stage::Report => "document artifact requested; rendering a report",
        _ => "answerable from existing conversation state; responding directly",
    }
}

/// Result of processing one inbound message.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub status: ThreadStatus,
    /// Stages executed this turn, in order.
    pub stages: Vec<Stage>,
}

/// Drives conversations through the stage machine.
///
/// One turn processes one inbound message. Stages run one at a time; the
/// full conversation state is checkpointed after every stage completes and
/// before the next one is invoked, so a crash resumes at the last completed
/// stage instead of re-running a stage with external side effects. Turns on
/// the same thread are serialized through a per-thread lock; distinct
/// threads share nothing mutable.
pub struct WorkflowEngine {
    records: Arc<dyn RecordSource>,
    classifier: Arc<dyn IntentClassifier>,
    responder: Arc<dyn ResponseGenerator>,
    literature: Arc<dyn LiteratureSearch>,
    store: Arc<dyn CheckpointStore>,
    builder: GraphBuilder,
    metrics: MetricsEngine,
    simulation: SimulationEngine,
    turn_locks: DashMap<ThreadId, Arc<Mutex<()>>>,
    collaborator_timeout: Duration,
    evidence_limit: usize,
    /// Dataset fetched when a data-dependent intent arrives before any
    /// explicit load request named one.
    default_dataset: String,
}

impl WorkflowEngine {
    pub fn new(
        config: AnalysisConfig,
        records: Arc<dyn RecordSource>,
        classifier: Arc<dyn IntentClassifier>,
        responder: Arc<dyn ResponseGenerator>,
        literature: Arc<dyn LiteratureSearch>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let metrics = MetricsEngine::new(config.clone());
        Self {
            records,
            classifier,
            responder,
            literature,
            store,
            builder: GraphBuilder::from_config(&config),
            simulation: SimulationEngine::new(metrics.clone()),
            metrics,
            turn_locks: DashMap::new(),
            collaborator_timeout: Duration::from_secs(30),
            evidence_limit: 5,
            default_dataset: "default".to_string(),
        }
    }

    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    pub fn with_default_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.default_dataset = dataset.into();
        self
    }

    /// Process one inbound message on a thread. Creates the thread on first
    /// contact; if a previous turn was interrupted mid-flight, it is drained
    /// from its last durable checkpoint before the new message starts.
    pub async fn process_message(&self, thread_id: ThreadId, message: &str) -> Result<TurnOutcome> {
        let lock = self
            .turn_locks
            .entry(thread_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let outcome = {
            let _guard = lock.lock().await;
            self.process_locked(thread_id, message).await
        };
        drop(lock);
        // Keep the registry bounded: the entry is only retained while
        // another turn holds or awaits the lock.
        self.turn_locks
            .remove_if(&thread_id, |_, l| Arc::strong_count(l) == 1);
        outcome
    }

    async fn process_locked(&self, thread_id: ThreadId, message: &str) -> Result<TurnOutcome> {
        let mut state = self
            .store
            .get(thread_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(thread_id));

        if state.status == ThreadStatus::Active
            && !state.current_stage.is_terminal()
            && !state.turns.is_empty()
        {
            info!(thread = %thread_id, stage = %state.current_stage, "draining interrupted turn");
            self.run_turn(&mut state, &mut Vec::new()).await?;
        }

        state.turn_seq += 1;
        state.turns.push(Turn::user(message));
        state.current_stage = Stage::Route;
        state.pending_intent = None;
        state.status = ThreadStatus::Active;
        // Write-ahead: turn N is durable before any of its stages run.
        self.store.put(&state).await?;

        let mut stages = Vec::new();
        let reply = self.run_turn(&mut state, &mut stages).await?;
        Ok(TurnOutcome {
            reply,
            status: state.status,
            stages,
        })
    }

    pub async fn history(&self, thread_id: ThreadId) -> Result<Vec<Turn>> {
        self.store.list_history(thread_id).await
    }

    async fn run_turn(
        &self,
        state: &mut ConversationState,
        trace: &mut Vec<Stage>,
    ) -> Result<String> {
        let mut reply = String::new();
        for _ in 0..MAX_STEPS_PER_TURN {
            let stage = state.current_stage;
            if stage.is_terminal() {
                break;
            }
            trace.push(stage);
            match self.run_stage(state).await {
                Ok(Some(text)) => reply = text,
                Ok(None) => {}
                Err(err) => {
                    warn!(thread = %state.thread_id, %stage, %err, "stage failed, routing turn to error");
                    state.status = ThreadStatus::Failed;
                    state.current_stage = Stage::Error;
                    state.pending_intent = None;
                    state
                        .turns
                        .push(Turn::assistant(FALLBACK_MESSAGE, Stage::Error));
                    self.store.put(state).await?;
                    trace.push(Stage::Error);
                    return Ok(FALLBACK_MESSAGE.to_string());
                }
            }
            // Checkpoint the completed stage before the next one is invoked.
            self.store.put(state).await?;
        }
        Ok(reply)
    }

    /// Execute the current stage exactly once and advance `current_stage`.
    /// Returns the user-visible reply when the stage produced one.
    async fn run_stage(&self, state: &mut ConversationState) -> Result<Option<String>> {
        let stage = state.current_stage;
        match stage {
            Stage::Route => {
                let intent = self
                    .with_timeout(stage, self.classifier.classify(&state.turns))
                    .await?;
                let next = route(state, &intent);
                info!(thread = %state.thread_id, %next, "workflow transition");
                state
                    .turns
                    .push(Turn::assistant(routing_reason(next), Stage::Route));
                state.pending_intent = Some(intent);
                state.current_stage = next;
                Ok(None)
            }
            Stage::LoadData => {
                let (dataset, window) = match &state.pending_intent {
                    Some(Intent::LoadData { dataset, window }) => (dataset.clone(), *window),
                    _ => match &state.dataset {
                        Some(dataset) => (dataset.clone(), state.window),
                        None => (self.default_dataset.clone(), state.window),
                    },
                };
                let records = self
                    .with_timeout(stage, self.records.fetch(&dataset))
                    .await?;
                let loaded = records.len();
                state.dataset = Some(dataset.clone());
                state.window = window;
                state.records = Some(records);
                // new data invalidates previous analysis
                state.snapshot = None;
                state.simulation = None;
                state.turns.push(Turn::assistant(
                    format!("Loaded {loaded} interaction records from '{dataset}'."),
                    stage,
                ));
                state.current_stage = successor(stage, state.pending_intent.as_ref());
                Ok(None)
            }
            Stage::ComputeSna => {
                let records = state.records.as_ref().ok_or_else(|| {
                    HerdNetError::StageExecution {
                        stage: stage.to_string(),
                        message: "no interaction data loaded".into(),
                    }
                })?;
                let graph = self.builder.build(records, state.window)?;
                let snapshot = self.metrics.compute_windowed(&graph, state.window);
                state.turns.push(Turn::assistant(
                    format!(
                        "Computed network metrics: {} individuals, {} edges, {} communities.",
                        snapshot.herd.node_count,
                        snapshot.herd.edge_count,
                        snapshot.herd.community_count
                    ),
                    stage,
                ));
                state.snapshot = Some(snapshot);
                state.current_stage = successor(stage, state.pending_intent.as_ref());
                Ok(None)
            }
            Stage::Simulate => {
                let remove = match &state.pending_intent {
                    Some(Intent::WhatIf { remove }) => remove.clone(),
                    _ => {
                        return Err(HerdNetError::StageExecution {
                            stage: stage.to_string(),
                            message: "simulation stage reached without a what-if intent".into(),
                        })
                    }
                };
                let baseline =
                    state
                        .snapshot
                        .as_ref()
                        .ok_or_else(|| HerdNetError::StageExecution {
                            stage: stage.to_string(),
                            message: "no baseline snapshot to simulate against".into(),
                        })?;
                let removed: BTreeSet<_> = remove.into_iter().collect();
                let result = self.simulation.simulate(baseline, &removed)?;
                state.turns.push(Turn::assistant(
                    format!(
                        "Removed {} individual(s); network now has {} nodes and {} edges.",
                        result.removed.len(),
                        result.resulting_snapshot.herd.node_count,
                        result.resulting_snapshot.herd.edge_count
                    ),
                    stage,
                ));
                state.simulation = Some(result);
                state.current_stage = successor(stage, state.pending_intent.as_ref());
                Ok(None)
            }
            Stage::Research => {
                let query = match &state.pending_intent {
                    Some(Intent::Research { query }) => query.clone(),
                    _ => {
                        return Err(HerdNetError::StageExecution {
                            stage: stage.to_string(),
                            message: "research stage reached without a research intent".into(),
                        })
                    }
                };
                let notes = self
                    .with_timeout(stage, self.literature.search(&query, self.evidence_limit))
                    .await?;
                state.turns.push(Turn::assistant(
                    format!("Collected {} evidence summaries.", notes.len()),
                    stage,
                ));
                state.research_notes = notes;
                state.current_stage = successor(stage, state.pending_intent.as_ref());
                Ok(None)
            }
            Stage::Respond => {
                let text = self
                    .with_timeout(stage, self.responder.respond(state))
                    .await?;
                state.turns.push(Turn::assistant(&text, stage));
                state.current_stage = Stage::Done;
                state.status = ThreadStatus::Done;
                state.pending_intent = None;
                Ok(Some(text))
            }
            Stage::Report => {
                let text = self
                    .with_timeout(stage, self.responder.render_report(state))
                    .await?;
                state.turns.push(Turn::assistant(&text, stage));
                state.current_stage = Stage::Done;
                state.status = ThreadStatus::Done;
                state.pending_intent = None;
                Ok(Some(text))
            }
            Stage::Done | Stage::Error => Ok(None),
        }
    }

    async fn with_timeout<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.collaborator_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(HerdNetError::StageExecution {
                stage: stage.to_string(),
                message: format!(
                    "collaborator call exceeded {:?} deadline",
                    self.collaborator_timeout
                ),
            }),
        }
    }
}
