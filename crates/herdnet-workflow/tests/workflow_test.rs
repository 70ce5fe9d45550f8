use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use herdnet_core::{AnalysisConfig, HerdNetError, InteractionRecord, Result, ThreadId};
use herdnet_workflow::{
    CheckpointStore, ConversationState, EvidenceSummary, Intent, IntentClassifier,
    LiteratureSearch, MemoryCheckpointStore, RecordSource, ResponseGenerator, Stage,
    ThreadStatus, Turn, WorkflowEngine,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("herdnet_workflow=debug")
        .with_test_writer()
        .try_init();
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn herd_records() -> Vec<InteractionRecord> {
    vec![
        InteractionRecord::new("cow1", "cow2", ts(0), ts(10)),
        InteractionRecord::new("cow1", "cow2", ts(20), ts(25)),
        InteractionRecord::new("cow3", "cow4", ts(0), ts(5)),
    ]
}

struct ScriptedClassifier {
    intents: Mutex<VecDeque<Intent>>,
}

impl ScriptedClassifier {
    fn new(intents: impl IntoIterator<Item = Intent>) -> Arc<Self> {
        Arc::new(Self {
            intents: Mutex::new(intents.into_iter().collect()),
        })
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, _turns: &[Turn]) -> Result<Intent> {
        Ok(self
            .intents
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Intent::Question))
    }
}

struct CountingSource {
    calls: AtomicUsize,
}

impl CountingSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RecordSource for CountingSource {
    async fn fetch(&self, _dataset: &str) -> Result<Vec<InteractionRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(herd_records())
    }
}

struct FailingSource;

#[async_trait]
impl RecordSource for FailingSource {
    async fn fetch(&self, dataset: &str) -> Result<Vec<InteractionRecord>> {
        Err(HerdNetError::Collaborator(format!(
            "dataset '{dataset}' unavailable"
        )))
    }
}

struct CannedResponder;

#[async_trait]
impl ResponseGenerator for CannedResponder {
    async fn respond(&self, state: &ConversationState) -> Result<String> {
        Ok(format!(
            "reply (snapshot: {}, simulation: {})",
            state.snapshot.is_some(),
            state.simulation.is_some()
        ))
    }

    async fn render_report(&self, _state: &ConversationState) -> Result<String> {
        Ok("# Herd report".to_string())
    }
}

struct StubLiterature {
    delay: Option<Duration>,
}

#[async_trait]
impl LiteratureSearch for StubLiterature {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<EvidenceSummary>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok((0..k.min(2))
            .map(|i| EvidenceSummary {
                title: format!("{query} [{i}]"),
                summary: "evidence".into(),
                relevance: 1.0 - i as f64 * 0.1,
            })
            .collect())
    }
}

fn engine_with(
    classifier: Arc<ScriptedClassifier>,
    source: Arc<dyn RecordSource>,
    store: Arc<dyn CheckpointStore>,
) -> WorkflowEngine {
    WorkflowEngine::new(
        AnalysisConfig::default(),
        source,
        classifier,
        Arc::new(CannedResponder),
        Arc::new(StubLiterature { delay: None }),
        store,
    )
}

fn load_intent() -> Intent {
    Intent::LoadData {
        dataset: "week-12".into(),
        window: None,
    }
}

#[tokio::test]
async fn first_turn_loads_data_then_responds() {
    init_tracing();
    let store = Arc::new(MemoryCheckpointStore::new());
    let source = CountingSource::new();
    let classifier = ScriptedClassifier::new([Intent::Analyze]);
    let engine = engine_with(classifier, source.clone(), store.clone());
    let thread_id = Uuid::new_v4();

    let outcome = engine.process_message(thread_id, "how is the herd doing?").await.unwrap();
    assert_eq!(outcome.status, ThreadStatus::Done);
    assert_eq!(outcome.stages, vec![Stage::Route, Stage::LoadData, Stage::Respond]);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let state = store.get(thread_id).await.unwrap().unwrap();
    assert_eq!(state.current_stage, Stage::Done);
    assert_eq!(state.dataset.as_deref(), Some("default"));
    assert_eq!(state.records.as_ref().map(Vec::len), Some(3));
}

#[tokio::test]
async fn analyze_then_whatif_walks_the_ladder() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let source = CountingSource::new();
    let classifier = ScriptedClassifier::new([
        load_intent(),
        Intent::Analyze,
        Intent::WhatIf {
            remove: vec!["cow1".into()],
        },
    ]);
    let engine = engine_with(classifier, source, store.clone());
    let thread_id = Uuid::new_v4();

    engine.process_message(thread_id, "load this week's data").await.unwrap();
    let analyze = engine.process_message(thread_id, "analyze the herd").await.unwrap();
    assert_eq!(
        analyze.stages,
        vec![Stage::Route, Stage::ComputeSna, Stage::Respond]
    );

    let whatif = engine
        .process_message(thread_id, "what if cow1 leaves?")
        .await
        .unwrap();
    assert_eq!(
        whatif.stages,
        vec![Stage::Route, Stage::Simulate, Stage::Respond]
    );

    let state = store.get(thread_id).await.unwrap().unwrap();
    let snapshot = state.snapshot.as_ref().unwrap();
    assert_eq!(snapshot.herd.node_count, 4);
    let simulation = state.simulation.as_ref().unwrap();
    assert_eq!(simulation.resulting_snapshot.herd.node_count, 3);
    assert_eq!(
        simulation.resulting_snapshot.individuals["cow2"].isolation_risk,
        1.0
    );
    assert_eq!(simulation.baseline_id, snapshot.id);
}

#[tokio::test]
async fn thread_survives_process_restart_without_reprocessing() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let source = CountingSource::new();
    let thread_id = Uuid::new_v4();

    {
        let classifier = ScriptedClassifier::new([Intent::Analyze]);
        let engine = engine_with(classifier, source.clone(), store.clone());
        let outcome = engine.process_message(thread_id, "hello herd").await.unwrap();
        assert_eq!(outcome.status, ThreadStatus::Done);
    }

    // "restart": a fresh engine over the same durable store
    let classifier = ScriptedClassifier::new([Intent::Question]);
    let engine = engine_with(classifier, source.clone(), store.clone());
    let outcome = engine.process_message(thread_id, "and now?").await.unwrap();
    assert_eq!(outcome.status, ThreadStatus::Done);

    let state = store.get(thread_id).await.unwrap().unwrap();
    assert_eq!(state.turn_seq, 2);
    // turn 1 history is intact and was not reprocessed
    assert_eq!(state.turns.iter().filter(|t| t.content == "hello herd").count(), 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let history = engine.history(thread_id).await.unwrap();
    assert_eq!(history.len(), state.turns.len());
}

#[tokio::test]
async fn stage_failure_routes_to_error_and_keeps_thread_resumable() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let classifier = ScriptedClassifier::new([Intent::Analyze, Intent::Question]);
    let engine = engine_with(classifier, Arc::new(FailingSource), store.clone());
    let thread_id = Uuid::new_v4();

    let outcome = engine.process_message(thread_id, "analyze").await.unwrap();
    assert_eq!(outcome.status, ThreadStatus::Failed);
    assert_eq!(outcome.stages.last(), Some(&Stage::Error));
    assert!(outcome.reply.contains("saved"));

    let state = store.get(thread_id).await.unwrap().unwrap();
    assert_eq!(state.status, ThreadStatus::Failed);
    assert_eq!(state.current_stage, Stage::Error);

    // next message re-enters at route
    let next = engine.process_message(thread_id, "ok, just talk").await.unwrap();
    assert_eq!(next.status, ThreadStatus::Done);
    assert_eq!(next.stages.first(), Some(&Stage::Route));
    let state = store.get(thread_id).await.unwrap().unwrap();
    assert_eq!(state.turn_seq, 2);
}

#[tokio::test]
async fn collaborator_timeout_surfaces_as_stage_failure() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let classifier = ScriptedClassifier::new([Intent::Research {
        query: "mixing stress".into(),
    }]);
    let engine = WorkflowEngine::new(
        AnalysisConfig::default(),
        CountingSource::new(),
        classifier,
        Arc::new(CannedResponder),
        Arc::new(StubLiterature {
            delay: Some(Duration::from_millis(250)),
        }),
        store.clone(),
    )
    .with_collaborator_timeout(Duration::from_millis(10));

    let outcome = engine
        .process_message(Uuid::new_v4(), "any research on this?")
        .await
        .unwrap();
    assert_eq!(outcome.status, ThreadStatus::Failed);
    assert_eq!(outcome.stages.last(), Some(&Stage::Error));
}

#[tokio::test]
async fn research_notes_are_kept_for_the_response() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let classifier = ScriptedClassifier::new([Intent::Research {
        query: "regrouping".into(),
    }]);
    let engine = engine_with(classifier, CountingSource::new(), store.clone());
    let thread_id = Uuid::new_v4();

    let outcome = engine.process_message(thread_id, "what does the literature say?").await.unwrap();
    assert_eq!(
        outcome.stages,
        vec![Stage::Route, Stage::Research, Stage::Respond]
    );
    let state = store.get(thread_id).await.unwrap().unwrap();
    assert_eq!(state.research_notes.len(), 2);
    assert!(state.research_notes[0].title.starts_with("regrouping"));
}

#[tokio::test]
async fn report_intent_renders_a_document() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let classifier = ScriptedClassifier::new([load_intent(), Intent::Analyze, Intent::Report]);
    let engine = engine_with(classifier, CountingSource::new(), store.clone());
    let thread_id = Uuid::new_v4();

    engine.process_message(thread_id, "load data").await.unwrap();
    engine.process_message(thread_id, "analyze").await.unwrap();
    let outcome = engine.process_message(thread_id, "give me a report").await.unwrap();
    assert_eq!(outcome.stages, vec![Stage::Route, Stage::Report]);
    assert_eq!(outcome.reply, "# Herd report");
}

#[tokio::test]
async fn unknown_individual_in_whatif_fails_the_turn_but_keeps_the_baseline() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let classifier = ScriptedClassifier::new([
        load_intent(),
        Intent::Analyze,
        Intent::WhatIf {
            remove: vec!["nonexistent".into()],
        },
    ]);
    let engine = engine_with(classifier, CountingSource::new(), store.clone());
    let thread_id = Uuid::new_v4();

    engine.process_message(thread_id, "load data").await.unwrap();
    engine.process_message(thread_id, "analyze").await.unwrap();
    let before = store.get(thread_id).await.unwrap().unwrap().snapshot;

    let outcome = engine
        .process_message(thread_id, "what if a ghost cow leaves?")
        .await
        .unwrap();
    assert_eq!(outcome.status, ThreadStatus::Failed);

    let state = store.get(thread_id).await.unwrap().unwrap();
    assert_eq!(state.snapshot, before);
    assert!(state.simulation.is_none());
}

/// Store wrapper that records the stage at every checkpoint write.
struct TracingStore {
    inner: MemoryCheckpointStore,
    writes: Mutex<Vec<Stage>>,
}

#[async_trait]
impl CheckpointStore for TracingStore {
    async fn get(&self, thread_id: ThreadId) -> Result<Option<ConversationState>> {
        self.inner.get(thread_id).await
    }

    async fn put(&self, state: &ConversationState) -> Result<()> {
        self.writes.lock().unwrap().push(state.current_stage);
        self.inner.put(state).await
    }

    async fn list_history(&self, thread_id: ThreadId) -> Result<Vec<Turn>> {
        self.inner.list_history(thread_id).await
    }
}

#[tokio::test]
async fn every_stage_is_checkpointed_before_the_next_runs() {
    let store = Arc::new(TracingStore {
        inner: MemoryCheckpointStore::new(),
        writes: Mutex::new(Vec::new()),
    });
    let classifier = ScriptedClassifier::new([Intent::Analyze]);
    let engine = engine_with(classifier, CountingSource::new(), store.clone());

    engine.process_message(Uuid::new_v4(), "analyze").await.unwrap();

    // write-ahead checkpoint of the new turn, then one write per completed
    // stage, each carrying the *next* stage to run
    let writes = store.writes.lock().unwrap().clone();
    assert_eq!(
        writes,
        vec![
            Stage::Route,    // turn accepted, nothing run yet
            Stage::LoadData, // route completed, load_data is next
            Stage::Respond,  // load_data completed
            Stage::Done,     // respond completed, turn finished
        ]
    );
}

#[tokio::test]
async fn distinct_threads_are_independent() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let classifier = ScriptedClassifier::new([Intent::Question, Intent::Question]);
    let engine = Arc::new(engine_with(classifier, CountingSource::new(), store.clone()));

    let t1 = Uuid::new_v4();
    let t2 = Uuid::new_v4();
    let (a, b) = tokio::join!(
        engine.process_message(t1, "hi from one"),
        engine.process_message(t2, "hi from two"),
    );
    a.unwrap();
    b.unwrap();

    let s1 = store.get(t1).await.unwrap().unwrap();
    let s2 = store.get(t2).await.unwrap().unwrap();
    assert_eq!(s1.turn_seq, 1);
    assert_eq!(s2.turn_seq, 1);
    assert!(s1.turns.iter().any(|t| t.content == "hi from one"));
    assert!(s2.turns.iter().all(|t| t.content != "hi from one"));
}
