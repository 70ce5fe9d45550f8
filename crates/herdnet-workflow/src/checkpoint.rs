use async_trait::async_trait;
use dashmap::DashMap;
use herdnet_core::{HerdNetError, Result, ThreadId};
use std::path::PathBuf;
use tracing::debug;

use crate::{CheckpointStore, ConversationState, Turn};

/// In-memory checkpoint store. Entry replacement through the shard lock is
/// atomic per key, which is all the trait requires.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    states: DashMap<ThreadId, ConversationState>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, thread_id: ThreadId) -> Result<Option<ConversationState>> {
        Ok(self.states.get(&thread_id).map(|s| s.clone()))
    }

    async fn put(&self, state: &ConversationState) -> Result<()> {
        self.states.insert(state.thread_id, state.clone());
        Ok(())
    }

    async fn list_history(&self, thread_id: ThreadId) -> Result<Vec<Turn>> {
        Ok(self
            .states
            .get(&thread_id)
            .map(|s| s.turns.clone())
            .unwrap_or_default())
    }
}

/// File-backed checkpoint store: one JSON document per thread, written to a
/// staging file and renamed into place so readers see either the old or the
/// new state, never a torn write.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, thread_id: ThreadId) -> PathBuf {
        self.dir.join(format!("{}.json", thread_id))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get(&self, thread_id: ThreadId) -> Result<Option<ConversationState>> {
        let path = self.path_for(thread_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HerdNetError::Io(e)),
        }
    }

    async fn put(&self, state: &ConversationState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(state.thread_id);
        let staging = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!(thread = %state.thread_id, seq = state.turn_seq, "checkpoint written");
        Ok(())
    }

    async fn list_history(&self, thread_id: ThreadId) -> Result<Vec<Turn>> {
        Ok(self
            .get(thread_id)
            .await?
            .map(|s| s.turns)
            .unwrap_or_default())
    }
}
