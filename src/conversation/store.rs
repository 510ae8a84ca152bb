//! Session store for conversation state
//!
//! Conversation state is checkpointed across turns through a pluggable
//! `SessionStore`: an in-memory implementation for tests and a JSON-file
//! implementation for production. There is no global session map — each
//! supervisor owns its store instance.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

use super::ConversationState;

/// Pluggable persistence for conversation state, keyed by thread id.
///
/// `load` returns `None` for unknown threads; the supervisor creates fresh
/// state on first contact. `delete` and `list` are the explicit eviction
/// surface — retention policy is the caller's concern.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the state for a thread, if it exists.
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>>;

    /// Persist the state for its thread.
    async fn save(&self, state: &ConversationState) -> Result<()>;

    /// Remove a thread's state entirely.
    async fn delete(&self, thread_id: &str) -> Result<()>;

    /// List the thread ids currently stored.
    async fn list(&self) -> Result<Vec<String>>;
}

/// In-memory session store without persistence.
///
/// Useful for tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, ConversationState>>>,
}

impl InMemorySessionStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(thread_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(state.thread_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(thread_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().cloned().collect())
    }
}

/// File-backed session store with an in-memory cache in front.
///
/// Each thread is persisted as `<dir>/<sanitized thread id>.json`. The
/// directory is created if it doesn't exist.
pub struct FileSessionStore {
    cache: Arc<RwLock<HashMap<String, ConversationState>>>,
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            dir,
        })
    }

    /// Replace characters that are unsafe in file names.
    fn sanitize(thread_id: &str) -> String {
        thread_id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::sanitize(thread_id)))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        {
            let cache = self.cache.read().await;
            if let Some(state) = cache.get(thread_id) {
                return Ok(Some(state.clone()));
            }
        }

        let path = self.path_for(thread_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let state: ConversationState = serde_json::from_str(&content)?;

        let mut cache = self.cache.write().await;
        cache.insert(thread_id.to_string(), state.clone());
        Ok(Some(state))
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.insert(state.thread_id.clone(), state.clone());
        }

        let path = self.path_for(&state.thread_id);
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.remove(thread_id);
        }

        let path = self.path_for(thread_id);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        Ok(ids)
    }
}
