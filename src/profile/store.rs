//! Profile persistence
//!
//! Documents are addressed by (namespace, document id). The file-backed
//! store keeps one JSON file per namespace holding all of its documents.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

use super::{ProfileDocument, ProfileNamespace};

/// Pluggable persistence for profile documents.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch one document by id.
    async fn get(&self, ns: &ProfileNamespace, id: &str) -> Result<Option<ProfileDocument>>;

    /// All documents in a namespace.
    async fn search(&self, ns: &ProfileNamespace) -> Result<Vec<ProfileDocument>>;

    /// Store a document, replacing any previous version with the same id.
    ///
    /// Implementations need not synchronize concurrent writers. Callers that
    /// read-modify-write a namespace must serialize their own access, the
    /// way [`ProfileUpdater`](super::ProfileUpdater) does with its
    /// per-namespace locks.
    async fn put(&self, ns: &ProfileNamespace, doc: ProfileDocument) -> Result<()>;
}

/// In-memory profile store for tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemoryProfileStore {
    docs: Arc<RwLock<HashMap<String, Vec<ProfileDocument>>>>,
}

impl InMemoryProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, ns: &ProfileNamespace, id: &str) -> Result<Option<ProfileDocument>> {
        let docs = self.docs.read().await;
        Ok(docs
            .get(&ns.key())
            .and_then(|v| v.iter().find(|d| d.id == id).cloned()))
    }

    async fn search(&self, ns: &ProfileNamespace) -> Result<Vec<ProfileDocument>> {
        let docs = self.docs.read().await;
        Ok(docs.get(&ns.key()).cloned().unwrap_or_default())
    }

    async fn put(&self, ns: &ProfileNamespace, doc: ProfileDocument) -> Result<()> {
        let mut docs = self.docs.write().await;
        let bucket = docs.entry(ns.key()).or_default();
        if let Some(slot) = bucket.iter_mut().find(|d| d.id == doc.id) {
            *slot = doc;
        } else {
            bucket.push(doc);
        }
        Ok(())
    }
}

/// File-backed profile store: one JSON file per namespace.
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    /// Create a store rooted at `dir`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, ns: &ProfileNamespace) -> PathBuf {
        self.dir.join(format!("{}.json", ns.key()))
    }

    async fn read_all(&self, ns: &ProfileNamespace) -> Result<Vec<ProfileDocument>> {
        let path = self.path_for(ns);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    // Write to a sibling temp file and rename over the target, so a crash
    // mid-write cannot leave a truncated namespace file behind.
    async fn write_all(&self, ns: &ProfileNamespace, docs: &[ProfileDocument]) -> Result<()> {
        let path = self.path_for(ns);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(docs)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get(&self, ns: &ProfileNamespace, id: &str) -> Result<Option<ProfileDocument>> {
        Ok(self.read_all(ns).await?.into_iter().find(|d| d.id == id))
    }

    async fn search(&self, ns: &ProfileNamespace) -> Result<Vec<ProfileDocument>> {
        self.read_all(ns).await
    }

    async fn put(&self, ns: &ProfileNamespace, doc: ProfileDocument) -> Result<()> {
        let mut docs = self.read_all(ns).await?;
        if let Some(slot) = docs.iter_mut().find(|d| d.id == doc.id) {
            *slot = doc;
        } else {
            docs.push(doc);
        }
        self.write_all(ns, &docs).await
    }
}
