//! Background profile extraction
//!
//! After a turn completes, the updater re-reads the turn's transcript and
//! asks the model, constrained to the `record_profile` tool schema, whether
//! it learned anything durable about the user. Existing documents are looked
//! up first and shown to the model, so a re-run over an unchanged transcript
//! patches the existing document instead of inserting a duplicate.
//!
//! The updater runs off the critical path: failures are logged and
//! suppressed, never surfaced to the turn that spawned it. Writes are
//! serialized per namespace so overlapping turns for one user cannot lose
//! updates.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::conversation::{Message, Role};
use crate::error::Result;
use crate::model::{ModelAdapter, ToolSchema};

use super::{ProfileDocument, ProfileNamespace, ProfileStore, UserProfile};

const EXTRACTION_PROMPT: &str = "You maintain a profile of durable facts about the user: \
name, location, job, connections (people they mention), interests. \
Read the conversation and call record_profile if you learned something new or corrected. \
If a matching existing document is listed below, pass its id so the record is patched, \
and include only the fields that changed. If nothing durable was learned, do not call the tool.\n\n\
Existing documents:\n";

/// Extracts and merges durable user facts after each turn.
pub struct ProfileUpdater {
    adapter: Arc<ModelAdapter>,
    store: Arc<dyn ProfileStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

#[derive(Deserialize, Default)]
struct RecordArgs {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    edit_description: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    job: Option<String>,
    #[serde(default)]
    connections: Option<Vec<String>>,
    #[serde(default)]
    interests: Option<Vec<String>>,
}

impl ProfileUpdater {
    /// Create an updater over an adapter and store.
    pub fn new(adapter: Arc<ModelAdapter>, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            adapter,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run extraction for one completed turn.
    ///
    /// `transcript` is the turn's history excluding the final response.
    pub async fn update(&self, ns: &ProfileNamespace, transcript: &[Message]) -> Result<()> {
        let lock = self.lock_for(&ns.key()).await;
        let _guard = lock.lock().await;

        let existing = self.store.search(ns).await?;

        let digest = transcript_digest(transcript);
        if digest.is_empty() {
            return Ok(());
        }

        let mut prompt = EXTRACTION_PROMPT.to_string();
        prompt.push_str(&serde_json::to_string_pretty(&existing)?);

        let messages = vec![Message::system(&prompt), Message::user(&digest)];
        let response = self.adapter.invoke(&messages, &[record_schema()]).await?;

        let call = match response
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.iter().find(|c| c.name == "record_profile"))
        {
            Some(call) => call,
            None => {
                debug!(namespace = %ns.key(), "no durable facts extracted");
                return Ok(());
            }
        };

        let args: RecordArgs = match call.parse_arguments() {
            Ok(args) => args,
            Err(err) => {
                warn!(error = %err, "record_profile arguments were malformed, skipping");
                return Ok(());
            }
        };

        // Resolve the target document: the referenced id if it exists, else
        // the namespace's existing document, else a fresh insert. One
        // document per namespace means an id-less record never duplicates.
        let mut doc = args
            .id
            .as_deref()
            .and_then(|id| existing.iter().find(|d| d.id == id).cloned())
            .or_else(|| existing.into_iter().next())
            .unwrap_or_else(|| ProfileDocument {
                id: Uuid::new_v4().to_string(),
                profile: UserProfile::default(),
            });

        apply_patch(&mut doc.profile, &args);
        debug!(
            namespace = %ns.key(),
            document = %doc.id,
            edit = args.edit_description.as_deref().unwrap_or("(none)"),
            "profile updated"
        );
        self.store.put(ns, doc).await
    }

    /// Spawn extraction in the background, suppressing any failure.
    pub fn spawn_update(self: &Arc<Self>, ns: ProfileNamespace, transcript: Vec<Message>) {
        let updater = self.clone();
        tokio::spawn(async move {
            if let Err(err) = updater.update(&ns, &transcript).await {
                warn!(namespace = %ns.key(), error = %err, "profile update failed");
            }
        });
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Overwrite only the fields the record names.
fn apply_patch(profile: &mut UserProfile, args: &RecordArgs) {
    if let Some(name) = &args.name {
        profile.name = Some(name.clone());
    }
    if let Some(location) = &args.location {
        profile.location = Some(location.clone());
    }
    if let Some(job) = &args.job {
        profile.job = Some(job.clone());
    }
    if let Some(connections) = &args.connections {
        profile.connections = connections.iter().cloned().collect();
    }
    if let Some(interests) = &args.interests {
        profile.interests = interests.iter().cloned().collect();
    }
}

/// Condense a transcript to the user/assistant exchange the extractor reads.
fn transcript_digest(transcript: &[Message]) -> String {
    transcript
        .iter()
        .filter(|m| {
            matches!(m.role, Role::User | Role::Assistant) && !m.content.is_empty()
        })
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn record_schema() -> ToolSchema {
    ToolSchema::new(
        "record_profile",
        "Record durable facts learned about the user, as a new record or a \
         patch to an existing document.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Id of the existing document to patch; omit for a new record"
                },
                "edit_description": {
                    "type": "string",
                    "description": "Short description of what changed"
                },
                "name": { "type": "string" },
                "location": { "type": "string" },
                "job": { "type": "string" },
                "connections": { "type": "array", "items": { "type": "string" } },
                "interests": { "type": "array", "items": { "type": "string" } }
            },
            "required": []
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCall;
    use crate::error::BackendError;
    use crate::model::{ModelResponse, ScriptedBackend};
    use crate::profile::InMemoryProfileStore;

    fn ns() -> ProfileNamespace {
        ProfileNamespace::new("user_profile", "personal", "u1")
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::user("I'm Alice, I work as a data engineer in Berlin"),
            Message::assistant("Nice to meet you, Alice!"),
        ]
    }

    fn record_call(args: &str) -> ModelResponse {
        ModelResponse::with_tools("", vec![ToolCall::new("c1", "record_profile", args)])
    }

    fn fixture() -> (Arc<ScriptedBackend>, Arc<ProfileUpdater>, Arc<InMemoryProfileStore>) {
        let backend = Arc::new(ScriptedBackend::new());
        let store = Arc::new(InMemoryProfileStore::new());
        let updater = Arc::new(ProfileUpdater::new(
            Arc::new(ModelAdapter::new(backend.clone())),
            store.clone(),
        ));
        (backend, updater, store)
    }

    #[tokio::test]
    async fn test_first_extraction_inserts_document() {
        let (backend, updater, store) = fixture();
        backend.push(record_call(
            r#"{"name": "Alice", "job": "data engineer", "location": "Berlin"}"#,
        ));

        updater.update(&ns(), &transcript()).await.unwrap();

        let docs = store.search(&ns()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].profile.name.as_deref(), Some("Alice"));
        assert_eq!(docs[0].profile.location.as_deref(), Some("Berlin"));
    }

    #[tokio::test]
    async fn test_rerun_over_unchanged_transcript_does_not_duplicate() {
        let (backend, updater, store) = fixture();
        // Even a model that forgets to pass the id must not cause a second
        // document: an id-less record patches the namespace's document.
        backend.push(record_call(r#"{"name": "Alice"}"#));
        backend.push(record_call(r#"{"name": "Alice"}"#));

        updater.update(&ns(), &transcript()).await.unwrap();
        updater.update(&ns(), &transcript()).await.unwrap();

        assert_eq!(store.search(&ns()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_patch_overwrites_only_named_fields() {
        let (backend, updater, store) = fixture();
        backend.push(record_call(
            r#"{"name": "Alice", "job": "data engineer", "interests": ["cycling"]}"#,
        ));
        updater.update(&ns(), &transcript()).await.unwrap();

        let id = store.search(&ns()).await.unwrap()[0].id.clone();
        backend.push(record_call(&format!(
            r#"{{"id": "{}", "edit_description": "moved", "location": "Munich"}}"#,
            id
        )));
        updater.update(&ns(), &transcript()).await.unwrap();

        let docs = store.search(&ns()).await.unwrap();
        assert_eq!(docs.len(), 1);
        let profile = &docs[0].profile;
        assert_eq!(profile.location.as_deref(), Some("Munich"));
        // Untouched fields survive the patch.
        assert_eq!(profile.name.as_deref(), Some("Alice"));
        assert_eq!(profile.job.as_deref(), Some("data engineer"));
        assert!(profile.interests.contains("cycling"));
    }

    #[tokio::test]
    async fn test_existing_documents_are_shown_to_the_model() {
        let (backend, updater, store) = fixture();
        store
            .put(
                &ns(),
                ProfileDocument {
                    id: "doc-7".into(),
                    profile: UserProfile {
                        name: Some("Alice".into()),
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();
        backend.push(ModelResponse::text("nothing new"));

        updater.update(&ns(), &transcript()).await.unwrap();

        let request = backend.request(0).unwrap();
        assert!(request[0].content.contains("doc-7"));
    }

    #[tokio::test]
    async fn test_no_tool_call_writes_nothing() {
        let (backend, updater, store) = fixture();
        backend.push(ModelResponse::text("nothing durable here"));

        updater.update(&ns(), &transcript()).await.unwrap();
        assert!(store.search(&ns()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_skipped() {
        let (backend, updater, store) = fixture();
        backend.push(ModelResponse::with_tools(
            "",
            vec![ToolCall::new("c1", "record_profile", "not json")],
        ));

        updater.update(&ns(), &transcript()).await.unwrap();
        assert!(store.search(&ns()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_update_suppresses_failures() {
        let (backend, updater, store) = fixture();
        backend.push_error(BackendError::Auth("bad key".into()));

        updater.spawn_update(ns(), transcript());
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // The failure was swallowed; nothing was written and nothing panicked.
        assert!(store.search(&ns()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_transcript_is_a_noop() {
        let (backend, updater, _store) = fixture();
        updater.update(&ns(), &[]).await.unwrap();
        assert_eq!(backend.request_count(), 0);
    }
}
