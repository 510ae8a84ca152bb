//! User profile memory
//!
//! Durable facts about a user (name, location, job, connections, interests)
//! extracted from conversations in the background. Profiles are addressed by
//! a namespace tuple and a document id, stored through a pluggable
//! `ProfileStore`, and updated by patches that touch only named fields.

mod store;
mod updater;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use store::{FileProfileStore, InMemoryProfileStore, ProfileStore};
pub use updater::ProfileUpdater;

/// Key tuple isolating one slice of persisted profile data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileNamespace {
    /// Profile kind (e.g. "user_profile")
    pub kind: String,
    /// Deployment category
    pub category: String,
    /// End user the profile belongs to
    pub user_id: String,
}

impl ProfileNamespace {
    /// Create a namespace for a user.
    pub fn new(kind: &str, category: &str, user_id: &str) -> Self {
        Self {
            kind: kind.to_string(),
            category: category.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// A stable, filesystem-safe key for this namespace.
    pub fn key(&self) -> String {
        format!("{}__{}__{}", self.kind, self.category, self.user_id)
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
}

/// Durable facts about one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where the user is located
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// The user's job or role
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    /// People the user has mentioned
    #[serde(default)]
    pub connections: BTreeSet<String>,
    /// Topics the user cares about
    #[serde(default)]
    pub interests: BTreeSet<String>,
}

/// A stored profile document: the profile plus its id within the namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDocument {
    /// Document id, unique within the namespace
    pub id: String,
    /// The profile content
    pub profile: UserProfile,
}
