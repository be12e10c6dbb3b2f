#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod events;
pub mod provider;

pub use events::{Listeners, Subscription};
pub use provider::{
    AuthEvent, AuthProvider, FetchError, FetchedResource, Fetcher, ListOptions, ObjectStore,
    ProviderError, SignUpOutcome, SortBy, SortOrder, UploadOptions,
};

const SEP: char = '/';

/// The authenticated user.
///
/// The identifier scopes every storage path the user owns, the email is
/// informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user identifier issued by the auth provider
    pub id: String,
    /// Email address the account was registered with
    pub email: String,
}

/// Represents a PDF stored under a user's path prefix.
///
/// Records are replaced rather than mutated: a rename produces a new record
/// with a new `id`, the old one disappears from the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Provider assigned identifier, or the object name when none was assigned
    pub id: String,
    /// Object name inside the owner's prefix
    pub name: String,
    /// Public URL of the object
    pub url: String,
    /// Size of the object in bytes
    pub size_bytes: u64,
    /// Creation time as reported by the provider
    pub created_at: Option<DateTime<Utc>>,
}

/// Derived usage metrics for one user's files.
///
/// Always recomputed from a full listing, never patched incrementally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of stored files
    pub total_files: usize,
    /// Sum of all file sizes in bytes
    pub total_storage: u64,
    /// Average file size in bytes, zero when there are no files
    pub avg_file_size: f64,
    /// Most recent creation time among the files
    pub last_upload: Option<DateTime<Utc>>,
}

/// Raw row returned by the object store listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

/// Two level storage key `{owner}/{name}`.
///
/// The only way to address an object, so every path carries the owner's
/// prefix by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    owner: String,
    name: String,
}

impl ObjectPath {
    #[must_use]
    pub fn new(owner: &Identity, name: &str) -> Self {
        Self {
            owner: owner.id.clone(),
            name: name.trim_start_matches(SEP).to_owned(),
        }
    }

    /// Listing prefix for the owner, with the trailing separator.
    #[must_use]
    pub fn prefix(owner: &Identity) -> String {
        format!("{}{SEP}", owner.id)
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{SEP}{}", self.owner, self.name)
    }
}
