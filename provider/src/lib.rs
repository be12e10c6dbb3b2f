#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

//! Adapters that speak the REST dialect of a Supabase compatible backend:
//! the auth service, the object storage API and plain downloads for imports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kernel::ProviderError;
use parking_lot::RwLock;
use reqwest::Client;

pub mod auth;
mod failure;
pub mod fetch;
pub mod resource;
pub mod session_file;
pub mod storage;

pub use auth::HttpAuth;
pub use fetch::HttpFetcher;
pub use session_file::{SessionFile, StoredSession};
pub use storage::HttpStorage;

use resource::Resource;

pub const DEFAULT_BUCKET: &str = "pdfs";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens of the signed in user shared by the auth and storage adapters.
pub(crate) type SessionCell = Arc<RwLock<Option<StoredSession>>>;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Anonymous API key sent with every request
    pub api_key: String,
    pub bucket: String,
    /// Where the session is persisted between runs. `None` keeps it in memory
    pub session_file: Option<PathBuf>,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new<S: Into<String>>(base_url: S, api_key: S) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            bucket: DEFAULT_BUCKET.to_owned(),
            session_file: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Auth, storage and fetch adapters wired to the same session.
pub struct Backend {
    pub auth: Arc<HttpAuth>,
    pub storage: Arc<HttpStorage>,
    pub fetcher: Arc<HttpFetcher>,
}

/// Builds the adapters for `config`.
///
/// # Errors
///
/// Invalid base URL or an HTTP client that cannot be constructed.
pub fn connect(config: &ProviderConfig) -> Result<Backend, ProviderError> {
    let base = Resource::new(&config.base_url)
        .ok_or_else(|| ProviderError::new(format!("invalid base url {}", config.base_url)))?;
    let client = Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| ProviderError::new(e.to_string()))?;
    let session: SessionCell = Arc::default();
    let file = SessionFile::new(config.session_file.clone());

    tracing::debug!("provider at {base}, bucket {}", config.bucket);

    Ok(Backend {
        auth: Arc::new(HttpAuth::new(
            client.clone(),
            base.clone(),
            config.api_key.clone(),
            session.clone(),
            file,
        )),
        storage: Arc::new(HttpStorage::new(
            client.clone(),
            base,
            config.api_key.clone(),
            config.bucket.clone(),
            session,
        )),
        fetcher: Arc::new(HttpFetcher::new(client)),
    })
}
