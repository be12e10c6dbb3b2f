//! Contracts of the external collaborators: the auth service, the object
//! store and plain HTTP fetching for imports.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Identity, ObjectEntry, ObjectPath, Subscription};

pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Failure reported by the auth or storage service.
///
/// `message` is kept verbatim so it can be shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status when the failure came from a response
    pub status: Option<u16>,
    /// Machine readable code when the service sent one
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn code_is(&self, code: &str) -> bool {
        self.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(code))
    }
}

/// Session transition pushed by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Session restored when the provider starts
    InitialSession(Option<Identity>),
    SignedIn(Identity),
    SignedOut,
    TokenRefreshed(Identity),
}

impl AuthEvent {
    /// Identity in effect after the transition.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthEvent::InitialSession(identity) => identity.as_ref(),
            AuthEvent::SignedIn(identity) | AuthEvent::TokenRefreshed(identity) => Some(identity),
            AuthEvent::SignedOut => None,
        }
    }
}

/// Result of a successful registration. No session is established, the
/// account has to be confirmed out of band first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub email: String,
    pub confirmation_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub column: String,
    pub order: SortOrder,
}

impl SortBy {
    #[must_use]
    pub fn name_ascending() -> Self {
        Self {
            column: "name".to_owned(),
            order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    pub offset: usize,
    pub sort: Option<SortBy>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            sort: Some(SortBy::name_ascending()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    /// Replace an existing object at the same path instead of failing
    pub upsert: bool,
}

impl UploadOptions {
    #[must_use]
    pub fn no_overwrite(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_owned(),
            upsert: false,
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Session persisted by the provider, if any.
    async fn current_session(&self) -> Result<Option<Identity>, ProviderError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ProviderError>;

    /// Establishes a session. Implementations emit [`AuthEvent::SignedIn`]
    /// before returning.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    /// Ends the session. Implementations emit [`AuthEvent::SignedOut`].
    async fn sign_out(&self) -> Result<(), ProviderError>;

    fn on_auth_state_change(
        &self,
        callback: Box<dyn Fn(&AuthEvent) + Send + Sync>,
    ) -> Subscription;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list(
        &self,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<ObjectEntry>, ProviderError>;

    async fn upload(
        &self,
        path: &ObjectPath,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<(), ProviderError>;

    async fn download(&self, path: &ObjectPath) -> Result<Bytes, ProviderError>;

    async fn remove(&self, paths: &[ObjectPath]) -> Result<(), ProviderError>;

    fn public_url(&self, path: &ObjectPath) -> String;
}

/// Response of a plain GET against an arbitrary URL.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub status: u16,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FetchedResource {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid url {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Transport(String),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}
