//! Email and password authentication against the `/auth/v1` API.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use kernel::{
    AuthEvent, AuthProvider, Identity, Listeners, ProviderError, SignUpOutcome, Subscription,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::failure;
use crate::resource::Resource;
use crate::session_file::{SessionFile, StoredSession};
use crate::SessionCell;

const AUTH_PATH: &str = "auth/v1";
/// Lifetime assumed when the service omits one.
const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct UserBody {
    id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserBody,
}

/// Sign up answers with either a bare user, when confirmation is required,
/// or a full session when the service confirms accounts automatically.
#[derive(Deserialize)]
struct SignUpResponse {
    access_token: Option<String>,
    email: Option<String>,
    user: Option<UserBody>,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> StoredSession {
        let expires_at = self.expires_at.unwrap_or_else(|| {
            Utc::now().timestamp() + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)
        });
        StoredSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: Identity {
                id: self.user.id,
                email: self.user.email.unwrap_or_else(|| fallback_email.to_owned()),
            },
        }
    }
}

pub struct HttpAuth {
    client: Client,
    base: Resource,
    api_key: String,
    session: SessionCell,
    file: SessionFile,
    listeners: Listeners<AuthEvent>,
    restored: AtomicBool,
}

impl HttpAuth {
    pub(crate) fn new(
        client: Client,
        base: Resource,
        api_key: String,
        session: SessionCell,
        file: SessionFile,
    ) -> Self {
        Self {
            client,
            base,
            api_key,
            session,
            file,
            listeners: Listeners::default(),
            restored: AtomicBool::new(false),
        }
    }

    fn endpoint(&self, path: &str) -> Resource {
        let mut r = self.base.clone();
        r.append_path(AUTH_PATH).append_path(path);
        r
    }

    fn token_endpoint(&self, grant_type: &str) -> String {
        let mut r = self.endpoint("token");
        r.query("grant_type", grant_type);
        r.to_string()
    }

    async fn request_token<T: Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &T,
    ) -> Result<TokenResponse, ProviderError> {
        let response = self
            .client
            .post(self.token_endpoint(grant_type))
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| failure::transport(&e))?;
        if !response.status().is_success() {
            return Err(failure::from_response(response).await);
        }
        response.json().await.map_err(|e| failure::transport(&e))
    }

    /// Makes `session` current and persists it. A session that cannot be
    /// written to disk still holds for this process.
    async fn establish(&self, session: StoredSession) {
        if let Err(e) = self.file.save(&session).await {
            tracing::warn!("{e}");
        }
        *self.session.write() = Some(session);
    }

    async fn forget(&self) {
        self.session.write().take();
        if let Err(e) = self.file.clear().await {
            tracing::warn!("{e}");
        }
    }

    async fn refresh(&self, stale: &StoredSession) -> Result<StoredSession, ProviderError> {
        tracing::debug!("refreshing token of {}", stale.user.id);
        let refreshed = self
            .request_token(
                "refresh_token",
                &RefreshRequest {
                    refresh_token: &stale.refresh_token,
                },
            )
            .await?
            .into_session(&stale.user.email);
        self.establish(refreshed.clone()).await;
        self.listeners
            .emit(&AuthEvent::TokenRefreshed(refreshed.user.clone()));
        Ok(refreshed)
    }

    async fn resolve(&self) -> Result<Option<StoredSession>, ProviderError> {
        let cached = self.session.read().clone();
        let session = match cached {
            Some(s) => Some(s),
            None => {
                let loaded = self.file.load().await?;
                if let Some(s) = &loaded {
                    *self.session.write() = Some(s.clone());
                }
                loaded
            }
        };

        match session {
            Some(s) if s.is_expired() => match self.refresh(&s).await {
                Ok(refreshed) => Ok(Some(refreshed)),
                Err(e) => {
                    tracing::warn!("session of {} could not be refreshed: {e}", s.user.id);
                    self.forget().await;
                    self.listeners.emit(&AuthEvent::SignedOut);
                    Err(e)
                }
            },
            other => Ok(other),
        }
    }
}

#[async_trait]
impl AuthProvider for HttpAuth {
    async fn current_session(&self) -> Result<Option<Identity>, ProviderError> {
        let identity = self.resolve().await?.map(|s| s.user);
        if !self.restored.swap(true, Ordering::SeqCst) {
            self.listeners
                .emit(&AuthEvent::InitialSession(identity.clone()));
        }
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ProviderError> {
        let response = self
            .client
            .post(self.endpoint("signup").to_string())
            .header("apikey", &self.api_key)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(|e| failure::transport(&e))?;
        if !response.status().is_success() {
            return Err(failure::from_response(response).await);
        }
        let body: SignUpResponse = response.json().await.map_err(|e| failure::transport(&e))?;
        let email = body
            .user
            .and_then(|u| u.email)
            .or(body.email)
            .unwrap_or_else(|| email.to_owned());
        tracing::info!("account {email} registered");
        Ok(SignUpOutcome {
            email,
            confirmation_pending: body.access_token.is_none(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let session = self
            .request_token("password", &Credentials { email, password })
            .await?
            .into_session(email);
        let identity = session.user.clone();
        self.establish(session).await;
        self.restored.store(true, Ordering::SeqCst);
        self.listeners.emit(&AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let cached = self.session.read().clone();
        let session = match cached {
            Some(s) => Some(s),
            None => self.file.load().await.unwrap_or_default(),
        };

        let mut result = Ok(());
        if let Some(session) = session {
            let response = self
                .client
                .post(self.endpoint("logout").to_string())
                .header("apikey", &self.api_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            result = match response {
                Ok(r) if r.status().is_success() => Ok(()),
                // token already revoked or expired, nothing left to end remotely
                Ok(r)
                    if matches!(
                        r.status(),
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
                    ) =>
                {
                    Ok(())
                }
                Ok(r) => Err(failure::from_response(r).await),
                Err(e) => Err(failure::transport(&e)),
            };
        }

        self.forget().await;
        self.listeners.emit(&AuthEvent::SignedOut);
        result
    }

    fn on_auth_state_change(
        &self,
        callback: Box<dyn Fn(&AuthEvent) + Send + Sync>,
    ) -> Subscription {
        self.listeners.subscribe(callback)
    }
}
