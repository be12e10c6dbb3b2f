//! Tracks who is signed in, mirroring the auth provider's pushed state.

use std::sync::Arc;

use kernel::{AuthEvent, AuthProvider, Identity, ProviderError, SignUpOutcome, Subscription};
use parking_lot::RwLock;
use validator::ValidateEmail;

use crate::error::{Error, Result};

pub const CONFIRMATION_MESSAGE: &str = "Check your email for a confirmation link.";

const ALREADY_REGISTERED_CODES: &[&str] = &["user_already_exists", "email_exists"];
const BAD_FORMAT_CODES: &[&str] = &["validation_failed", "weak_password", "email_address_invalid"];

/// Shared read handle on the resolved identity.
///
/// Cloned into every component that needs to scope work to the user.
#[derive(Clone, Default)]
pub struct CurrentIdentity {
    inner: Arc<RwLock<Option<Identity>>>,
}

impl CurrentIdentity {
    #[must_use]
    pub fn get(&self) -> Option<Identity> {
        self.inner.read().clone()
    }

    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] when nobody is signed in.
    pub fn require(&self) -> Result<Identity> {
        self.get().ok_or(Error::NotAuthenticated)
    }

    pub(crate) fn set(&self, identity: Option<Identity>) {
        *self.inner.write() = identity;
    }
}

pub struct SessionManager<A: AuthProvider> {
    auth: Arc<A>,
    current: CurrentIdentity,
    _tracking: Subscription,
}

impl<A: AuthProvider + 'static> SessionManager<A> {
    pub fn new(auth: Arc<A>) -> Self {
        let current = CurrentIdentity::default();
        let tracked = current.clone();
        let tracking = auth.on_auth_state_change(Box::new(move |event: &AuthEvent| {
            tracked.set(event.identity().cloned());
        }));
        Self {
            auth,
            current,
            _tracking: tracking,
        }
    }

    #[must_use]
    pub fn current(&self) -> CurrentIdentity {
        self.current.clone()
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.current.get()
    }

    /// Asks the provider for a persisted session. A failed check leaves the
    /// identity unresolved.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] when the check itself failed.
    pub async fn get_current_session(&self) -> Result<Option<Identity>> {
        match self.auth.current_session().await {
            Ok(identity) => {
                self.current.set(identity.clone());
                Ok(identity)
            }
            Err(e) => {
                tracing::error!("Error checking session: {e}");
                Err(e.into())
            }
        }
    }

    /// Registers `callback` for every session transition. Keep the returned
    /// subscription for as long as the callback's state is alive.
    pub fn on_session_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.auth.on_auth_state_change(Box::new(callback))
    }

    /// # Errors
    ///
    /// [`Error::InvalidCredentialsFormat`], [`Error::EmailAlreadyRegistered`]
    /// or the provider's message.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        check_credentials(email, password)?;
        let outcome = self
            .auth
            .sign_up(email.trim(), password)
            .await
            .map_err(classify_sign_up_error)?;
        tracing::info!(
            "account {} registered, confirmation pending: {}",
            outcome.email,
            outcome.confirmation_pending
        );
        Ok(outcome)
    }

    /// # Errors
    ///
    /// The provider's message verbatim.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self.auth.sign_in(email.trim(), password).await?;
        self.current.set(Some(identity.clone()));
        tracing::info!("signed in as {}", identity.email);
        Ok(identity)
    }

    /// Ends the remote session. The local identity is cleared even when the
    /// provider call fails.
    ///
    /// # Errors
    ///
    /// The provider's message verbatim.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.auth.sign_out().await;
        self.current.set(None);
        match result {
            Ok(()) => {
                tracing::info!("signed out");
                Ok(())
            }
            Err(e) => {
                tracing::error!("sign out failed: {e}");
                Err(e.into())
            }
        }
    }
}

fn check_credentials(email: &str, password: &str) -> Result<()> {
    let email = email.trim();
    if !email.validate_email() {
        return Err(Error::InvalidCredentialsFormat(format!(
            "{email:?} is not an email address"
        )));
    }
    if password.is_empty() {
        return Err(Error::InvalidCredentialsFormat(
            "password must not be empty".to_owned(),
        ));
    }
    Ok(())
}

fn classify_sign_up_error(e: ProviderError) -> Error {
    if ALREADY_REGISTERED_CODES.iter().any(|c| e.code_is(c))
        || e.message.to_lowercase().contains("already registered")
    {
        Error::EmailAlreadyRegistered
    } else if BAD_FORMAT_CODES.iter().any(|c| e.code_is(c)) || e.status == Some(422) {
        Error::InvalidCredentialsFormat(e.message)
    } else {
        Error::Provider(e.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeAuth;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[rstest]
    #[case("user@example.com", "secret", true)]
    #[case(" user@example.com ", "secret", true)]
    #[case("user@localhost", "secret", true)]
    #[case("userexample.com", "secret", false)]
    #[case("@example.com", "secret", false)]
    #[case("user@", "secret", false)]
    #[case("us er@example.com", "secret", false)]
    #[case("a@b@c", "secret", false)]
    #[case("a@b.", "secret", false)]
    #[case("a@-x", "secret", false)]
    #[case("a@x-.org", "secret", false)]
    #[case("user@example.com", "", false)]
    #[trace]
    fn credentials_format(#[case] email: &str, #[case] password: &str, #[case] valid: bool) {
        // Act
        let result = check_credentials(email, password);

        // Assert
        assert_eq!(result.is_ok(), valid);
    }

    #[rstest]
    #[case(ProviderError::new("User already registered").with_status(422), Error::EmailAlreadyRegistered)]
    #[case(ProviderError::new("taken").with_code("email_exists"), Error::EmailAlreadyRegistered)]
    #[case(
        ProviderError::new("Password should be at least 6 characters").with_code("weak_password"),
        Error::InvalidCredentialsFormat("Password should be at least 6 characters".into())
    )]
    #[case(
        ProviderError::new("Unable to validate email address: invalid format").with_status(422),
        Error::InvalidCredentialsFormat("Unable to validate email address: invalid format".into())
    )]
    #[case(ProviderError::new("Signups not allowed").with_status(403), Error::Provider("Signups not allowed".into()))]
    #[trace]
    fn sign_up_errors_are_classified(#[case] source: ProviderError, #[case] expected: Error) {
        // Act
        let error = classify_sign_up_error(source);

        // Assert
        assert_eq!(error, expected);
    }

    #[tokio::test]
    async fn sign_up_does_not_establish_session() {
        // Arrange
        let auth = Arc::new(FakeAuth::default());
        let session = SessionManager::new(auth.clone());

        // Act
        let outcome = session.sign_up("new@example.com", "secret").await.unwrap();

        // Assert
        assert!(outcome.confirmation_pending);
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn sign_up_twice_reports_already_registered() {
        // Arrange
        let auth = Arc::new(FakeAuth::default());
        let session = SessionManager::new(auth);
        session.sign_up("new@example.com", "secret").await.unwrap();

        // Act
        let result = session.sign_up("new@example.com", "secret").await;

        // Assert
        assert_eq!(result, Err(Error::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn sign_up_with_bad_email_never_reaches_provider() {
        // Arrange
        let auth = Arc::new(FakeAuth::default());
        let session = SessionManager::new(auth.clone());

        // Act
        let result = session.sign_up("nope", "secret").await;

        // Assert
        assert!(matches!(result, Err(Error::InvalidCredentialsFormat(_))));
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn sign_in_resolves_identity_through_notification() {
        // Arrange
        let auth = Arc::new(FakeAuth::with_account("a@example.com", "pw"));
        let session = SessionManager::new(auth.clone());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let _subscription = session.on_session_change(move |event| {
            if matches!(event, AuthEvent::SignedIn(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Act
        let identity = session.sign_in("a@example.com", "pw").await.unwrap();

        // Assert
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(session.identity(), Some(identity));
    }

    #[tokio::test]
    async fn sign_in_failure_is_verbatim() {
        // Arrange
        let auth = Arc::new(FakeAuth::with_account("a@example.com", "pw"));
        let session = SessionManager::new(auth);

        // Act
        let result = session.sign_in("a@example.com", "wrong").await;

        // Assert
        assert_eq!(result, Err(Error::Provider("Invalid login credentials".into())));
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn sign_in_with_malformed_email_is_answered_by_provider() {
        // Arrange
        let auth = Arc::new(FakeAuth::with_account("a@example.com", "pw"));
        let session = SessionManager::new(auth.clone());

        // Act
        let result = session.sign_in("alice", "pw").await;

        // Assert
        assert_eq!(result, Err(Error::Provider("Invalid login credentials".into())));
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn sign_out_clears_identity_even_when_provider_fails() {
        // Arrange
        let auth = Arc::new(FakeAuth::with_account("a@example.com", "pw"));
        let session = SessionManager::new(auth.clone());
        session.sign_in("a@example.com", "pw").await.unwrap();
        auth.fail_sign_out("network down");

        // Act
        let result = session.sign_out().await;

        // Assert
        assert!(result.is_err());
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn failed_session_check_leaves_identity_unresolved() {
        // Arrange
        let auth = Arc::new(FakeAuth::default());
        auth.fail_session_check("token endpoint unreachable");
        let session = SessionManager::new(auth);

        // Act
        let result = session.get_current_session().await;

        // Assert
        assert!(result.is_err());
        assert!(session.identity().is_none());
        assert_eq!(session.current().require(), Err(Error::NotAuthenticated));
    }

    #[tokio::test]
    async fn unsubscribed_listener_is_not_called() {
        // Arrange
        let auth = Arc::new(FakeAuth::with_account("a@example.com", "pw"));
        let session = SessionManager::new(auth);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let subscription = session.on_session_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();

        // Act
        session.sign_in("a@example.com", "pw").await.unwrap();
        session.sign_out().await.unwrap();

        // Assert
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
