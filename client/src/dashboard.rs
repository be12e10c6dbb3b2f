//! Wires the session, the file registry and the statistics into one store
//! of immutable [`AppState`] snapshots.
//!
//! Every user action goes provider call → [`Action`] → [`reduce`] → new
//! snapshot published on a `watch` channel. Operations may overlap: list
//! and stats responses carry a [`Ticket`] and stale ones are dropped by the
//! reducer, while refreshes still running for a previous identity are
//! cancelled outright. A session pushed by the provider for another account
//! reloads that account's files in a background task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kernel::{
    AuthEvent, AuthProvider, Fetcher, Identity, ObjectStore, SignUpOutcome, StoredFile,
    Subscription,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::registry::{Confirm, FileRegistry, PdfUpload, RegistryConfig};
use crate::session::{SessionManager, CONFIRMATION_MESSAGE};
use crate::state::{reduce, Action, AppState, Ticket};
use crate::stats::StatsAggregator;

type StateSender = Arc<watch::Sender<Arc<AppState>>>;

/// Background reload started for the epoch it was spawned in.
type PendingReload = Arc<Mutex<Option<(u64, JoinHandle<Result<()>>)>>>;

pub struct Dashboard<A: AuthProvider, S: ObjectStore, F: Fetcher> {
    session: SessionManager<A>,
    loader: Loader<S, F>,
    pending: PendingReload,
    subscription: Mutex<Option<Subscription>>,
}

/// The part of the dashboard a session callback can own: listing, stats and
/// the snapshot they feed.
struct Loader<S: ObjectStore, F: Fetcher> {
    registry: Arc<FileRegistry<S, F>>,
    stats: Arc<StatsAggregator<S>>,
    state: StateSender,
    requests: Arc<AtomicU64>,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl<S: ObjectStore, F: Fetcher> Clone for Loader<S, F> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            stats: self.stats.clone(),
            state: self.state.clone(),
            requests: self.requests.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: ObjectStore, F: Fetcher> Loader<S, F> {
    fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    /// Lists the files and recomputes the stats concurrently. Rotating the
    /// cancellation token abandons the work without touching the snapshot.
    async fn refresh(&self) -> Result<()> {
        let epoch = self.epoch();
        let token = self.cancel.lock().clone();
        let files_ticket = self.ticket(epoch);
        let stats_ticket = self.ticket(epoch);

        let work = futures::future::join(self.registry.list(), self.stats.recompute());
        let (files, stats) = tokio::select! {
            () = token.cancelled() => {
                tracing::debug!("refresh for epoch {epoch} cancelled");
                return Ok(());
            }
            results = work => results,
        };

        let files = files.map(|files| {
            self.apply(Action::FilesLoaded {
                ticket: files_ticket,
                files,
            });
        });
        let stats = stats.map(|stats| {
            self.apply(Action::StatsComputed {
                ticket: stats_ticket,
                stats,
            });
        });
        files.and(stats).inspect_err(|e| self.fail_at(epoch, e))
    }

    async fn refresh_stats(&self) -> Result<()> {
        let epoch = self.epoch();
        let ticket = self.ticket(epoch);
        let stats = self
            .stats
            .recompute()
            .await
            .inspect_err(|e| self.fail_at(epoch, e))?;
        self.apply(Action::StatsComputed { ticket, stats });
        Ok(())
    }

    fn ticket(&self, epoch: u64) -> Ticket {
        Ticket {
            epoch,
            request: self.requests.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    fn apply(&self, action: Action) {
        self.state.send_modify(|current| *current = Arc::new(reduce(current, action)));
    }

    fn fail(&self, e: &Error) {
        self.fail_at(self.epoch(), e);
    }

    fn fail_at(&self, epoch: u64, e: &Error) {
        self.apply(Action::Failed {
            epoch,
            message: e.to_string(),
        });
    }

    fn rotate(&self) {
        let mut token = self.cancel.lock();
        token.cancel();
        *token = CancellationToken::new();
    }
}

impl<A, S, F> Dashboard<A, S, F>
where
    A: AuthProvider + 'static,
    S: ObjectStore + 'static,
    F: Fetcher + 'static,
{
    pub fn new(auth: Arc<A>, store: Arc<S>, fetcher: Arc<F>, config: RegistryConfig) -> Self {
        let session = SessionManager::new(auth);
        let page_limit = config.page_limit;
        let registry = FileRegistry::new(store.clone(), fetcher, session.current(), config);
        let stats = StatsAggregator::new(store, session.current(), page_limit);
        let (state, _) = watch::channel(Arc::new(AppState::default()));
        Self {
            session,
            loader: Loader {
                registry: Arc::new(registry),
                stats: Arc::new(stats),
                state: Arc::new(state),
                requests: Arc::new(AtomicU64::new(0)),
                cancel: Arc::new(Mutex::new(CancellationToken::new())),
            },
            pending: Arc::new(Mutex::new(None)),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to session changes, resolves the persisted session and
    /// loads the user's files when somebody is signed in.
    ///
    /// # Errors
    ///
    /// The authentication check failure; the dashboard stays signed out.
    pub async fn start(&self) -> Result<()> {
        {
            let loader = self.loader.clone();
            let pending = self.pending.clone();
            let subscription = self.session.on_session_change(move |event: &AuthEvent| {
                let before = loader.epoch();
                loader.apply(Action::SessionChanged(event.identity().cloned()));
                let epoch = loader.epoch();
                if epoch == before {
                    return;
                }
                loader.rotate();
                if event.identity().is_none() {
                    return;
                }
                match Handle::try_current() {
                    Ok(handle) => {
                        let reload = loader.clone();
                        let task = handle.spawn(async move { reload.refresh().await });
                        *pending.lock() = Some((epoch, task));
                    }
                    Err(_) => tracing::warn!("no runtime to reload files for epoch {epoch}"),
                }
            });
            *self.subscription.lock() = Some(subscription);
        }

        match self.session.get_current_session().await {
            Ok(identity) => {
                let signed_in = identity.is_some();
                self.loader.apply(Action::SessionChanged(identity));
                if signed_in {
                    self.settle().await?;
                }
                Ok(())
            }
            Err(e) => {
                self.loader.fail(&e);
                Err(e)
            }
        }
    }

    /// Drops the session subscription and abandons in-flight refreshes.
    pub fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.loader.cancel.lock().cancel();
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<AppState> {
        self.loader.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<AppState>> {
        self.loader.state.subscribe()
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager<A> {
        &self.session
    }

    #[must_use]
    pub fn registry(&self) -> &FileRegistry<S, F> {
        &self.loader.registry
    }

    /// File of the current listing called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<StoredFile> {
        self.snapshot().files.iter().find(|f| f.name == name).cloned()
    }

    /// # Errors
    ///
    /// See [`SessionManager::sign_up`].
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let outcome = self
            .session
            .sign_up(email, password)
            .await
            .inspect_err(|e| self.loader.fail(e))?;
        self.loader.apply(Action::Notice(CONFIRMATION_MESSAGE.to_owned()));
        Ok(outcome)
    }

    /// # Errors
    ///
    /// See [`SessionManager::sign_in`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self
            .session
            .sign_in(email, password)
            .await
            .inspect_err(|e| self.loader.fail(e))?;
        self.loader.apply(Action::SessionChanged(Some(identity.clone())));
        self.settle().await?;
        Ok(identity)
    }

    /// Local files and stats are cleared whatever the provider answers.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::sign_out`].
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.session.sign_out().await;
        self.loader.apply(Action::SignedOut);
        self.loader.rotate();
        result
    }

    /// Re-lists the files and recomputes the stats concurrently.
    ///
    /// # Errors
    ///
    /// The first failure of the two.
    pub async fn refresh(&self) -> Result<()> {
        self.loader.refresh().await
    }

    /// # Errors
    ///
    /// See [`StatsAggregator::recompute`].
    pub async fn refresh_stats(&self) -> Result<()> {
        self.loader.refresh_stats().await
    }

    /// # Errors
    ///
    /// See [`FileRegistry::upload`].
    pub async fn upload(&self, file: Option<PdfUpload>) -> Result<StoredFile> {
        let stored = self
            .loader
            .registry
            .upload(file)
            .await
            .inspect_err(|e| self.loader.fail(e))?;
        self.refresh().await?;
        Ok(stored)
    }

    /// # Errors
    ///
    /// See [`FileRegistry::import_from_url`].
    pub async fn import_from_url(&self, url: &str) -> Result<StoredFile> {
        let stored = self
            .loader
            .registry
            .import_from_url(url)
            .await
            .inspect_err(|e| self.loader.fail(e))?;
        self.refresh().await?;
        Ok(stored)
    }

    /// A rename that left both copies behind still refreshes the listing so
    /// the duplicate is visible.
    ///
    /// # Errors
    ///
    /// See [`FileRegistry::rename`].
    pub async fn rename(&self, file: &StoredFile, new_base_name: &str) -> Result<StoredFile> {
        match self.loader.registry.rename(file, new_base_name).await {
            Ok(renamed) => {
                self.refresh().await?;
                Ok(renamed)
            }
            Err(e @ Error::RenameIncomplete { .. }) => {
                self.loader.fail(&e);
                if let Err(listing) = self.refresh().await {
                    tracing::warn!("listing after incomplete rename failed: {listing}");
                }
                Err(e)
            }
            Err(e) => {
                self.loader.fail(&e);
                Err(e)
            }
        }
    }

    /// Removes the entry from the listing without re-listing, then
    /// recomputes the stats.
    ///
    /// # Errors
    ///
    /// See [`FileRegistry::delete`].
    pub async fn delete(&self, file: &StoredFile, confirm: &dyn Confirm) -> Result<bool> {
        let epoch = self.loader.epoch();
        let deleted = self
            .loader
            .registry
            .delete(file, confirm)
            .await
            .inspect_err(|e| self.loader.fail(e))?;
        if deleted {
            self.loader.apply(Action::FileRemoved {
                epoch,
                id: file.id.clone(),
            });
            self.refresh_stats().await?;
        }
        Ok(deleted)
    }

    /// Waits for the reload the session callback started for the current
    /// epoch, or refreshes when there is none.
    async fn settle(&self) -> Result<()> {
        let epoch = self.loader.epoch();
        let task = {
            let mut pending = self.pending.lock();
            match pending.take() {
                Some((spawned, task)) if spawned == epoch => Some(task),
                other => {
                    *pending = other;
                    None
                }
            }
        };
        if let Some(task) = task {
            match task.await {
                Ok(result) => return result,
                Err(e) => tracing::warn!("background reload for epoch {epoch} failed: {e}"),
            }
        }
        self.loader.refresh().await
    }
}

impl<A: AuthProvider, S: ObjectStore, F: Fetcher> Drop for Dashboard<A, S, F> {
    fn drop(&mut self) {
        self.loader.cancel.lock().cancel();
    }
}
