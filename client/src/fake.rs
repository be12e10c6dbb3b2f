//! In-memory providers with fault injection for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use kernel::{
    AuthEvent, AuthProvider, FetchError, FetchedResource, Fetcher, Identity, ListOptions,
    Listeners, ObjectEntry, ObjectPath, ObjectStore, ProviderError, SignUpOutcome, SortOrder,
    Subscription, UploadOptions,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

struct Account {
    id: String,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
pub struct FakeAuth {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<Identity>>,
    listeners: Listeners<AuthEvent>,
    calls: AtomicUsize,
    session_check_error: Mutex<Option<String>>,
    sign_out_error: Mutex<Option<String>>,
}

impl FakeAuth {
    pub fn with_account(email: &str, password: &str) -> Self {
        let auth = Self::default();
        auth.accounts.lock().insert(
            email.to_owned(),
            Account {
                id: format!("id-{email}"),
                password: password.to_owned(),
                confirmed: true,
            },
        );
        auth
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_session_check(&self, message: &str) {
        *self.session_check_error.lock() = Some(message.to_owned());
    }

    pub fn fail_sign_out(&self, message: &str) {
        *self.sign_out_error.lock() = Some(message.to_owned());
    }

    /// Simulates a provider push, e.g. another tab signing in.
    pub fn push(&self, event: AuthEvent) {
        *self.session.lock() = event.identity().cloned();
        self.listeners.emit(&event);
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn current_session(&self) -> Result<Option<Identity>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.session_check_error.lock().clone() {
            return Err(ProviderError::new(message));
        }
        Ok(self.session.lock().clone())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock();
        if accounts.contains_key(email) {
            return Err(ProviderError::new("User already registered")
                .with_status(422)
                .with_code("user_already_exists"));
        }
        accounts.insert(
            email.to_owned(),
            Account {
                id: format!("id-{email}"),
                password: password.to_owned(),
                confirmed: false,
            },
        );
        Ok(SignUpOutcome {
            email: email.to_owned(),
            confirmation_pending: true,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let identity = {
            let accounts = self.accounts.lock();
            match accounts.get(email) {
                Some(a) if a.password == password && a.confirmed => Identity {
                    id: a.id.clone(),
                    email: email.to_owned(),
                },
                Some(a) if a.password == password => {
                    return Err(ProviderError::new("Email not confirmed").with_status(400));
                }
                _ => {
                    return Err(ProviderError::new("Invalid login credentials").with_status(400));
                }
            }
        };
        self.push(AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.sign_out_error.lock().clone() {
            return Err(ProviderError::new(message));
        }
        self.push(AuthEvent::SignedOut);
        Ok(())
    }

    fn on_auth_state_change(
        &self,
        callback: Box<dyn Fn(&AuthEvent) + Send + Sync>,
    ) -> Subscription {
        self.listeners.subscribe(move |event| callback(event))
    }
}

struct StoredObject {
    id: String,
    data: Bytes,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    calls: AtomicUsize,
    next_id: AtomicUsize,
    remove_error: Mutex<Option<String>>,
    upload_error: Mutex<Option<String>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn fail_remove(&self, message: &str) {
        *self.remove_error.lock() = Some(message.to_owned());
    }

    pub fn fail_upload(&self, message: &str) {
        *self.upload_error.lock() = Some(message.to_owned());
    }

    /// Makes every listing wait until the returned gate is notified.
    pub fn hold_listings(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock() = Some(gate.clone());
        gate
    }

    /// Puts an object directly, bypassing the call counter.
    pub fn seed(&self, path: &str, data: &[u8], created_at: DateTime<Utc>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().insert(
            path.to_owned(),
            StoredObject {
                id: format!("obj-{id}"),
                data: Bytes::copy_from_slice(data),
                created_at,
            },
        );
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list(
        &self,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<ObjectEntry>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let objects = self.objects.lock();
        let mut entries: Vec<ObjectEntry> = objects
            .iter()
            .filter_map(|(path, o)| {
                let name = path.strip_prefix(prefix)?;
                if name.contains('/') {
                    return None;
                }
                Some(ObjectEntry {
                    name: name.to_owned(),
                    id: Some(o.id.clone()),
                    created_at: Some(o.created_at),
                    size_bytes: Some(o.data.len() as u64),
                })
            })
            .collect();
        if let Some(sort) = &options.sort {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            if sort.order == SortOrder::Desc {
                entries.reverse();
            }
        }
        Ok(entries
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    async fn upload(
        &self,
        path: &ObjectPath,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.upload_error.lock().clone() {
            return Err(ProviderError::new(message));
        }
        let key = path.to_string();
        if !options.upsert && self.objects.lock().contains_key(&key) {
            return Err(ProviderError::new("The resource already exists")
                .with_status(409)
                .with_code("Duplicate"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().insert(
            key,
            StoredObject {
                id: format!("obj-{id}"),
                data,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn download(&self, path: &ObjectPath) -> Result<Bytes, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .get(&path.to_string())
            .map(|o| o.data.clone())
            .ok_or_else(|| ProviderError::new("Object not found").with_status(404))
    }

    async fn remove(&self, paths: &[ObjectPath]) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.remove_error.lock().clone() {
            return Err(ProviderError::new(message));
        }
        let mut objects = self.objects.lock();
        for path in paths {
            objects.remove(&path.to_string());
        }
        Ok(())
    }

    fn public_url(&self, path: &ObjectPath) -> String {
        format!("https://storage.test/object/public/pdfs/{path}")
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    resources: Mutex<HashMap<String, FetchedResource>>,
    transport_error: Mutex<Option<String>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, content_type: &str, data: &[u8]) {
        self.resources.lock().insert(
            url.to_owned(),
            FetchedResource {
                status: 200,
                content_type: Some(content_type.to_owned()),
                data: Bytes::copy_from_slice(data),
            },
        );
    }

    pub fn fail_transport(&self, message: &str) {
        *self.transport_error.lock() = Some(message.to_owned());
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        if let Some(message) = self.transport_error.lock().clone() {
            return Err(FetchError::Transport(message));
        }
        Ok(self
            .resources
            .lock()
            .get(url)
            .cloned()
            .unwrap_or(FetchedResource {
                status: 404,
                content_type: Some("text/html".to_owned()),
                data: Bytes::from_static(b"not found"),
            }))
    }
}
