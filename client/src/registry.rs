//! The signed in user's PDFs, addressed under the `{identity}/` prefix.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use kernel::provider::DEFAULT_PAGE_LIMIT;
use kernel::{
    Fetcher, Identity, ListOptions, ObjectEntry, ObjectPath, ObjectStore, SortBy, StoredFile,
    UploadOptions,
};
use parking_lot::Mutex;
use url::Url;

use crate::error::{Error, Result, ValidationError};
use crate::session::CurrentIdentity;

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const DEFAULT_EXTENSION: &str = "pdf";

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Entries fetched per listing call
    pub page_limit: usize,
    pub max_upload_bytes: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

/// A local file picked for upload.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Interactive confirmation asked before destructive operations.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub struct FileRegistry<S: ObjectStore, F: Fetcher> {
    store: Arc<S>,
    fetcher: Arc<F>,
    identity: CurrentIdentity,
    config: RegistryConfig,
    in_flight: InFlight,
    last_stamp: Mutex<i64>,
}

impl<S: ObjectStore, F: Fetcher> FileRegistry<S, F> {
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<F>,
        identity: CurrentIdentity,
        config: RegistryConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            identity,
            config,
            in_flight: InFlight::default(),
            last_stamp: Mutex::new(0),
        }
    }

    /// First page of the user's files, sorted by name.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] or the provider's message.
    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        self.list_page(0).await
    }

    /// One page of the user's files starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] or the provider's message.
    pub async fn list_page(&self, offset: usize) -> Result<Vec<StoredFile>> {
        let identity = self.identity.require()?;
        let options = ListOptions {
            limit: self.config.page_limit,
            offset,
            sort: Some(SortBy::name_ascending()),
        };
        let entries = self
            .store
            .list(&ObjectPath::prefix(&identity), &options)
            .await
            .map_err(|e| {
                tracing::error!("Error listing PDFs: {e}");
                Error::from(e)
            })?;

        if entries.is_empty() && offset == 0 {
            tracing::info!("No PDFs found for user: {}", identity.id);
        } else if entries.len() >= self.config.page_limit {
            tracing::warn!(
                "listing for {} filled the page ({} entries), files past offset {} are not shown",
                identity.id,
                entries.len(),
                offset + entries.len()
            );
        }

        Ok(entries
            .into_iter()
            .map(|entry| self.stored_file(&identity, entry))
            .collect())
    }

    /// Validates and stores a new PDF under a fresh timestamped name.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] before any provider call,
    /// [`Error::NotAuthenticated`] or the provider's message.
    pub async fn upload(&self, file: Option<PdfUpload>) -> Result<StoredFile> {
        let file = validate_upload(file, self.config.max_upload_bytes)?;
        let identity = self.identity.require()?;
        let extension = extension_of(&file.file_name);
        self.store_new(&identity, extension, file.data, &file.content_type)
            .await
    }

    /// Copies a remotely hosted PDF into the user's storage. The source is
    /// only read.
    ///
    /// # Errors
    ///
    /// [`Error::Network`], [`Error::DownloadFailed`], [`Error::NotAPdf`],
    /// [`Error::Validation`] for oversized content or the provider's message.
    pub async fn import_from_url(&self, source_url: &str) -> Result<StoredFile> {
        let identity = self.identity.require()?;
        let resource = self.fetcher.fetch(source_url).await.map_err(|e| {
            tracing::error!("Save error: {e}");
            Error::from(e)
        })?;

        if !resource.is_success() {
            tracing::error!("Save error: {source_url} answered {}", resource.status);
            return Err(Error::DownloadFailed {
                status: resource.status,
            });
        }
        let content_type = resource.content_type.unwrap_or_default();
        if !is_pdf(&content_type) {
            return Err(Error::NotAPdf { content_type });
        }
        check_size(resource.data.len() as u64, self.config.max_upload_bytes)?;

        let extension = extension_from_url(source_url);
        self.store_new(&identity, &extension, resource.data, PDF_CONTENT_TYPE)
            .await
    }

    /// Renames by copy then delete. Not atomic: when the delete fails the
    /// copy is kept and [`Error::RenameIncomplete`] is returned.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a bad name, [`Error::Busy`],
    /// [`Error::RenameIncomplete`] or the provider's message.
    pub async fn rename(&self, file: &StoredFile, new_base_name: &str) -> Result<StoredFile> {
        let identity = self.identity.require()?;
        let base = new_base_name.trim();
        if base.is_empty() || base.contains(['/', '\\']) {
            return Err(ValidationError::InvalidName(new_base_name.to_owned()).into());
        }

        let from = ObjectPath::new(&identity, &file.name);
        let to = ObjectPath::new(&identity, &format!("{base}.{}", extension_of(&file.name)));
        if from == to {
            return Ok(file.clone());
        }
        let _source = self.in_flight.claim(&from)?;
        let _target = self.in_flight.claim(&to)?;

        let data = self.store.download(&from).await?;
        let size = data.len() as u64;
        if let Err(e) = self
            .store
            .upload(&to, data, &UploadOptions::no_overwrite(PDF_CONTENT_TYPE))
            .await
        {
            tracing::error!("rename of {from} failed, original kept: {e}");
            return Err(e.into());
        }

        if let Err(e) = self.store.remove(std::slice::from_ref(&from)).await {
            tracing::warn!("{to} created but {from} could not be removed: {e}");
            return Err(Error::RenameIncomplete {
                from: from.to_string(),
                to: to.to_string(),
                message: e.message,
            });
        }

        tracing::info!("file: {from} renamed to {to}");
        Ok(StoredFile {
            id: to.name().to_owned(),
            name: to.name().to_owned(),
            url: self.store.public_url(&to),
            size_bytes: size,
            created_at: Some(Utc::now()),
        })
    }

    /// Removes `file` after `confirm` agreed. Returns `false` when declined.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`], [`Error::Busy`] or the provider's message.
    pub async fn delete(&self, file: &StoredFile, confirm: &dyn Confirm) -> Result<bool> {
        let identity = self.identity.require()?;
        if !confirm.confirm(&format!("Delete {}?", file.name)) {
            tracing::debug!("deletion of {} declined", file.name);
            return Ok(false);
        }

        let path = ObjectPath::new(&identity, &file.name);
        let _guard = self.in_flight.claim(&path)?;
        self.store
            .remove(std::slice::from_ref(&path))
            .await
            .map_err(|e| {
                tracing::error!("file '{path}' not deleted. Error: {e}");
                Error::from(e)
            })?;
        tracing::info!("file: {path} deleted");
        Ok(true)
    }

    async fn store_new(
        &self,
        identity: &Identity,
        extension: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredFile> {
        let name = format!("{}.{extension}", self.next_stamp());
        let path = ObjectPath::new(identity, &name);
        let _guard = self.in_flight.claim(&path)?;
        let size = data.len() as u64;

        self.store
            .upload(&path, data, &UploadOptions::no_overwrite(content_type))
            .await
            .map_err(|e| {
                tracing::error!("file '{path}' not inserted. Error: {e}");
                Error::from(e)
            })?;

        tracing::info!("file: {path} uploaded: {size} bytes");
        Ok(StoredFile {
            id: name.clone(),
            name,
            url: self.store.public_url(&path),
            size_bytes: size,
            created_at: Some(Utc::now()),
        })
    }

    fn stored_file(&self, identity: &Identity, entry: ObjectEntry) -> StoredFile {
        let path = ObjectPath::new(identity, &entry.name);
        StoredFile {
            id: entry.id.unwrap_or_else(|| entry.name.clone()),
            url: self.store.public_url(&path),
            size_bytes: entry.size_bytes.unwrap_or_default(),
            created_at: entry.created_at,
            name: entry.name,
        }
    }

    /// Millisecond timestamp, strictly increasing for this registry.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.lock();
        let stamp = now.max(*last + 1);
        *last = stamp;
        stamp
    }
}

/// Paths currently being acted on.
#[derive(Default)]
struct InFlight {
    paths: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    fn claim(&self, path: &ObjectPath) -> Result<InFlightGuard> {
        let key = path.to_string();
        if !self.paths.lock().insert(key.clone()) {
            return Err(Error::Busy(key));
        }
        Ok(InFlightGuard {
            paths: self.paths.clone(),
            key,
        })
    }
}

struct InFlightGuard {
    paths: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.paths.lock().remove(&self.key);
    }
}

/// # Errors
///
/// The first failing check: missing file, content type or size.
pub fn validate_upload(file: Option<PdfUpload>, max: u64) -> Result<PdfUpload> {
    let file = file.ok_or(ValidationError::MissingFile)?;
    if !is_pdf(&file.content_type) {
        return Err(ValidationError::NotPdf {
            content_type: file.content_type,
        }
        .into());
    }
    check_size(file.data.len() as u64, max)?;
    Ok(file)
}

fn check_size(size: u64, max: u64) -> std::result::Result<(), ValidationError> {
    if size > max {
        Err(ValidationError::TooLarge { size, max })
    } else {
        Ok(())
    }
}

fn is_pdf(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("pdf")
}

/// Extension of `file_name`, `pdf` when there is none usable.
#[must_use]
pub fn extension_of(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => ext,
        _ => DEFAULT_EXTENSION,
    }
}

/// Extension of the last path segment of `url`, ignoring query and fragment.
#[must_use]
pub fn extension_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| extension_of(s).to_owned()))
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned())
}
