//! Usage metrics derived from a fresh listing of the user's objects.

use std::sync::Arc;

use kernel::{ListOptions, ObjectEntry, ObjectPath, ObjectStore, SortBy, UsageStats};

use crate::error::{Error, Result};
use crate::session::CurrentIdentity;

const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
const K: f64 = 1024.0;

pub struct StatsAggregator<S: ObjectStore> {
    store: Arc<S>,
    identity: CurrentIdentity,
    page_limit: usize,
}

impl<S: ObjectStore> StatsAggregator<S> {
    pub fn new(store: Arc<S>, identity: CurrentIdentity, page_limit: usize) -> Self {
        Self {
            store,
            identity,
            page_limit: page_limit.max(1),
        }
    }

    /// Lists every object of the signed in user, page by page, and derives
    /// the metrics from scratch.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] or the provider's message.
    pub async fn recompute(&self) -> Result<UsageStats> {
        let identity = self.identity.require()?;
        let prefix = ObjectPath::prefix(&identity);
        let mut entries: Vec<ObjectEntry> = Vec::new();
        loop {
            let options = ListOptions {
                limit: self.page_limit,
                offset: entries.len(),
                sort: Some(SortBy::name_ascending()),
            };
            let page = self.store.list(&prefix, &options).await.map_err(|e| {
                tracing::error!("Error fetching stats: {e}");
                Error::from(e)
            })?;
            let last = page.len() < self.page_limit;
            entries.extend(page);
            if last {
                break;
            }
        }

        let stats = summarize(&entries);
        tracing::debug!(
            "stats for {}: {} files, {} bytes",
            identity.id,
            stats.total_files,
            stats.total_storage
        );
        Ok(stats)
    }
}

/// Derives usage metrics. Missing sizes count as zero, missing timestamps
/// are ignored.
#[must_use]
pub fn summarize(entries: &[ObjectEntry]) -> UsageStats {
    if entries.is_empty() {
        return UsageStats::default();
    }
    let total_files = entries.len();
    let total_storage: u64 = entries.iter().map(|e| e.size_bytes.unwrap_or_default()).sum();
    #[allow(clippy::cast_precision_loss)]
    let avg_file_size = total_storage as f64 / total_files as f64;
    let last_upload = entries.iter().filter_map(|e| e.created_at).max();
    UsageStats {
        total_files,
        total_storage,
        avg_file_size,
        last_upload,
    }
}

/// Human readable size using 1024 based units, e.g. `1.5 KB`.
#[must_use]
pub fn format_bytes(bytes: f64, decimals: usize) -> String {
    if bytes <= 0.0 {
        return "0 Bytes".to_owned();
    }
    let mut value = bytes;
    let mut exponent = 0;
    while value >= K && exponent < UNITS.len() - 1 {
        value /= K;
        exponent += 1;
    }
    let formatted = format!("{value:.decimals$}");
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };
    format!("{trimmed} {}", UNITS[exponent])
}
