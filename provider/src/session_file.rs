//! Persistence of the auth session between runs.

use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::Utc;
use kernel::{Identity, ProviderError};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Seconds before the actual expiry at which a token is treated as expired.
const EXPIRY_MARGIN: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix time in seconds
    pub expires_at: i64,
    pub user: Identity,
}

impl StoredSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at - EXPIRY_MARGIN
    }
}

/// JSON file holding a [`StoredSession`]. Without a path nothing is
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionFile {
    path: Option<PathBuf>,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// # Errors
    ///
    /// Unreadable file or content that is not a session.
    pub async fn load(&self) -> Result<Option<StoredSession>, ProviderError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let content = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&e)),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| ProviderError::new(format!("corrupt session file: {e}")))
    }

    /// # Errors
    ///
    /// File cannot be written.
    pub async fn save(&self, session: &StoredSession) -> Result<(), ProviderError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| io_error(&e))?;
        }
        let content =
            serde_json::to_vec_pretty(session).map_err(|e| ProviderError::new(e.to_string()))?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(path).await.map_err(|e| io_error(&e))?;
        // a file left by an older build keeps its mode on open
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| io_error(&e))?;
        }
        file.write_all(&content).await.map_err(|e| io_error(&e))?;
        file.flush().await.map_err(|e| io_error(&e))?;
        Ok(())
    }

    /// # Errors
    ///
    /// File exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), ProviderError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(&e)),
            _ => Ok(()),
        }
    }
}

fn io_error(e: &std::io::Error) -> ProviderError {
    ProviderError::new(format!("session file: {e}"))
}
