//! Browsing the printer's local file storage.

use std::sync::{Arc, Mutex, PoisonError};

use printdeck_core::{
    normalize_file_entry, normalize_folder, FolderEntry, GatewayError, RawFileEntry,
    RawFolderListing,
};
use printdeck_events::{Notification, NotificationCenter};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::api::Gateway;
use crate::config::ConfigProvider;

#[derive(Debug, thiserror::Error)]
pub enum FileBrowserError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A newer [`FileBrowser::folder`] call replaced this one.
    #[error("Folder request superseded")]
    Superseded,

    #[error("Malformed file listing: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Contents of one folder, after any parent fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderListing {
    /// Folder that was actually listed; `"/"` for the root.
    pub path: String,
    pub entries: Vec<FolderEntry>,
}

#[derive(Default)]
struct PendingListing {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Folder navigation over the `files/local` API.
///
/// Only one folder listing is in flight at a time; a new
/// [`folder`](Self::folder) call cancels the previous one.
#[derive(Clone)]
pub struct FileBrowser {
    gateway: Arc<dyn Gateway>,
    config: Arc<dyn ConfigProvider>,
    notifications: NotificationCenter,
    pending: Arc<Mutex<PendingListing>>,
}

impl FileBrowser {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        config: Arc<dyn ConfigProvider>,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            gateway,
            config,
            notifications,
            pending: Arc::new(Mutex::new(PendingListing::default())),
        }
    }

    /// List `path`, walking up to the nearest existing parent on 404.
    ///
    /// Every missing folder on the way is reported as a notification. Fails
    /// when the root itself cannot be listed.
    pub async fn folder(&self, path: &str) -> Result<FolderListing, FileBrowserError> {
        let (generation, cancel) = self.begin_listing();
        let result = self.walk_up(clean_path(path), &cancel).await;
        self.finish_listing(generation);
        result
    }

    /// Details of a single file.
    pub async fn file(&self, path: &str) -> Result<FolderEntry, FileBrowserError> {
        let path = clean_path(path);
        match self.gateway.get_json(&storage_path(&path)).await {
            Ok(value) => {
                let raw: RawFileEntry = serde_json::from_value(value)?;
                Ok(normalize_file_entry(&raw, &self.config.filament()))
            }
            Err(e) => {
                let heading = if e.is_not_found() {
                    "Can't find specified file!"
                } else {
                    "Can't retrieve file!"
                };
                tracing::warn!(%path, error = %e, "File lookup failed");
                self.notifications
                    .submit(Notification::error(heading, e.message.clone()).with_cause(e.class));
                Err(e.into())
            }
        }
    }

    async fn walk_up(
        &self,
        mut path: String,
        cancel: &CancellationToken,
    ) -> Result<FolderListing, FileBrowserError> {
        loop {
            let url = storage_path(&path);
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(FileBrowserError::Superseded),
                result = self.gateway.get_json(&url) => result,
            };

            match result {
                Ok(value) => {
                    let raw: RawFolderListing = serde_json::from_value(value)?;
                    let entries = normalize_folder(raw, &self.config.filament());
                    tracing::debug!(%path, entries = entries.len(), "Folder listed");
                    return Ok(FolderListing { path, entries });
                }
                Err(e) if e.is_not_found() => {
                    self.notifications.submit(
                        Notification::error("Can't find specified folder!", e.message.clone())
                            .with_cause(e.class),
                    );
                    match parent_path(&path) {
                        Some(parent) => {
                            tracing::info!(missing = %path, %parent, "Folder not found, trying parent");
                            path = parent;
                        }
                        None => return Err(e.into()),
                    }
                }
                Err(e) => {
                    tracing::warn!(%path, error = %e, "Folder listing failed");
                    self.notifications.submit(
                        Notification::error("Can't retrieve folder!", e.message.clone())
                            .with_cause(e.class),
                    );
                    return Err(e.into());
                }
            }
        }
    }

    fn begin_listing(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut pending = self.lock_pending();
        if let Some(previous) = pending.cancel.replace(token.clone()) {
            previous.cancel();
        }
        pending.generation += 1;
        (pending.generation, token)
    }

    fn finish_listing(&self, generation: u64) {
        let mut pending = self.lock_pending();
        if pending.generation == generation {
            pending.cancel = None;
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingListing> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `"parts/sub/"` -> `"/parts/sub"`, `""` -> `"/"`.
pub(crate) fn clean_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

/// Parent of a cleaned path, `None` for the root.
fn parent_path(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) | None => Some("/".to_string()),
        Some((parent, _)) => Some(parent.to_string()),
    }
}

pub(crate) fn storage_path(path: &str) -> String {
    if path == "/" {
        "files/local".to_string()
    } else {
        format!("files/local{path}")
    }
}
