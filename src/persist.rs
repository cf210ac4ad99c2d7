use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::domain::CacheKey;
use crate::error::BoxartError;
use crate::http::Transport;
use crate::store::{ARTWORK_EXTENSIONS, Store};

/// Downloads chosen artwork and installs it as the single cached file for its key.
///
/// Writes for the same key are serialized; a failed download or write never touches what
/// is already cached.
pub struct Persister {
    store: Store,
    transport: Arc<dyn Transport>,
    locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl Persister {
    pub fn new(store: Store, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn persist(&self, url: &str, key: &CacheKey) -> Result<Utf8PathBuf, BoxartError> {
        // Fail fast for unconfigured platforms before spending a download on them.
        self.store.images_dir(&key.platform)?;

        let (bytes, ext) = self.download(url)?;

        let lock = self.key_lock(key);
        let installed = {
            let _guard = lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.install(&bytes, ext, key)
        };
        self.release_lock(key, lock);
        let dest = installed?;

        info!(key = %key, path = %dest, bytes = bytes.len(), "artwork stored");
        Ok(dest)
    }

    /// Writes `bytes` next to the destination, renames it into place and drops the other
    /// extensions. Callers hold the key's lock.
    fn install(&self, bytes: &[u8], ext: &str, key: &CacheKey) -> Result<Utf8PathBuf, BoxartError> {
        let dir = self.store.ensure_images_dir(&key.platform)?;
        let dest = self.store.artwork_path(key, ext)?;

        let mut temp = Builder::new()
            .prefix(".boxart-")
            .suffix(".part")
            .tempfile_in(dir.as_std_path())
            .map_err(|err| BoxartError::PersistFailure(err.to_string()))?;
        temp.write_all(bytes)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|err| BoxartError::PersistFailure(err.to_string()))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| BoxartError::PersistFailure(err.to_string()))?;

        for stale in self.store.existing_artwork(key) {
            if stale != dest {
                if let Err(err) = fs::remove_file(stale.as_std_path()) {
                    warn!(path = %stale, "failed to remove stale artwork: {err}");
                }
            }
        }
        Ok(dest)
    }

    fn download(&self, url: &str) -> Result<(Vec<u8>, &'static str), BoxartError> {
        debug!(url, "downloading artwork");
        let response = self
            .transport
            .get(url, &[])
            .map_err(|message| BoxartError::DownloadFailure {
                url: url.to_string(),
                message,
            })?;
        if !response.is_success() {
            return Err(BoxartError::DownloadStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        if response.body.is_empty() {
            return Err(BoxartError::DownloadFailure {
                url: url.to_string(),
                message: "empty response body".to_string(),
            });
        }
        let ext = artwork_extension(url, response.content_type.as_deref())?;
        Ok((response.body, ext))
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    /// Forgets the key's lock once nobody else holds or waits on it.
    fn release_lock(&self, key: &CacheKey, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one in `lock`.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Extension for downloaded artwork: the URL's own if it is one we cache, otherwise the
/// one the content type names, otherwise `jpg`. Non-image responses are refused.
pub fn artwork_extension(url: &str, content_type: Option<&str>) -> Result<&'static str, BoxartError> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let from_url = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .and_then(|(_, ext)| extension_for(&ext.to_ascii_lowercase()));

    let mime = content_type
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase());
    if let Some(mime) = mime.as_deref() {
        if !mime.starts_with("image/") && mime != "application/octet-stream" {
            return Err(BoxartError::UnsupportedImage {
                url: url.to_string(),
                content_type: mime.to_string(),
            });
        }
    }
    if let Some(ext) = from_url {
        return Ok(ext);
    }
    let from_mime = mime.as_deref().and_then(|mime| match mime {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    });
    Ok(from_mime.unwrap_or(ARTWORK_EXTENSIONS[0]))
}

fn extension_for(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        _ => None,
    }
}
