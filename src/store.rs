use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::{CacheKey, CanonicalTitle, PlatformId};
use crate::error::BoxartError;

/// Extensions a cached artwork may carry, in lookup order.
pub const ARTWORK_EXTENSIONS: [&str; 3] = ["jpg", "png", "webp"];

/// On-disk artwork layout: `<gamesDir>/images/<canonical title>.<ext>` per platform.
///
/// Reading is all this type does; writes go through [`crate::persist::Persister`].
#[derive(Debug, Clone, Default)]
pub struct Store {
    games_dirs: BTreeMap<PlatformId, Utf8PathBuf>,
}

impl Store {
    pub fn new(games_dirs: BTreeMap<PlatformId, Utf8PathBuf>) -> Self {
        Self { games_dirs }
    }

    pub fn with_platform(mut self, platform: PlatformId, games_dir: impl Into<Utf8PathBuf>) -> Self {
        self.games_dirs.insert(platform, games_dir.into());
        self
    }

    pub fn platforms(&self) -> impl Iterator<Item = &PlatformId> {
        self.games_dirs.keys()
    }

    pub fn games_dir(&self, platform: &PlatformId) -> Option<&Utf8Path> {
        self.games_dirs.get(platform).map(Utf8PathBuf::as_path)
    }

    pub fn images_dir(&self, platform: &PlatformId) -> Result<Utf8PathBuf, BoxartError> {
        self.games_dir(platform)
            .map(|dir| dir.join("images"))
            .ok_or_else(|| BoxartError::UnknownPlatform(platform.to_string()))
    }

    pub fn artwork_path(&self, key: &CacheKey, ext: &str) -> Result<Utf8PathBuf, BoxartError> {
        Ok(self
            .images_dir(&key.platform)?
            .join(format!("{}.{ext}", key.title.as_str())))
    }

    /// Existing artwork for `key`, probing [`ARTWORK_EXTENSIONS`] in order. Never touches
    /// the network; an unconfigured platform simply has no artwork.
    pub fn lookup(&self, key: &CacheKey) -> Option<Utf8PathBuf> {
        let Ok(images_dir) = self.images_dir(&key.platform) else {
            debug!(platform = %key.platform, "no games directory configured");
            return None;
        };
        ARTWORK_EXTENSIONS
            .iter()
            .map(|ext| images_dir.join(format!("{}.{ext}", key.title.as_str())))
            .find(|path| path.as_std_path().is_file())
    }

    /// Every cached file for `key`, whatever accepted extension it has.
    pub fn existing_artwork(&self, key: &CacheKey) -> Vec<Utf8PathBuf> {
        let Ok(images_dir) = self.images_dir(&key.platform) else {
            return Vec::new();
        };
        ARTWORK_EXTENSIONS
            .iter()
            .map(|ext| images_dir.join(format!("{}.{ext}", key.title.as_str())))
            .filter(|path| path.as_std_path().is_file())
            .collect()
    }

    /// Titles from `titles` that have no artwork yet, in input order and without repeats.
    pub fn missing<'a>(
        &self,
        platform: &PlatformId,
        titles: impl IntoIterator<Item = &'a str>,
    ) -> Vec<CanonicalTitle> {
        let mut seen = BTreeSet::new();
        let mut missing = Vec::new();
        for raw in titles {
            let title = CanonicalTitle::new(raw);
            if !seen.insert(title.clone()) {
                continue;
            }
            let key = CacheKey::new(platform.clone(), title.clone());
            if self.lookup(&key).is_none() {
                missing.push(title);
            }
        }
        missing
    }

    pub fn ensure_images_dir(&self, platform: &PlatformId) -> Result<Utf8PathBuf, BoxartError> {
        let dir = self.images_dir(platform)?;
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| BoxartError::Filesystem(format!("{dir}: {err}")))?;
        Ok(dir)
    }
}
