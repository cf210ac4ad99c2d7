use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_ADAPTER_TIMEOUT, PlatformId, SourceConfig, non_blank};
use crate::error::BoxartError;
use crate::store::Store;

pub const CONFIG_FILE: &str = "boxart.json";
pub const STEAMGRID_KEY_ENV: &str = "STEAMGRID_API_KEY";
pub const GIANTBOMB_KEY_ENV: &str = "GIANTBOMB_API_KEY";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default, rename = "steamGridAPIKey")]
    pub steam_grid_api_key: Option<String>,
    #[serde(default, rename = "giantBombAPIKey")]
    pub giant_bomb_api_key: Option<String>,
    #[serde(default, rename = "adapterTimeoutSecs")]
    pub adapter_timeout_secs: Option<u64>,
    #[serde(default, rename = "enableCommons")]
    pub enable_commons: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEntry {
    #[serde(default)]
    pub games_dir: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub sources: SourceConfig,
    pub games_dirs: BTreeMap<PlatformId, Utf8PathBuf>,
}

impl ResolvedConfig {
    pub fn store(&self) -> Store {
        Store::new(self.games_dirs.clone())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `boxart.json` in the current directory, or the one in the user
    /// config directory. Credentials from the environment win over the file.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, BoxartError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::default_path().ok_or(BoxartError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| BoxartError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| BoxartError::ConfigParse(err.to_string()))?;

        let mut resolved = Self::resolve_config(config)?;
        apply_env_overrides(&mut resolved.sources, |name| std::env::var(name).ok());
        Ok(resolved)
    }

    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("boxart").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, BoxartError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let adapter_timeout = config
            .settings
            .adapter_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ADAPTER_TIMEOUT);
        let sources = SourceConfig {
            steamgrid_api_key: non_blank(config.settings.steam_grid_api_key),
            giantbomb_api_key: non_blank(config.settings.giant_bomb_api_key),
            commons_enabled: config.settings.enable_commons.unwrap_or(false),
            adapter_timeout,
        };

        let games_dirs = config
            .platforms
            .into_iter()
            .filter(|(_, entry)| !entry.games_dir.trim().is_empty())
            .map(|(name, entry)| {
                let platform: PlatformId = name.parse()?;
                Ok((platform, Utf8PathBuf::from(entry.games_dir.trim())))
            })
            .collect::<Result<BTreeMap<_, _>, BoxartError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            sources,
            games_dirs,
        })
    }
}

/// Non-blank `STEAMGRID_API_KEY` / `GIANTBOMB_API_KEY` replace the configured keys.
pub fn apply_env_overrides<F>(sources: &mut SourceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = non_blank(lookup(STEAMGRID_KEY_ENV)) {
        sources.steamgrid_api_key = Some(key);
    }
    if let Some(key) = non_blank(lookup(GIANTBOMB_KEY_ENV)) {
        sources.giantbomb_api_key = Some(key);
    }
}
