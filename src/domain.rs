use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::BoxartError;
use crate::normalize::normalize;

/// The platform whose box scans live on the Amiga-specific wikis.
pub const AMIGA: &str = "amiga";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformId(String);

impl PlatformId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_amiga(&self) -> bool {
        self.0 == AMIGA
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlatformId {
    type Err = BoxartError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(BoxartError::InvalidPlatform(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for PlatformId {
    type Error = BoxartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlatformId> for String {
    fn from(value: PlatformId) -> Self {
        value.0
    }
}

/// A game title after normalization; the only form used for searching and for cache keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalTitle(String);

impl CanonicalTitle {
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-cased first character, used by the letter-indexed wiki galleries.
    pub fn first_letter(&self) -> char {
        self.0
            .chars()
            .next()
            .map(|ch| ch.to_uppercase().next().unwrap_or(ch))
            .unwrap_or('A')
    }

    /// Case-insensitive substring test against text scraped from a result page.
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.0.to_lowercase())
    }
}

impl fmt::Display for CanonicalTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CanonicalTitle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub platform: PlatformId,
    pub title: CanonicalTitle,
}

impl CacheKey {
    pub fn new(platform: PlatformId, title: CanonicalTitle) -> Self {
        Self { platform, title }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.title)
    }
}

/// Artwork sources, declared in merge priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Steamgrid,
    Giantbomb,
    Mobygames,
    Exotica,
    Uvlist,
    Wikipedia,
    Commons,
}

impl SourceId {
    pub const ALL: [SourceId; 7] = [
        SourceId::Steamgrid,
        SourceId::Giantbomb,
        SourceId::Mobygames,
        SourceId::Exotica,
        SourceId::Uvlist,
        SourceId::Wikipedia,
        SourceId::Commons,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Steamgrid => "steamgrid",
            SourceId::Giantbomb => "giantbomb",
            SourceId::Mobygames => "mobygames",
            SourceId::Exotica => "exotica",
            SourceId::Uvlist => "uvlist",
            SourceId::Wikipedia => "wikipedia",
            SourceId::Commons => "commons",
        }
    }

    /// Attribution shown next to a thumbnail.
    pub fn label(&self) -> &'static str {
        match self {
            SourceId::Steamgrid => "SteamGridDB",
            SourceId::Giantbomb => "GiantBomb",
            SourceId::Mobygames => "MobyGames",
            SourceId::Exotica => "Exotica",
            SourceId::Uvlist => "UVList",
            SourceId::Wikipedia => "Wikipedia",
            SourceId::Commons => "Wikimedia Commons",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cover_art: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_box_art: Option<bool>,
}

impl CandidateMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    url: String,
    source: SourceId,
    #[serde(default, skip_serializing_if = "CandidateMetadata::is_empty")]
    metadata: CandidateMetadata,
}

impl ImageCandidate {
    pub fn new(url: impl Into<String>, source: SourceId) -> Self {
        Self {
            url: url.into(),
            source,
            metadata: CandidateMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: CandidateMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn metadata(&self) -> &CandidateMetadata {
        &self.metadata
    }
}

pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(20);

/// Credentials and limits for one resolution request.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub steamgrid_api_key: Option<String>,
    pub giantbomb_api_key: Option<String>,
    /// Wikimedia Commons only runs when asked for.
    pub commons_enabled: bool,
    pub adapter_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            steamgrid_api_key: None,
            giantbomb_api_key: None,
            commons_enabled: false,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }
}

impl SourceConfig {
    pub fn with_steamgrid_key(mut self, key: impl Into<String>) -> Self {
        self.steamgrid_api_key = non_blank(Some(key.into()));
        self
    }

    pub fn with_giantbomb_key(mut self, key: impl Into<String>) -> Self {
        self.giantbomb_api_key = non_blank(Some(key.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn with_commons(mut self, enabled: bool) -> Self {
        self.commons_enabled = enabled;
        self
    }

    /// Whether an opt-in source was switched on.
    pub fn opted_in(&self, source: SourceId) -> bool {
        match source {
            SourceId::Commons => self.commons_enabled,
            _ => false,
        }
    }

    /// The credential a source needs; blank keys count as absent.
    pub fn credential_for(&self, source: SourceId) -> Option<&str> {
        let key = match source {
            SourceId::Steamgrid => self.steamgrid_api_key.as_deref(),
            SourceId::Giantbomb => self.giantbomb_api_key.as_deref(),
            _ => None,
        };
        key.map(str::trim).filter(|key| !key.is_empty())
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
