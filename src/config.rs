//! Application-level configuration loading: matching defaults, battle timing,
//! listing limits and the storage backend selection.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CONTENT_BATTLE_CONFIG_PATH";
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_PLACEHOLDER_IMAGE: &str = "/images/popo.png";

/// Which persistence backend the server connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// MongoDB through the official driver.
    Mongo,
    /// Process-local store; nothing survives a restart.
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(StorageBackend::Mongo),
            "memory" | "mem" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// Storage connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend to connect to.
    pub backend: StorageBackend,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// Database name; the driver default when absent.
    pub mongo_db: Option<String>,
}

/// Defaults used by the matchmaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Battles requested when a caller does not name a quota.
    pub default_quota: usize,
    /// Pool snapshot size as a multiple of the quota.
    pub pool_factor: usize,
    /// Quota of the matching run scheduled after an upload.
    pub upload_quota: usize,
    /// Delay between an upload and its matching run.
    pub upload_delay: Duration,
    /// Available contents read by an administrative force pairing.
    pub force_pool_size: usize,
}

impl MatchingConfig {
    /// Number of available contents read for a run with `quota`.
    pub fn pool_size(&self, quota: usize) -> usize {
        quota.saturating_mul(self.pool_factor.max(1))
    }
}

/// Page size limits for read-only listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingConfig {
    /// Page size when the caller names none.
    pub default_limit: usize,
    /// Largest page size a caller may request.
    pub max_limit: usize,
}

impl ListingConfig {
    /// Resolve a requested page size against the configured bounds.
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Matchmaker defaults.
    pub matching: MatchingConfig,
    /// Voting window of a new battle.
    pub battle_duration: Duration,
    /// Delay before a view counts.
    pub view_delay: Duration,
    /// Listing page sizes.
    pub listing: ListingConfig,
    /// Image used when a content has none.
    pub placeholder_image: String,
    /// Shared secret expected in `x-admin-token`; admin routes are closed without it.
    pub admin_token: Option<String>,
    /// Storage connection settings.
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to
    /// built-in defaults for anything missing.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_env(|name| env::var(name).ok());
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        default_quota = app_config.matching.default_quota,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Override file settings with environment variables resolved by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(token) = lookup("ADMIN_TOKEN") {
            self.admin_token = Some(token);
        }
        if let Some(raw) = lookup("STORAGE_BACKEND") {
            match StorageBackend::parse(&raw) {
                Some(backend) => self.storage.backend = backend,
                None => warn!(value = %raw, "unknown STORAGE_BACKEND; keeping configured backend"),
            }
        }
        if let Some(uri) = lookup("MONGO_URI") {
            self.storage.mongo_uri = uri;
        }
        if let Some(db) = lookup("MONGO_DB") {
            self.storage.mongo_db = Some(db);
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig {
                default_quota: 3,
                pool_factor: 2,
                upload_quota: 2,
                upload_delay: Duration::from_millis(2_000),
                force_pool_size: 10,
            },
            battle_duration: Duration::from_secs(7 * 24 * 3600),
            view_delay: Duration::from_millis(500),
            listing: ListingConfig {
                default_limit: 20,
                max_limit: 100,
            },
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_owned(),
            admin_token: None,
            storage: StorageConfig {
                backend: StorageBackend::Mongo,
                mongo_uri: DEFAULT_MONGO_URI.to_owned(),
                mongo_db: None,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    matching: RawMatching,
    battle_duration_hours: Option<u64>,
    view_delay_ms: Option<u64>,
    listing: RawListing,
    placeholder_image: Option<String>,
    admin_token: Option<String>,
    storage: RawStorage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMatching {
    default_quota: Option<usize>,
    pool_factor: Option<usize>,
    upload_quota: Option<usize>,
    upload_delay_ms: Option<u64>,
    force_pool_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawListing {
    default_limit: Option<usize>,
    max_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStorage {
    backend: Option<StorageBackend>,
    mongo_uri: Option<String>,
    mongo_db: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            matching: MatchingConfig {
                default_quota: value
                    .matching
                    .default_quota
                    .unwrap_or(defaults.matching.default_quota),
                pool_factor: value
                    .matching
                    .pool_factor
                    .unwrap_or(defaults.matching.pool_factor),
                upload_quota: value
                    .matching
                    .upload_quota
                    .unwrap_or(defaults.matching.upload_quota),
                upload_delay: value
                    .matching
                    .upload_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.matching.upload_delay),
                force_pool_size: value
                    .matching
                    .force_pool_size
                    .unwrap_or(defaults.matching.force_pool_size),
            },
            battle_duration: value
                .battle_duration_hours
                .map(|hours| Duration::from_secs(hours * 3600))
                .unwrap_or(defaults.battle_duration),
            view_delay: value
                .view_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.view_delay),
            listing: ListingConfig {
                default_limit: value
                    .listing
                    .default_limit
                    .unwrap_or(defaults.listing.default_limit),
                max_limit: value.listing.max_limit.unwrap_or(defaults.listing.max_limit),
            },
            placeholder_image: value
                .placeholder_image
                .unwrap_or(defaults.placeholder_image),
            admin_token: value.admin_token.or(defaults.admin_token),
            storage: StorageConfig {
                backend: value.storage.backend.unwrap_or(defaults.storage.backend),
                mongo_uri: value.storage.mongo_uri.unwrap_or(defaults.storage.mongo_uri),
                mongo_db: value.storage.mongo_db.or(defaults.storage.mongo_db),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"matching": {"pool_factor": 3}, "view_delay_ms": 50, "storage": {"backend": "memory"}}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.matching.pool_factor, 3);
        assert_eq!(config.matching.default_quota, 3);
        assert_eq!(config.view_delay, Duration::from_millis(50));
        assert_eq!(config.battle_duration, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.placeholder_image, "/images/popo.png");
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ADMIN_TOKEN", "s3cret"),
            ("STORAGE_BACKEND", "Memory"),
            ("MONGO_DB", "battles_test"),
            ("MONGO_URI", " "),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|name| vars.get(name).map(|value| value.to_string()));

        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.mongo_db.as_deref(), Some("battles_test"));
        assert_eq!(config.storage.mongo_uri, DEFAULT_MONGO_URI);
    }

    #[test]
    fn unknown_backend_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|name| (name == "STORAGE_BACKEND").then(|| "couch".to_string()));
        assert_eq!(config.storage.backend, StorageBackend::Mongo);
    }

    #[test]
    fn listing_limits_are_clamped() {
        let listing = AppConfig::default().listing;
        assert_eq!(listing.clamp(None), 20);
        assert_eq!(listing.clamp(Some(0)), 1);
        assert_eq!(listing.clamp(Some(500)), 100);
        assert_eq!(listing.clamp(Some(7)), 7);
    }

    #[test]
    fn pool_size_scales_with_quota() {
        let matching = AppConfig::default().matching;
        assert_eq!(matching.pool_size(3), 6);
        assert_eq!(matching.pool_size(1), 2);
    }
}
