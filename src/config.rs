//! Configuration types for media-stager

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use utoipa::ToSchema;

/// Top-level configuration
///
/// Every field has a sensible default; `Config::default()` produces a working
/// setup that stages downloads under the system temporary directory and
/// serves the API on localhost.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Storage root and retention behavior
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fetch execution behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// REST API server settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Storage and retention configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Root directory for per-download working directories
    /// (default: `<system temp dir>/media-stager`)
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// How long a finished or canceled download stays queryable before the
    /// sweeper purges it, in seconds (default: 300)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Interval between retention sweeps, in seconds (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl StorageConfig {
    /// Retention window as a [`Duration`]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Sweep interval as a [`Duration`]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Fetch execution configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Maximum number of concurrently running fetches
    ///
    /// `None` (the default) means every admitted fetch runs immediately;
    /// the domain defines no upper bound of its own.
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
}

/// External tool paths (yt-dlp, tar)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the tar executable (auto-detected if None)
    #[serde(default)]
    pub tar_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths are
    /// not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            tar_path: None,
            search_path: true,
        }
    }
}

/// REST API server configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Bind address for the API server (default: 127.0.0.1:6791)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; "*" allows any origin (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve the interactive Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_storage_root() -> PathBuf {
    std::env::temp_dir().join("media-stager")
}

fn default_retention_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    // Safe to construct directly; no parse involved
    SocketAddr::from(([127, 0, 0, 1], 6791))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.retention_secs, 300);
        assert_eq!(config.storage.sweep_interval_secs, 60);
        assert!(config.storage.root.ends_with("media-stager"));
        assert!(config.fetch.max_concurrent_fetches.is_none());
        assert!(config.tools.search_path);
        assert!(config.api.cors_enabled);
        assert_eq!(config.api.bind_address.port(), 6791);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.storage.retention_secs, 300);
        assert!(config.tools.ytdlp_path.is_none());
        assert!(config.api.swagger_ui);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config: Config = serde_json::from_str(
            r#"{
                "storage": {"retention_secs": 30},
                "fetch": {"max_concurrent_fetches": 2},
                "tools": {"ytdlp_path": "/usr/local/bin/yt-dlp"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.storage.retention_secs, 30);
        // untouched fields keep their defaults
        assert_eq!(config.storage.sweep_interval_secs, 60);
        assert_eq!(config.fetch.max_concurrent_fetches, Some(2));
        assert_eq!(
            config.tools.ytdlp_path,
            Some(PathBuf::from("/usr/local/bin/yt-dlp"))
        );
        assert!(config.tools.tar_path.is_none());
    }

    #[test]
    fn test_durations() {
        let storage = StorageConfig {
            retention_secs: 5,
            sweep_interval_secs: 1,
            ..Default::default()
        };
        assert_eq!(storage.retention(), Duration::from_secs(5));
        assert_eq!(storage.sweep_interval(), Duration::from_secs(1));
    }
}
