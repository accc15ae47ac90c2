// psql-runner-config - Unified configuration for the CLI and Lambda runtimes
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from PSQL_RUNNER_CONFIG env var
// 3. Config file contents from PSQL_RUNNER_CONFIG_CONTENT env var
// 4. Default config file locations (./psql-runner.toml, ./.psql-runner.toml)
// 5. Platform-specific defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod env_overrides;
mod platform;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, MapEnvSource, ENV_PREFIX};
pub use platform::{Platform, PlatformDefaults};

/// Largest page a single object listing may return.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    pub storage: StorageConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Verbose event and listing dumps (set by the presence of `DEBUG`)
    #[serde(default)]
    pub debug: bool,
}

/// Database identity. The password is never stored here; it is resolved
/// from the parameter store at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

fn default_db_port() -> u16 {
    5432
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_db_port(),
            name: None,
            user: None,
        }
    }
}

impl DatabaseConfig {
    /// Host, name and user, only when all three are present and non-empty.
    pub fn identity(&self) -> Option<(&str, &str, &str)> {
        let host = non_empty(self.host.as_deref())?;
        let name = non_empty(self.name.as_deref())?;
        let user = non_empty(self.user.as_deref())?;
        Some((host, name, user))
    }
}

/// Parameter store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Name or ARN of the SecureString parameter holding the DB password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_parameter: Option<String>,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Bucket holding both scripts and results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default = "default_scripts_prefix")]
    pub scripts_prefix: String,

    #[serde(default = "default_results_prefix")]
    pub results_prefix: String,

    #[serde(default = "default_list_limit")]
    pub list_limit: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,
}

fn default_scripts_prefix() -> String {
    "scripts".to_string()
}

fn default_results_prefix() -> String {
    "results".to_string()
}

fn default_list_limit() -> usize {
    MAX_LIST_LIMIT
}

impl StorageConfig {
    pub fn bucket(&self) -> Option<&str> {
        non_empty(self.bucket.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Request SSE-S3 (AES256) on every upload
    #[serde(default = "default_server_side_encryption")]
    pub server_side_encryption: bool,
}

fn default_server_side_encryption() -> bool {
    true
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            server_side_encryption: true,
        }
    }
}

/// Local directory standing in for object storage; the bucket becomes a
/// subdirectory of `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config(Platform::detect())
    }

    /// Load configuration for a specific platform (useful for testing)
    pub fn load_for_platform(platform: Platform) -> Result<Self> {
        sources::load_config(platform)
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Construct a config that contains only platform defaults (no env or files).
    pub fn from_platform_defaults(platform: Platform) -> Self {
        platform_defaults(platform)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.database = other.database;
        self.storage = other.storage;
        self.log = other.log;

        if other.secrets.password_parameter.is_some() {
            self.secrets = other.secrets;
        }
        self.debug |= other.debug;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration for the given platform from optional inline TOML
    /// plus overrides supplied by an `EnvSource`. Never touches the process
    /// environment or the filesystem.
    pub fn load_for_platform_with_env<E: EnvSource>(
        platform: Platform,
        inline_config: Option<&str>,
        env: &E,
    ) -> Result<Self> {
        let mut config = RuntimeConfig::from_platform_defaults(platform);

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

fn platform_defaults(platform: Platform) -> RuntimeConfig {
    let defaults = platform.defaults();

    let backend = defaults
        .storage_backend
        .parse::<StorageBackend>()
        .unwrap_or(StorageBackend::S3);

    let (s3, fs) = match backend {
        StorageBackend::S3 => (Some(S3Config::default()), None),
        StorageBackend::Fs => (None, Some(FsConfig::default())),
    };

    RuntimeConfig {
        database: DatabaseConfig::default(),
        storage: StorageConfig {
            backend,
            bucket: None,
            scripts_prefix: default_scripts_prefix(),
            results_prefix: default_results_prefix(),
            list_limit: default_list_limit(),
            s3,
            fs,
        },
        secrets: SecretsConfig::default(),
        log: LogConfig {
            level: "info".to_string(),
            format: defaults.log_format,
        },
        debug: false,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
