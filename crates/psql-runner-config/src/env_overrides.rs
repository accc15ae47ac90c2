use super::{FsConfig, LogFormat, RuntimeConfig, S3Config, StorageBackend};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

pub const ENV_PREFIX: &str = "PSQL_RUNNER_";

/// Abstraction over environment-variable lookups so tests and embedding
/// runtimes can supply their own source of overrides.
pub trait EnvSource {
    /// Get a variable WITH the PSQL_RUNNER_ prefix applied
    fn get(&self, key: &str) -> Option<String>;

    /// Get a variable WITHOUT the PSQL_RUNNER_ prefix
    /// Used for the job's established names (DB_HOST, S3_BUCKET, DEBUG, ...)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// In-memory `EnvSource`.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefixed variable (`key` without the prefix).
    pub fn prefixed(mut self, key: &str, value: &str) -> Self {
        self.vars
            .insert(format!("{}{}", ENV_PREFIX, key), value.to_string());
        self
    }

    /// Set an unprefixed variable.
    pub fn raw(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Database identity
    if let Some(host) = get_raw_env_string(env, "DB_HOST") {
        config.database.host = Some(host);
    }
    if let Some(port) = get_raw_env_u16(env, "DB_PORT")? {
        config.database.port = port;
    }
    if let Some(name) = get_raw_env_string(env, "DB_NAME") {
        config.database.name = Some(name);
    }
    if let Some(user) = get_raw_env_string(env, "DB_USER") {
        config.database.user = Some(user);
    }
    if let Some(parameter) = get_raw_env_string(env, "DB_PASS_ARN") {
        config.secrets.password_parameter = Some(parameter);
    }

    // Presence alone enables debug dumps, whatever the value
    if env.get_raw("DEBUG").is_some() {
        config.debug = true;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Storage backend
    if let Some(backend) = env.get("STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid PSQL_RUNNER_STORAGE_BACKEND value")?;
    }
    if let Some(path) = env.get("STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // Bucket shared by scripts and results
    if let Some(bucket) = get_raw_env_string(env, "S3_BUCKET") {
        config.storage.bucket = Some(bucket);
    }

    // S3 connection details
    if let Some(region) =
        get_raw_env_string(env, "S3_REGION").or_else(|| get_raw_env_string(env, "AWS_REGION"))
    {
        ensure_s3(config).region = region;
    }
    if let Some(endpoint) = get_raw_env_string(env, "S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(sse) = get_env_bool(env, "S3_SERVER_SIDE_ENCRYPTION")? {
        ensure_s3(config).server_side_encryption = sse;
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

/// Unprefixed lookup; an empty value counts as unset.
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get_raw(key).filter(|v| !v.trim().is_empty())
}

fn get_raw_env_u16<E: EnvSource>(env: &E, key: &str) -> Result<Option<u16>> {
    match get_raw_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow!("Failed to parse {}: {}", key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
