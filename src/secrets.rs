//! Database password lookup.
//!
//! The password lives in SSM Parameter Store as a SecureString and is fetched
//! once per run with decryption enabled. No retry.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata};
use std::fmt;

use crate::error::SecretError;

/// Password wrapper that never prints its value.
#[derive(Clone, PartialEq, Eq)]
pub struct DbPassword(String);

impl DbPassword {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DbPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DbPassword(******)")
    }
}

/// Source of the database password
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn db_password(&self) -> Result<DbPassword, SecretError>;
}

/// [`SecretResolver`] backed by SSM `GetParameter`.
#[derive(Clone, Debug)]
pub struct SsmSecretResolver {
    client: aws_sdk_ssm::Client,
    parameter: Option<String>,
}

impl SsmSecretResolver {
    pub fn new(client: aws_sdk_ssm::Client, parameter: Option<String>) -> Self {
        Self { client, parameter }
    }

    /// Build a client from the ambient AWS configuration (execution role,
    /// environment credentials, profile).
    pub async fn from_env(parameter: Option<String>) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(aws_sdk_ssm::Client::new(&config), parameter)
    }
}

#[async_trait]
impl SecretResolver for SsmSecretResolver {
    async fn db_password(&self) -> Result<DbPassword, SecretError> {
        let name = self
            .parameter
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(SecretError::MissingParameterName)?;

        tracing::info!(
            "Obtaining the DB password from parameter store path {}",
            name
        );

        let response = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|err| {
                let code = err.code().unwrap_or("Unknown").to_string();
                let message = DisplayErrorContext(&err).to_string();
                tracing::error!(error_code = %code, "Unable to obtain DB password: {}", code);
                SecretError::Fetch { code, message }
            })?;

        let value = response
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| SecretError::EmptyValue {
                name: name.to_string(),
            })?;

        tracing::info!("Successfully obtained the DB password from parameter store");
        Ok(DbPassword::new(value))
    }
}
