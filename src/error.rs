//! Error types for every stage of a run.

use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic handling and log searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Bucket not configured
    E001MissingBucket,
    /// E002: Event frequency missing or unrecognized
    E002InvalidFrequency,
    /// E003: Database password unavailable
    E003SecretUnavailable,
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Database connection failed
    E005ConnectFailure,
    /// E006: Object listing failed
    E006ListFailure,
    /// E007: Object read failed
    E007ReadFailure,
    /// E008: Object upload failed
    E008UploadFailure,
    /// E009: Query execution failed
    E009QueryFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001MissingBucket => "E001",
            Self::E002InvalidFrequency => "E002",
            Self::E003SecretUnavailable => "E003",
            Self::E004InvalidConfig => "E004",
            Self::E005ConnectFailure => "E005",
            Self::E006ListFailure => "E006",
            Self::E007ReadFailure => "E007",
            Self::E008UploadFailure => "E008",
            Self::E009QueryFailure => "E009",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("[{}] Storage backend unavailable: {message}", ErrorCode::E004InvalidConfig)]
    Init { message: String },

    #[error("[{}] Failed to list objects under '{prefix}': {source}", ErrorCode::E006ListFailure)]
    List {
        prefix: String,
        #[source]
        source: opendal::Error,
    },

    #[error("[{}] Failed to read '{key}': {source}", ErrorCode::E007ReadFailure)]
    Read {
        key: String,
        #[source]
        source: opendal::Error,
    },

    #[error("[{}] Object '{key}' is not valid UTF-8: {source}", ErrorCode::E007ReadFailure)]
    Decode {
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("[{}] Failed to upload '{key}': {source}", ErrorCode::E008UploadFailure)]
    Upload {
        key: String,
        #[source]
        source: opendal::Error,
    },

    #[error("[{}] Failed to read local file '{}': {source}", ErrorCode::E008UploadFailure, .path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Init { .. } => ErrorCode::E004InvalidConfig,
            Self::List { .. } => ErrorCode::E006ListFailure,
            Self::Read { .. } | Self::Decode { .. } => ErrorCode::E007ReadFailure,
            Self::Upload { .. } | Self::LocalFile { .. } => ErrorCode::E008UploadFailure,
        }
    }

    /// Backend error kind, the closest thing to a service error code.
    pub fn kind(&self) -> Option<opendal::ErrorKind> {
        match self {
            Self::List { source, .. } | Self::Read { source, .. } | Self::Upload { source, .. } => {
                Some(source.kind())
            }
            _ => None,
        }
    }
}

/// Database failures
#[derive(Debug, Error)]
pub enum DbError {
    #[error(
        "[{}] Missing database config. Ensure DB_HOST, DB_NAME and DB_USER are defined in the environment",
        ErrorCode::E004InvalidConfig
    )]
    MissingConfig,

    #[error("[{}] Unable to connect to the database: {source}", ErrorCode::E005ConnectFailure)]
    Connect {
        #[source]
        source: sqlx::Error,
    },

    #[error("[{}] Query failed: {source}", ErrorCode::E009QueryFailure)]
    Query {
        #[source]
        source: sqlx::Error,
    },

    #[error("[{}] Failed to write query output: {source}", ErrorCode::E009QueryFailure)]
    Sink {
        #[source]
        source: std::io::Error,
    },

    #[error("[{}] Query returned an undecodable value in column {column}: {message}", ErrorCode::E009QueryFailure)]
    Decode { column: usize, message: String },

    #[error("[{}] Failed to close the database connection: {source}", ErrorCode::E005ConnectFailure)]
    Close {
        #[source]
        source: sqlx::Error,
    },
}

impl DbError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingConfig => ErrorCode::E004InvalidConfig,
            Self::Connect { .. } | Self::Close { .. } => ErrorCode::E005ConnectFailure,
            Self::Query { .. } | Self::Sink { .. } | Self::Decode { .. } => {
                ErrorCode::E009QueryFailure
            }
        }
    }
}

/// Parameter store failures
#[derive(Debug, Error)]
pub enum SecretError {
    #[error(
        "[{}] No password parameter configured. Set DB_PASS_ARN",
        ErrorCode::E003SecretUnavailable
    )]
    MissingParameterName,

    /// `code` is the service error code (e.g. `ParameterNotFound`)
    #[error("[{}] Unable to obtain DB password: {code}: {message}", ErrorCode::E003SecretUnavailable)]
    Fetch { code: String, message: String },

    #[error("[{}] Parameter '{name}' has no value", ErrorCode::E003SecretUnavailable)]
    EmptyValue { name: String },
}

/// Per-script pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStage {
    Fetch,
    Scratch,
    Query,
    Publish,
}

impl std::fmt::Display for ScriptStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScriptStage::Fetch => "fetch",
            ScriptStage::Scratch => "scratch",
            ScriptStage::Query => "query",
            ScriptStage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// A failed script. Recorded in the run report, never fatal to the run.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] StorageError),

    #[error("scratch file unavailable: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("query failed: {0}")]
    Query(#[source] DbError),

    #[error("publish failed: {0}")]
    Publish(#[source] StorageError),
}

impl ScriptError {
    pub fn stage(&self) -> ScriptStage {
        match self {
            Self::Fetch(_) => ScriptStage::Fetch,
            Self::Scratch(_) => ScriptStage::Scratch,
            Self::Query(_) => ScriptStage::Query,
            Self::Publish(_) => ScriptStage::Publish,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Fetch(err) | Self::Publish(err) => err.code(),
            Self::Scratch(_) => ErrorCode::E008UploadFailure,
            Self::Query(err) => err.code(),
        }
    }
}

/// Precondition failures that end a run with status 1
#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "[{}] No S3_BUCKET configured - unable to continue",
        ErrorCode::E001MissingBucket
    )]
    MissingBucket,

    #[error(
        "[{}] Unhandled frequency [{}] found in event - no handler",
        ErrorCode::E002InvalidFrequency,
        .0.as_deref().unwrap_or("None")
    )]
    InvalidFrequency(Option<String>),

    #[error(transparent)]
    Catalog(StorageError),

    #[error(transparent)]
    Secret(SecretError),

    #[error(transparent)]
    Connect(DbError),
}

impl RunError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingBucket => ErrorCode::E001MissingBucket,
            Self::InvalidFrequency(_) => ErrorCode::E002InvalidFrequency,
            Self::Catalog(err) => err.code(),
            Self::Secret(_) => ErrorCode::E003SecretUnavailable,
            Self::Connect(err) => err.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_codes() {
        let err = RunError::InvalidFrequency(Some("hourly".to_string()));
        assert_eq!(err.code(), ErrorCode::E002InvalidFrequency);
        assert!(err.to_string().starts_with("[E002]"));
        assert!(err.to_string().contains("[hourly]"));

        let missing = RunError::InvalidFrequency(None);
        assert!(missing.to_string().contains("[None]"));

        let secret = RunError::Secret(SecretError::Fetch {
            code: "ParameterNotFound".to_string(),
            message: "no such parameter".to_string(),
        });
        assert_eq!(secret.code(), ErrorCode::E003SecretUnavailable);
        assert!(secret.to_string().contains("ParameterNotFound"));
    }

    #[test]
    fn missing_db_config_maps_to_invalid_config() {
        let err = RunError::Connect(DbError::MissingConfig);
        assert_eq!(err.code(), ErrorCode::E004InvalidConfig);
        assert!(err.to_string().contains("DB_HOST, DB_NAME and DB_USER"));
    }

    #[test]
    fn script_errors_know_their_stage() {
        let err = ScriptError::Query(DbError::Sink {
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        });
        assert_eq!(err.stage(), ScriptStage::Query);
        assert_eq!(err.code(), ErrorCode::E009QueryFailure);
        assert!(err.to_string().starts_with("query failed: [E009]"));
    }

    #[test]
    fn storage_error_exposes_backend_kind() {
        let err = StorageError::Read {
            key: "scripts/daily/a.sql".to_string(),
            source: opendal::Error::new(opendal::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.code(), ErrorCode::E007ReadFailure);
        assert_eq!(err.kind(), Some(opendal::ErrorKind::NotFound));
    }
}
