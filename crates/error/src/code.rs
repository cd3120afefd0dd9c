use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy codes.
///
/// ## Classes
/// - **Client** (400): the request itself is wrong
/// - **Backend** (500/504): the column store failed or ran out of time
/// - **Protocol** (500): the streaming layer lost integrity
/// - **Config** (500): the deployment is missing something
/// - **Internal** (500): everything else
///
/// Tags are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    /// Contract validation failure
    BadQueryInput,
    /// No database mapping for the requested network
    NetworkNotFound,
    /// Backend returned a non-timeout error, or a frame failed to decode
    BadDatabaseResponse,
    /// Elapsed execution time reached the configured ceiling
    DatabaseTimeout,
    /// Query id echoed by the backend differs from the one sent
    QueryIdMismatch,
    /// SQL template missing from the registry
    QueryNotFound,
    /// Malformed query contract (startup only)
    InvalidContract,
    /// Invalid configuration (startup only)
    InvalidConfig,
    /// Uncategorized failure
    InternalServerError,
}

impl ErrorCode {
    /// Get the taxonomy tag (e.g., "database_timeout")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadQueryInput => "bad_query_input",
            Self::NetworkNotFound => "network_not_found",
            Self::BadDatabaseResponse => "bad_database_response",
            Self::DatabaseTimeout => "database_timeout",
            Self::QueryIdMismatch => "query_id_mismatch",
            Self::QueryNotFound => "query_not_found",
            Self::InvalidContract => "invalid_contract",
            Self::InvalidConfig => "invalid_config",
            Self::InternalServerError => "internal_server_error",
        }
    }

    /// HTTP status returned for this code
    pub fn status(&self) -> u16 {
        match self {
            Self::BadQueryInput | Self::NetworkNotFound => 400,
            Self::DatabaseTimeout => 504,
            _ => 500,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BadQueryInput | Self::NetworkNotFound => ErrorCategory::Client,
            Self::BadDatabaseResponse | Self::DatabaseTimeout => ErrorCategory::Backend,
            Self::QueryIdMismatch => ErrorCategory::Protocol,
            Self::QueryNotFound | Self::InvalidContract | Self::InvalidConfig => {
                ErrorCategory::Config
            }
            Self::InternalServerError => ErrorCategory::Internal,
        }
    }

    pub const ALL: [ErrorCode; 9] = [
        Self::BadQueryInput,
        Self::NetworkNotFound,
        Self::BadDatabaseResponse,
        Self::DatabaseTimeout,
        Self::QueryIdMismatch,
        Self::QueryNotFound,
        Self::InvalidContract,
        Self::InvalidConfig,
        Self::InternalServerError,
    ];
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str().to_string()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("Unknown error code: {}", s))
    }
}

/// High-level error class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Client,
    Backend,
    Protocol,
    Config,
    Internal,
}
