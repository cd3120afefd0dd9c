//! # chaingate-error
//!
//! Unified error type for the chaingate query gateway.
//!
//! Every failure that can reach a caller is classified into one of a small,
//! closed set of taxonomy codes. Each code carries:
//! - a stable snake_case tag (`bad_query_input`, `database_timeout`, ...)
//! - the HTTP status the transport layer answers with
//! - an optional structured context for programmatic handling

mod code;
mod context;
mod convert;

pub use code::{ErrorCategory, ErrorCode};
pub use context::{ErrorContext, FieldIssue};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainGateError {
    /// Taxonomy code, serialized as its tag (e.g. "bad_query_input")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Suggestion the caller can act on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Backend query id, when the failure happened during an execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
}

impl ChainGateError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
            query_id: None,
        }
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add a hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach the backend query id for correlation
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }

    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        self.code.status()
    }

    /// True for failures that signal integrity loss in the streaming layer.
    pub fn is_fatal(&self) -> bool {
        self.code.category() == ErrorCategory::Protocol
    }

    /// Serialize to JSON for logging
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize ChainGateError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }
}

impl fmt::Display for ChainGateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for ChainGateError {}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, ChainGateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_builder() {
        let err = ChainGateError::new(ErrorCode::NetworkNotFound, "Network 'foo' not found")
            .with_hint("Use one of: mainnet, base")
            .with_query_id("abc");

        assert_eq!(err.code, ErrorCode::NetworkNotFound);
        assert_eq!(err.message, "Network 'foo' not found");
        assert_eq!(err.hint, Some("Use one of: mainnet, base".to_string()));
        assert_eq!(err.query_id, Some("abc".to_string()));
        assert!(err.context.is_none());
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_display_implementation() {
        let err = ChainGateError::new(ErrorCode::BadQueryInput, "Invalid address")
            .with_hint("Use a 0x-prefixed address");
        assert_eq!(
            err.to_string(),
            "[bad_query_input] Invalid address (Hint: Use a 0x-prefixed address)"
        );

        let err_no_hint = ChainGateError::new(ErrorCode::InternalServerError, "Crash");
        assert_eq!(err_no_hint.to_string(), "[internal_server_error] Crash");
    }

    #[test]
    fn test_only_query_id_mismatch_is_fatal() {
        assert!(ChainGateError::new(ErrorCode::QueryIdMismatch, "x").is_fatal());
        assert!(!ChainGateError::new(ErrorCode::BadDatabaseResponse, "x").is_fatal());
        assert!(!ChainGateError::new(ErrorCode::DatabaseTimeout, "x").is_fatal());
    }
}
