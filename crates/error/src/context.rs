//! # Error Contexts
//!
//! Structured metadata attached to errors for programmatic handling.

use serde::{Deserialize, Serialize};

/// One field-attributed validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    /// The offending item, for batched fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub reason: String,
}

/// Structured context for errors.
///
/// Each variant provides the fields relevant to that failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for bad_query_input
    Validation { issues: Vec<FieldIssue> },

    /// Context for network_not_found
    Network {
        network: String,
        available_networks: Vec<String>,
    },

    /// Context for bad_database_response
    Backend {
        #[serde(skip_serializing_if = "Option::is_none")]
        exception_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
    },

    /// Context for database_timeout
    Timeout {
        elapsed_secs: f64,
        max_execution_time_secs: u64,
    },

    /// Context for query_id_mismatch
    QueryIdMismatch {
        sent: String,
        received: Option<String>,
    },

    /// Context for query_not_found
    Template { chain: String, query: String },

    /// Context for invalid_contract
    Contract { field: String },

    /// Pagination inputs that produced an invalid result
    Pagination {
        current_page: u64,
        rows_per_page: u64,
        total_rows: u64,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}
