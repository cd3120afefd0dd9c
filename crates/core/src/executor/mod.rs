//! Streaming query executor.
//!
//! Executes one parameterized query against the column store's HTTP
//! interface and folds the `JSONEachRowWithProgress` body into rows plus the
//! last-seen progress snapshot.
//!
//! # Execution
//!
//! 1. A fresh query id is generated and sent with the request.
//! 2. The body is consumed chunk by chunk; progress frames overwrite the held
//!    statistics, row frames are appended in order.
//! 3. Any undecodable frame aborts the whole execution.
//! 4. After the stream ends, the query id echoed in the response headers must
//!    equal the one sent. A mismatch is a `query_id_mismatch` failure, never an
//!    ordinary backend error.

pub mod frame;

pub use frame::{reduce_stream, Frame, FrameReducer, ProgressCounters, ReducedStream};

use crate::value::ParamsRecord;
use async_trait::async_trait;
use chaingate_common::config::BackendSettings;
use chaingate_error::{ChainGateError, ErrorCode, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

pub const OUTPUT_FORMAT: &str = "JSONEachRowWithProgress";

pub const QUERY_ID_HEADER: &str = "X-ClickHouse-Query-Id";
pub const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";
pub const USER_HEADER: &str = "X-ClickHouse-User";
pub const KEY_HEADER: &str = "X-ClickHouse-Key";

/// Backend exception code for an exceeded execution-time limit.
pub const TIMEOUT_EXCEEDED_CODE: i32 = 159;

static EXCEPTION_CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"Code: (\d+)\.").unwrap());

/// Statistics snapshot taken from the most recent progress frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressStatistics {
    /// Seconds
    pub elapsed: f64,
    pub rows_read: u64,
    pub bytes_read: u64,
}

impl From<&ProgressCounters> for ProgressStatistics {
    fn from(counters: &ProgressCounters) -> Self {
        Self {
            elapsed: counters.elapsed_ns as f64 / 1e9,
            rows_read: counters.read_rows,
            bytes_read: counters.read_bytes,
        }
    }
}

/// Per-call backend options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackendOptions {
    pub database: String,
    /// Backend query-cache TTL; `None` or 0 leaves the cache off
    pub cache_ttl_secs: Option<u64>,
    /// Extra backend settings; override the configured ones on collision
    pub settings: BTreeMap<String, String>,
}

/// One query invocation.
#[derive(Debug, Clone, Serialize)]
pub struct QueryExecution {
    pub query_id: String,
    pub sql: String,
    pub params: ParamsRecord,
    pub options: BackendOptions,
}

impl QueryExecution {
    pub fn new(sql: impl Into<String>, params: ParamsRecord, options: BackendOptions) -> Self {
        Self {
            query_id: Uuid::new_v4().to_string(),
            sql: sql.into(),
            params,
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub query_id: String,
    pub data: Vec<serde_json::Value>,
    pub statistics: ProgressStatistics,
    pub rows: usize,
    pub rows_before_limit_at_least: Option<u64>,
}

/// Executes bound SQL against a backend.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn execute(
        &self,
        sql: &str,
        params: &ParamsRecord,
        options: &BackendOptions,
    ) -> Result<QueryOutcome>;
}

/// Build the error for a backend-reported failure.
///
/// Timeouts are recognised by exception code or by the `TIMEOUT_EXCEEDED`
/// marker; everything else is `bad_database_response` with the raw message.
pub fn backend_error(
    message: &str,
    exception_code: Option<i32>,
    http_status: Option<u16>,
) -> ChainGateError {
    let exception_code = exception_code.or_else(|| parse_exception_code(message));
    let message = message.trim();

    if exception_code == Some(TIMEOUT_EXCEEDED_CODE) || message.contains("TIMEOUT_EXCEEDED") {
        return ChainGateError::new(ErrorCode::DatabaseTimeout, message);
    }

    ChainGateError::new(ErrorCode::BadDatabaseResponse, message).with_context(
        ErrorContext::Backend {
            exception_code,
            http_status,
        },
    )
}

fn parse_exception_code(message: &str) -> Option<i32> {
    EXCEPTION_CODE_REGEX
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// HTTP client for the column store.
#[derive(Debug, Clone)]
pub struct StreamingExecutor {
    client: reqwest::Client,
    url: String,
    username: String,
    password: Option<SecretString>,
    max_execution_time_secs: u64,
    settings: BTreeMap<String, String>,
}

impl StreamingExecutor {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| {
                ChainGateError::new(
                    ErrorCode::InvalidConfig,
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            max_execution_time_secs: settings.max_execution_time_secs,
            settings: settings
                .settings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    fn query_pairs(&self, execution: &QueryExecution) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("query_id".to_string(), execution.query_id.clone()),
            ("database".to_string(), execution.options.database.clone()),
            ("default_format".to_string(), OUTPUT_FORMAT.to_string()),
        ];

        let mut settings = BTreeMap::new();
        settings.insert(
            "max_execution_time".to_string(),
            self.max_execution_time_secs.to_string(),
        );
        if let Some(ttl) = execution.options.cache_ttl_secs.filter(|ttl| *ttl > 0) {
            settings.insert("use_query_cache".to_string(), "1".to_string());
            settings.insert("query_cache_ttl".to_string(), ttl.to_string());
        }
        settings.extend(self.settings.clone());
        settings.extend(execution.options.settings.clone());
        pairs.extend(settings);

        pairs.extend(
            execution
                .params
                .iter()
                .map(|(name, value)| (format!("param_{}", name), value.to_backend_param())),
        );
        pairs
    }

    async fn run(&self, execution: &QueryExecution) -> Result<QueryOutcome> {
        let query_id = execution.query_id.as_str();

        let mut request = self
            .client
            .post(&self.url)
            .query(&self.query_pairs(execution))
            .header(USER_HEADER, &self.username)
            .body(execution.sql.clone());
        if let Some(password) = &self.password {
            request = request.header(KEY_HEADER, password.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let exception_code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i32>().ok());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(backend_error(&body, exception_code, Some(status.as_u16())));
        }

        let echoed_id = response
            .headers()
            .get(QUERY_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let reduced = reduce_stream(response.bytes_stream()).await?;

        if echoed_id.as_deref() != Some(query_id) {
            error!(
                target: "errors",
                query_id = %query_id,
                received = ?echoed_id,
                "Query id mismatch between request and backend response"
            );
            return Err(ChainGateError::new(
                ErrorCode::QueryIdMismatch,
                "Backend response does not belong to this query",
            )
            .with_context(ErrorContext::QueryIdMismatch {
                sent: query_id.to_string(),
                received: echoed_id,
            }));
        }

        let rows = reduced.data.len();
        Ok(QueryOutcome {
            query_id: query_id.to_string(),
            data: reduced.data,
            statistics: reduced.statistics,
            rows,
            rows_before_limit_at_least: reduced.rows_before_limit_at_least,
        })
    }
}

#[async_trait]
impl QueryBackend for StreamingExecutor {
    async fn execute(
        &self,
        sql: &str,
        params: &ParamsRecord,
        options: &BackendOptions,
    ) -> Result<QueryOutcome> {
        let execution = QueryExecution::new(sql, params.clone(), options.clone());

        info!(
            target: "queries",
            query_id = %execution.query_id,
            database = %options.database,
            options = %serde_json::to_string(options).unwrap_or_default(),
            params = %serde_json::to_string(params).unwrap_or_default(),
            sql = %sql,
            "Executing query"
        );

        let outcome = self
            .run(&execution)
            .await
            .map_err(|e| e.with_query_id(execution.query_id.clone()))?;

        info!(
            target: "queries",
            query_id = %outcome.query_id,
            elapsed = outcome.statistics.elapsed,
            rows_read = outcome.statistics.rows_read,
            bytes_read = outcome.statistics.bytes_read,
            rows = outcome.rows,
            "Query completed"
        );

        Ok(outcome)
    }
}
