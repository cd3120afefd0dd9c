//! Per-request usage query pipeline.
//!
//! A route handler hands over the validated path and query records; the
//! orchestrator merges them with the computed pagination fields, resolves the
//! target database, runs the assembled SQL and turns the outcome, successful
//! or not, into a [`UsageResponse`].
//!
//! Parameter precedence is explicit: path parameters, then query parameters,
//! then computed fields (`limit`, `offset`, `page`), folded left to right. A
//! later source wins on a key collision.

use crate::contract::{LIMIT_FIELD, PAGE_FIELD};
use crate::envelope::{ErrorEnvelope, SuccessEnvelope, UsageResponse};
use crate::executor::{BackendOptions, QueryBackend};
use crate::pagination::{compute_pagination, total_pages};
use crate::sql::SqlRegistry;
use crate::value::ParamsRecord;
use chaingate_common::config::QueryLimits;
use chaingate_common::networks::{ChainType, NetworkRegistry};
use chaingate_error::{ChainGateError, ErrorCode, ErrorContext, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, warn};

pub const NETWORK_FIELD: &str = "network";
pub const OFFSET_FIELD: &str = "offset";

/// Replaces backend messages that would reveal schema details.
pub const UNSUPPORTED_ENDPOINT_MESSAGE: &str = "Endpoint not supported for this network";

/// UNKNOWN_FUNCTION, UNKNOWN_IDENTIFIER, UNKNOWN_TABLE, UNKNOWN_DATABASE
const UNSUPPORTED_EXCEPTION_CODES: [i32; 4] = [46, 47, 60, 81];

const UNSUPPORTED_MARKERS: [&str; 2] = ["Unknown", "does not exist"];

/// One usage query request, after contract validation.
#[derive(Debug, Clone)]
pub struct UsageRequest {
    pub chain: ChainType,
    /// Template names, concatenated in order
    pub queries: Vec<String>,
    pub path: ParamsRecord,
    pub query: ParamsRecord,
    pub settings: BTreeMap<String, String>,
}

impl UsageRequest {
    pub fn new(chain: ChainType, queries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            chain,
            queries: queries.into_iter().map(Into::into).collect(),
            path: ParamsRecord::new(),
            query: ParamsRecord::new(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with_path(mut self, path: ParamsRecord) -> Self {
        self.path = path;
        self
    }

    pub fn with_query(mut self, query: ParamsRecord) -> Self {
        self.query = query;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Shared, read-only collaborators of every usage query.
#[derive(Clone)]
pub struct UsageQuery {
    backend: Arc<dyn QueryBackend>,
    sql: Arc<SqlRegistry>,
    networks: Arc<NetworkRegistry>,
    limits: QueryLimits,
    max_execution_time_secs: u64,
    cache_ttl_secs: u64,
}

impl UsageQuery {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        sql: Arc<SqlRegistry>,
        networks: Arc<NetworkRegistry>,
        limits: QueryLimits,
    ) -> Self {
        Self {
            backend,
            sql,
            networks,
            limits,
            max_execution_time_secs: chaingate_common::config::DEFAULT_MAX_EXECUTION_TIME_SECS,
            cache_ttl_secs: chaingate_common::config::DEFAULT_CACHE_TTL_SECS,
        }
    }

    pub fn with_max_execution_time(mut self, secs: u64) -> Self {
        self.max_execution_time_secs = secs;
        self
    }

    pub fn with_cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    /// Run the request. Every failure is classified into an error envelope.
    pub async fn run(&self, request: UsageRequest) -> UsageResponse {
        let request_time = Utc::now();
        match self.execute(&request, request_time).await {
            Ok(envelope) => UsageResponse::Success(envelope),
            Err(err) => UsageResponse::Error(self.classify(&request, err)),
        }
    }

    async fn execute(
        &self,
        request: &UsageRequest,
        request_time: DateTime<Utc>,
    ) -> Result<SuccessEnvelope> {
        let supplied = request.path.clone().overlay(request.query.clone());

        let page = supplied
            .get_u64(PAGE_FIELD)
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let limit = supplied
            .get_u64(LIMIT_FIELD)
            .filter(|l| *l > 0)
            .unwrap_or(self.limits.default_limit);
        let offset = limit.saturating_mul(page - 1);

        let computed = ParamsRecord::new()
            .with(LIMIT_FIELD, limit)
            .with(OFFSET_FIELD, offset)
            .with(PAGE_FIELD, page);
        let params = [request.path.clone(), request.query.clone(), computed]
            .into_iter()
            .fold(ParamsRecord::new(), ParamsRecord::overlay);

        let network = params.get_str(NETWORK_FIELD).ok_or_else(|| {
            ChainGateError::new(
                ErrorCode::BadQueryInput,
                format!("Missing '{}' parameter", NETWORK_FIELD),
            )
        })?;
        let database = self.networks.resolve(network, request.chain)?;
        let sql = self.sql.assemble(request.chain, &request.queries)?;

        let options = BackendOptions {
            database: database.to_string(),
            cache_ttl_secs: Some(self.cache_ttl_secs),
            settings: request.settings.clone(),
        };
        let outcome = self.backend.execute(&sql, &params, &options).await?;

        let elapsed = outcome.statistics.elapsed;
        if elapsed >= self.max_execution_time_secs as f64 {
            return Err(ChainGateError::new(
                ErrorCode::DatabaseTimeout,
                format!(
                    "Query took {:.2}s, limit is {}s",
                    elapsed, self.max_execution_time_secs
                ),
            )
            .with_context(ErrorContext::Timeout {
                elapsed_secs: elapsed,
                max_execution_time_secs: self.max_execution_time_secs,
            })
            .with_query_id(outcome.query_id));
        }

        let total_results = outcome
            .rows_before_limit_at_least
            .unwrap_or(offset + outcome.data.len() as u64);

        let last_page = total_pages(limit, total_results);
        if page > 1 && page > last_page {
            return Err(ChainGateError::new(
                ErrorCode::BadQueryInput,
                format!("Requested page {} exceeds total pages {}", page, last_page),
            )
            .with_context(ErrorContext::Pagination {
                current_page: page,
                rows_per_page: limit,
                total_rows: total_results,
            }));
        }

        let pagination = compute_pagination(page, limit, total_results)?;
        let duration_ms = (Utc::now() - request_time).num_milliseconds().max(0) as u64;

        Ok(SuccessEnvelope {
            results: outcome.data.len(),
            data: outcome.data,
            statistics: outcome.statistics,
            pagination,
            total_results,
            request_time,
            duration_ms,
        })
    }

    fn classify(&self, request: &UsageRequest, err: ChainGateError) -> ErrorEnvelope {
        let queries = request.queries.join(",");
        let query_id = err.query_id.as_deref().unwrap_or("-");

        if err.code.status() >= 500 {
            error!(
                target: "errors",
                code = %err.code,
                chain = %request.chain,
                queries = %queries,
                query_id = %query_id,
                fatal = err.is_fatal(),
                "{}",
                err
            );
        } else {
            warn!(
                target: "errors",
                code = %err.code,
                chain = %request.chain,
                queries = %queries,
                "{}",
                err
            );
        }

        if err.code == ErrorCode::BadDatabaseResponse && is_unsupported_endpoint(&err) {
            return ErrorEnvelope::new(err.code, UNSUPPORTED_ENDPOINT_MESSAGE);
        }
        ErrorEnvelope::from(&err)
    }
}

/// Whether a backend failure means the endpoint's objects are missing for
/// the network, judged by exception code first and message text second.
fn is_unsupported_endpoint(err: &ChainGateError) -> bool {
    if let Some(ErrorContext::Backend {
        exception_code: Some(code),
        ..
    }) = &err.context
    {
        if UNSUPPORTED_EXCEPTION_CODES.contains(code) {
            return true;
        }
    }
    UNSUPPORTED_MARKERS
        .iter()
        .any(|marker| err.message.contains(marker))
}
