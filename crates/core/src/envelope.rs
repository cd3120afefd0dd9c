//! Uniform response envelopes returned by usage queries.

use crate::executor::ProgressStatistics;
use crate::pagination::PaginationInfo;
use chaingate_error::{ChainGateError, ErrorCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessEnvelope {
    pub data: Vec<serde_json::Value>,
    pub statistics: ProgressStatistics,
    pub pagination: PaginationInfo,
    pub results: usize,
    pub total_results: u64,
    pub request_time: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status(),
            code,
            message: message.into(),
        }
    }
}

impl From<&ChainGateError> for ErrorEnvelope {
    fn from(err: &ChainGateError) -> Self {
        Self::new(err.code, err.message.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UsageResponse {
    Success(SuccessEnvelope),
    Error(ErrorEnvelope),
}

impl UsageResponse {
    /// HTTP status the envelope should be sent with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Error(e) => e.status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_shape() {
        let envelope = UsageResponse::Error(ErrorEnvelope::new(
            ErrorCode::NetworkNotFound,
            "Network 'foo' not found for evm endpoints",
        ));
        assert_eq!(envelope.status(), 400);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "status": 400,
                "code": "network_not_found",
                "message": "Network 'foo' not found for evm endpoints"
            })
        );
    }

    #[test]
    fn test_success_envelope_shape() {
        let request_time = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let envelope = UsageResponse::Success(SuccessEnvelope {
            data: vec![json!({"a": 1})],
            statistics: ProgressStatistics {
                elapsed: 0.5,
                rows_read: 10,
                bytes_read: 100,
            },
            pagination: PaginationInfo {
                previous_page: 1,
                current_page: 1,
                next_page: 1,
                total_pages: 1,
            },
            results: 1,
            total_results: 1,
            request_time,
            duration_ms: 12,
        });

        assert_eq!(envelope.status(), 200);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["statistics"]["rows_read"], 10);
        assert_eq!(value["pagination"]["total_pages"], 1);
        assert_eq!(value["request_time"], "2024-01-01T00:00:00Z");
        assert_eq!(value["results"], 1);
    }
}
