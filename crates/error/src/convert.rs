use crate::{ChainGateError, ErrorCode, ErrorContext};

impl From<serde_json::Error> for ChainGateError {
    fn from(err: serde_json::Error) -> Self {
        ChainGateError::new(
            ErrorCode::BadDatabaseResponse,
            format!("Failed to decode backend response: {}", err),
        )
    }
}

impl From<std::io::Error> for ChainGateError {
    fn from(err: std::io::Error) -> Self {
        ChainGateError::new(ErrorCode::InternalServerError, err.to_string())
    }
}

impl From<reqwest::Error> for ChainGateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ChainGateError::new(
                ErrorCode::DatabaseTimeout,
                format!("Backend request timed out: {}", err),
            );
        }
        let error = ChainGateError::new(
            ErrorCode::BadDatabaseResponse,
            format!("Backend request failed: {}", err),
        );
        match err.status() {
            Some(status) => error.with_context(ErrorContext::Backend {
                exception_code: None,
                http_status: Some(status.as_u16()),
            }),
            None => error,
        }
    }
}
