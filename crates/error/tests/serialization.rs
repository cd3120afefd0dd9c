use chaingate_error::{ChainGateError, ErrorCode, ErrorContext, FieldIssue};
use serde_json::Value;

#[test]
fn test_json_serialization() {
    let error = ChainGateError::new(ErrorCode::BadQueryInput, "Invalid value for 'address'")
        .with_context(ErrorContext::Validation {
            issues: vec![FieldIssue {
                field: "address".to_string(),
                item: Some("0x12".to_string()),
                reason: "expected 0x followed by 40 hex characters".to_string(),
            }],
        })
        .with_hint("Separate multiple addresses with ','");

    let json = error.to_json();
    let v: Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(v["code"], "bad_query_input");
    assert_eq!(v["message"], "Invalid value for 'address'");
    assert_eq!(v["hint"], "Separate multiple addresses with ','");
    assert_eq!(v["context"]["type"], "validation");
    assert_eq!(v["context"]["issues"][0]["field"], "address");
    assert!(v.get("query_id").is_none());
}

#[test]
fn test_query_id_mismatch_serialization() {
    let error = ChainGateError::new(ErrorCode::QueryIdMismatch, "query id mismatch")
        .with_context(ErrorContext::QueryIdMismatch {
            sent: "a".to_string(),
            received: Some("b".to_string()),
        })
        .with_query_id("a");

    let v: Value = serde_json::from_str(&error.to_json()).unwrap();
    assert_eq!(v["code"], "query_id_mismatch");
    assert_eq!(v["query_id"], "a");
    assert_eq!(v["context"]["received"], "b");
}

#[test]
fn test_error_code_parsing() {
    let code: ErrorCode = "database_timeout".to_string().try_into().unwrap();
    assert_eq!(code, ErrorCode::DatabaseTimeout);
}
