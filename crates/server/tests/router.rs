use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chaingate_common::config::QueryLimits;
use chaingate_common::networks::{ChainType, NetworkConfig, NetworkRegistry};
use chaingate_core::executor::{
    backend_error, BackendOptions, ProgressStatistics, QueryBackend, QueryOutcome,
};
use chaingate_core::orchestrator::UsageQuery;
use chaingate_core::sql::SqlRegistry;
use chaingate_core::value::{ParamValue, ParamsRecord};
use chaingate_error::Result;
use chaingate_server::{build_router, usage_routes, ApiState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Default)]
struct RecordingBackend {
    fail_with: Option<String>,
    calls: Mutex<Vec<(String, ParamsRecord, BackendOptions)>>,
}

#[async_trait]
impl QueryBackend for RecordingBackend {
    async fn execute(
        &self,
        sql: &str,
        params: &ParamsRecord,
        options: &BackendOptions,
    ) -> Result<QueryOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone(), options.clone()));
        if let Some(message) = &self.fail_with {
            return Err(backend_error(message, None, Some(500)));
        }
        Ok(QueryOutcome {
            query_id: "q-1".to_string(),
            data: vec![json!({"amount": "1"}), json!({"amount": "2"})],
            statistics: ProgressStatistics {
                elapsed: 0.05,
                rows_read: 2,
                bytes_read: 64,
            },
            rows: 2,
            rows_before_limit_at_least: Some(2),
        })
    }
}

fn app(backend: Arc<RecordingBackend>) -> Router {
    let mut sql = SqlRegistry::new();
    sql.insert(ChainType::Evm, "balances", "SELECT 'balances'");
    sql.insert(ChainType::Evm, "holders", "SELECT 'holders'");
    sql.insert(ChainType::Svm, "transfers", "SELECT 'svm transfers'");
    let networks = NetworkRegistry::from_configs(&[
        NetworkConfig {
            id: "mainnet".to_string(),
            chain: ChainType::Evm,
            database: "mainnet:evm-tokens".to_string(),
        },
        NetworkConfig {
            id: "solana".to_string(),
            chain: ChainType::Svm,
            database: "solana:svm-tokens".to_string(),
        },
    ])
    .unwrap();

    let limits = QueryLimits::default();
    let usage = UsageQuery::new(backend, Arc::new(sql), Arc::new(networks), limits);
    build_router(ApiState::new(usage, usage_routes(limits).unwrap()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

const VITALIK: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
const OTHER: &str = "0x0000000000000000000000000000000000000001";

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(Arc::default()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_balances_success() {
    let backend = Arc::new(RecordingBackend::default());
    let uri = format!("/v1/evm/balances?network=mainnet&address={},{}", VITALIK, OTHER);
    let (status, body) = get(app(backend.clone()), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);
    assert_eq!(body["total_results"], 2);
    assert_eq!(body["pagination"]["total_pages"], 1);
    assert_eq!(body["statistics"]["rows_read"], 2);

    let calls = backend.calls.lock().unwrap();
    let (sql, params, options) = &calls[0];
    assert_eq!(sql, "SELECT 'balances'");
    assert_eq!(options.database, "mainnet:evm-tokens");
    assert_eq!(
        params.get("address"),
        Some(&ParamValue::from(vec![VITALIK, OTHER]))
    );
    assert_eq!(params.get_u64("offset"), Some(0));
}

#[tokio::test]
async fn test_repeated_keys_equal_delimited_values() {
    let backend = Arc::new(RecordingBackend::default());
    let uri = format!(
        "/v1/evm/balances?network=mainnet&address={}&address={}",
        VITALIK, OTHER
    );
    let (status, _) = get(app(backend.clone()), &uri).await;
    assert_eq!(status, StatusCode::OK);

    let calls = backend.calls.lock().unwrap();
    assert_eq!(
        calls[0].1.get("address"),
        Some(&ParamValue::from(vec![VITALIK, OTHER]))
    );
}

#[tokio::test]
async fn test_invalid_input_never_reaches_backend() {
    let backend = Arc::new(RecordingBackend::default());
    let (status, body) = get(
        app(backend.clone()),
        "/v1/evm/balances?network=mainnet&address=nope",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["code"], "bad_query_input");
    assert!(body["message"].as_str().unwrap().contains("address"));
    assert!(backend.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_limit_above_ceiling_is_rejected() {
    let uri = format!("/v1/evm/balances?network=mainnet&address={}&limit=5000", VITALIK);
    let (status, body) = get(app(Arc::default()), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_query_input");
}

#[tokio::test]
async fn test_unknown_network() {
    let uri = format!("/v1/evm/balances?network=moonbase&address={}", VITALIK);
    let (status, body) = get(app(Arc::default()), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "network_not_found");
}

#[tokio::test]
async fn test_missing_template_is_server_error() {
    let uri = format!("/v1/evm/transfers?network=mainnet&contract={}", VITALIK);
    let (status, body) = get(app(Arc::default()), &uri).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "query_not_found");
}

#[tokio::test]
async fn test_backend_timeout_maps_to_gateway_timeout() {
    let backend = Arc::new(RecordingBackend {
        fail_with: Some("Code: 159. DB::Exception: Timeout exceeded (TIMEOUT_EXCEEDED)".into()),
        ..Default::default()
    });
    let uri = format!("/v1/evm/balances?network=mainnet&address={}", VITALIK);
    let (status, body) = get(app(backend), &uri).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "database_timeout");
}

#[tokio::test]
async fn test_path_parameter_is_bound() {
    let backend = Arc::new(RecordingBackend::default());
    let uri = format!("/v1/evm/holders/{}?network=mainnet", VITALIK.to_uppercase().replace("0X", "0x"));
    let (status, _) = get(app(backend.clone()), &uri).await;
    assert_eq!(status, StatusCode::OK);

    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls[0].0, "SELECT 'holders'");
    assert_eq!(calls[0].1.get_str("contract"), Some(VITALIK));
    assert_eq!(
        calls[0].2.settings.get("optimize_aggregation_in_order").map(String::as_str),
        Some("1")
    );
}

#[tokio::test]
async fn test_svm_route_uses_svm_network() {
    let backend = Arc::new(RecordingBackend::default());
    let uri = "/v1/svm/transfers?network=solana&mint=EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    let (status, _) = get(app(backend.clone()), uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        backend.calls.lock().unwrap()[0].2.database,
        "solana:svm-tokens"
    );
}

#[tokio::test]
async fn test_contracts_listing() {
    let (status, body) = get(app(Arc::default()), "/v1/contracts").await;
    assert_eq!(status, StatusCode::OK);

    let routes = body.as_array().unwrap();
    assert_eq!(routes.len(), 4);
    let holders = routes
        .iter()
        .find(|r| r["path"] == "/v1/evm/holders/{contract}")
        .unwrap();
    assert_eq!(holders["path_params"][0]["name"], "contract");
    assert_eq!(holders["chain"], "evm");
}
