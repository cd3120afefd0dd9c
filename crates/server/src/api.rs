use crate::routes::{RouteDoc, RouteSpec};
use crate::{ACTIVE_QUERIES, QUERY_COUNT, QUERY_ERRORS};
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chaingate_core::envelope::{ErrorEnvelope, UsageResponse};
use chaingate_core::orchestrator::UsageQuery;
use chaingate_core::value::RawParams;
use std::collections::HashMap;
use std::sync::Arc;

pub const API_PREFIX: &str = "/v1";

#[derive(Clone)]
pub struct ApiState {
    pub usage: UsageQuery,
    pub routes: Arc<Vec<Arc<RouteSpec>>>,
}

impl ApiState {
    pub fn new(usage: UsageQuery, routes: Vec<RouteSpec>) -> Self {
        Self {
            usage,
            routes: Arc::new(routes.into_iter().map(Arc::new).collect()),
        }
    }
}

/// Router for the contract listing and every declared usage route, to be
/// nested under [`API_PREFIX`].
pub fn create_api_router(state: ApiState) -> Router {
    let mut router = Router::new().route("/contracts", get(list_contracts));

    for route in state.routes.iter().cloned() {
        let path = route.path;
        router = router.route(
            path,
            get(
                move |State(state): State<ApiState>,
                      path: Option<Path<HashMap<String, String>>>,
                      RawQuery(query): RawQuery| {
                    let route = route.clone();
                    async move { usage_handler(state, route, path, query).await }
                },
            ),
        );
    }

    router.with_state(state)
}

async fn list_contracts(State(state): State<ApiState>) -> Json<Vec<RouteDoc>> {
    Json(state.routes.iter().map(|r| r.doc(API_PREFIX)).collect())
}

async fn usage_handler(
    state: ApiState,
    route: Arc<RouteSpec>,
    path: Option<Path<HashMap<String, String>>>,
    query: Option<String>,
) -> Response {
    let path = path.map(|Path(p)| RawParams::from(p)).unwrap_or_default();
    let query = RawParams::from_query_string(query.as_deref().unwrap_or_default());

    let validated = route
        .path_contract
        .validate(&path)
        .and_then(|path| Ok((path, route.query_contract.validate(&query)?)));

    let response = match validated {
        Ok((path, query)) => {
            QUERY_COUNT.inc();
            let _active = ActiveQueryGuard::enter();
            state.usage.run(route.request(path, query)).await
        }
        Err(e) => {
            tracing::warn!(target: "errors", route = route.path, "{}", e);
            UsageResponse::Error(ErrorEnvelope::from(&e))
        }
    };

    if let UsageResponse::Error(e) = &response {
        QUERY_ERRORS.with_label_values(&[e.code.as_str()]).inc();
    }

    into_response(response)
}

/// Holds one slot of the active-queries gauge; released on drop, including
/// when the client disconnects mid-query.
pub(crate) struct ActiveQueryGuard;

impl ActiveQueryGuard {
    pub(crate) fn enter() -> Self {
        ACTIVE_QUERIES.inc();
        Self
    }
}

impl Drop for ActiveQueryGuard {
    fn drop(&mut self) {
        ACTIVE_QUERIES.dec();
    }
}

/// Send an envelope as the final HTTP response: 200 for success, the
/// declared status otherwise.
pub fn into_response(response: UsageResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}
