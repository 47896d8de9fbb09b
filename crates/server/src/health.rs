//! Health endpoint: reports store connectivity.

use std::collections::BTreeMap;

use api_types::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode};

use crate::server::ServerState;

pub async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();

    let db_ok = match state.ledger.ping().await {
        Ok(()) => {
            checks.insert("database".to_string(), "ok".to_string());
            true
        }
        Err(err) => {
            checks.insert("database".to_string(), format!("error: {err}"));
            false
        }
    };

    let status = if db_ok { "ok" } else { "error" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            checks,
        }),
    )
}
