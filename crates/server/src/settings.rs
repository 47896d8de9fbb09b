//! Settings API endpoints.

use std::collections::BTreeMap;

use api_types::settings::{SettingsResponse, SettingsUpdate};
use axum::{Json, extract::State, http::StatusCode};

use crate::{ServerError, server::ServerState};

/// Keys whose values are never echoed back.
const MASKED_KEYS: &[&str] = &["smtp_password"];

pub async fn list(State(state): State<ServerState>) -> Result<Json<SettingsResponse>, ServerError> {
    let mut settings: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in state.ledger.settings_snapshot().await? {
        let value = if MASKED_KEYS.contains(&key.as_str()) && !value.is_empty() {
            "********".to_string()
        } else {
            value
        };
        settings.insert(key, value);
    }
    Ok(Json(SettingsResponse { settings }))
}

pub async fn update(
    State(state): State<ServerState>,
    Json(payload): Json<SettingsUpdate>,
) -> Result<StatusCode, ServerError> {
    for (key, value) in &payload.settings {
        state.ledger.set_setting(key, value).await?;
    }
    tracing::info!(count = payload.settings.len(), "settings updated");
    Ok(StatusCode::OK)
}
