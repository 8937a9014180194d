use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use smmshop_db::models::order::ShopStats;
use std::collections::{BTreeMap, HashMap};

use crate::AppState;
use crate::error::{StoreError, StoreResult};
use crate::settings::validate_setting;

#[derive(Debug, Deserialize)]
pub struct SettingBody {
    pub value: String,
}

pub async fn stats(State(state): State<AppState>) -> StoreResult<Json<ShopStats>> {
    Ok(Json(state.order_service.stats().await?))
}

pub async fn list_settings(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.settings.all().await)
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(body): Json<HashMap<String, String>>,
) -> StoreResult<Json<BTreeMap<String, String>>> {
    for (key, value) in &body {
        validate_setting(key, value).map_err(|e| StoreError::validation(e.to_string()))?;
    }
    state.settings.set_multiple(body).await?;
    Ok(Json(state.settings.all().await))
}

pub async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> StoreResult<Json<Value>> {
    validate_setting(&key, &body.value).map_err(|e| StoreError::validation(e.to_string()))?;
    state.settings.set(&key, &body.value).await?;
    Ok(Json(json!({ "key": key, "value": body.value })))
}

/// Sends a snapshot to the backup chat right away.
pub async fn send_backup(State(state): State<AppState>) -> StoreResult<Json<Value>> {
    let chat_id = state
        .config
        .backup_chat_id
        .ok_or_else(|| StoreError::validation("BACKUP_CHAT_ID is not configured"))?;
    state.backup_service.send_backup(chat_id).await?;
    Ok(Json(json!({ "success": true })))
}
