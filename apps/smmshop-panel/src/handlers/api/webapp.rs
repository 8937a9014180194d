use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use smmshop_shared::api::{WebAppData, WebAppDataRequest};
use tracing::warn;

use crate::AppState;
use crate::error::{StoreError, StoreResult};
use crate::webapp::validate_init_data;

const WEBAPP_ORDERS: i64 = 20;

pub fn routes() -> Router<AppState> {
    Router::new().route("/data", post(webapp_data))
}

/// POST /api/webapp/data
pub async fn webapp_data(
    State(state): State<AppState>,
    Json(req): Json<WebAppDataRequest>,
) -> StoreResult<Json<WebAppData>> {
    let Some(bot_token) = state.config.bot_token.as_deref() else {
        return Err(StoreError::Unauthorized("WebApp is not configured".to_string()));
    };

    let tg_user = validate_init_data(
        &req.init_data,
        bot_token,
        state.config.webapp_max_age_secs,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!("Rejected WebApp init data: {}", e);
        StoreError::Unauthorized(format!("Invalid init data: {}", e))
    })?;

    let full_name = tg_user.full_name();
    let (user, _) = state
        .user_service
        .register(tg_user.id, tg_user.username.as_deref(), full_name.as_deref(), None)
        .await?;
    let orders = state.order_service.list_for_user(user.telegram_id, WEBAPP_ORDERS).await?;
    let categories = state.catalog_service.root_categories().await?;
    let services = state.catalog_service.list_services(None, true).await?;

    Ok(Json(WebAppData {
        user: user.into(),
        orders: orders.into_iter().map(Into::into).collect(),
        categories: categories.into_iter().map(Into::into).collect(),
        services: services.into_iter().map(Into::into).collect(),
    }))
}
