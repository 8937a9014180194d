use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use smmshop_db::models::provider::{MappingDetails, ServiceMapping, ServiceProvider};

use crate::AppState;
use crate::error::StoreResult;
use crate::provider::{ProviderBalance, ProviderServiceInfo};
use crate::services::provider_service::{
    ImportRequest, ImportedService, MappingRequest, MappingUpdateRequest, NewProviderRequest,
};
use crate::services::reconcile_service::CycleSummary;

pub async fn list_providers(State(state): State<AppState>) -> StoreResult<Json<Vec<ServiceProvider>>> {
    Ok(Json(state.provider_service.list_providers().await?))
}

pub async fn add_provider(
    State(state): State<AppState>,
    Json(body): Json<NewProviderRequest>,
) -> StoreResult<Json<ServiceProvider>> {
    Ok(Json(state.provider_service.add_provider(&body).await?))
}

pub async fn toggle_provider(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<ServiceProvider>> {
    Ok(Json(state.provider_service.toggle_provider(id).await?))
}

pub async fn delete_provider(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<Value>> {
    state.provider_service.delete_provider(id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn provider_services(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> StoreResult<Json<Vec<ProviderServiceInfo>>> {
    Ok(Json(state.provider_service.provider_services(id).await?))
}

pub async fn provider_balance(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<ProviderBalance>> {
    Ok(Json(state.provider_service.provider_balance(id).await?))
}

pub async fn list_mappings(State(state): State<AppState>) -> StoreResult<Json<Vec<MappingDetails>>> {
    Ok(Json(state.provider_service.list_mappings().await?))
}

pub async fn create_mapping(
    State(state): State<AppState>,
    Json(body): Json<MappingRequest>,
) -> StoreResult<Json<ServiceMapping>> {
    Ok(Json(state.provider_service.create_mapping(&body).await?))
}

pub async fn update_mapping(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MappingUpdateRequest>,
) -> StoreResult<Json<ServiceMapping>> {
    Ok(Json(state.provider_service.update_mapping(id, &body).await?))
}

pub async fn delete_mapping(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<Value>> {
    state.provider_service.delete_mapping(id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn import_service(
    State(state): State<AppState>,
    Json(body): Json<ImportRequest>,
) -> StoreResult<Json<ImportedService>> {
    Ok(Json(state.provider_service.import_service(&body).await?))
}

pub async fn run_reconcile(State(state): State<AppState>) -> StoreResult<Json<CycleSummary>> {
    Ok(Json(state.reconcile_service.run_cycle().await?))
}
