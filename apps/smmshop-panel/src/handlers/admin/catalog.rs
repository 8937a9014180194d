use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use smmshop_db::models::catalog::{Category, NewPaymentMethod, NewService, PaymentMethod, Service, ServiceUpdate};
use smmshop_db::repositories::category_repo::SubtreeRemoval;
use smmshop_db::repositories::service_repo::ServiceRemoval;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::StoreResult;

#[derive(Debug, Deserialize)]
pub struct CategoryBody {
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceFilter {
    pub category_id: Option<i64>,
    #[serde(default)]
    pub only_available: bool,
}

pub async fn list_categories(State(state): State<AppState>) -> StoreResult<Json<Vec<Category>>> {
    Ok(Json(state.catalog_service.all_categories().await?))
}

pub async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<Category>> {
    Ok(Json(state.catalog_service.get_category(id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryBody>,
) -> StoreResult<Json<Category>> {
    Ok(Json(state.catalog_service.create_category(&body.name, body.parent_id).await?))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CategoryBody>,
) -> StoreResult<Json<Category>> {
    Ok(Json(
        state
            .catalog_service
            .update_category(id, &body.name, body.parent_id)
            .await?,
    ))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> StoreResult<Json<SubtreeRemoval>> {
    Ok(Json(state.catalog_service.delete_category(id).await?))
}

pub async fn list_services(
    State(state): State<AppState>,
    Query(filter): Query<ServiceFilter>,
) -> StoreResult<Json<Vec<Service>>> {
    Ok(Json(
        state
            .catalog_service
            .list_services(filter.category_id, filter.only_available)
            .await?,
    ))
}

pub async fn get_service(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<Service>> {
    Ok(Json(state.catalog_service.get_service(id).await?))
}

pub async fn create_service(State(state): State<AppState>, Json(body): Json<NewService>) -> StoreResult<Json<Service>> {
    Ok(Json(state.catalog_service.create_service(body).await?))
}

pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ServiceUpdate>,
) -> StoreResult<Json<Service>> {
    Ok(Json(state.catalog_service.update_service(id, body).await?))
}

pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> StoreResult<Json<ServiceRemoval>> {
    Ok(Json(state.catalog_service.delete_service(id).await?))
}

pub async fn list_payment_methods(State(state): State<AppState>) -> StoreResult<Json<Vec<PaymentMethod>>> {
    Ok(Json(state.catalog_service.all_payment_methods().await?))
}

pub async fn create_payment_method(
    State(state): State<AppState>,
    Json(body): Json<NewPaymentMethod>,
) -> StoreResult<Json<PaymentMethod>> {
    Ok(Json(state.catalog_service.create_payment_method(body).await?))
}

pub async fn update_payment_method(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewPaymentMethod>,
) -> StoreResult<Json<PaymentMethod>> {
    Ok(Json(state.catalog_service.update_payment_method(id, body).await?))
}

pub async fn delete_payment_method(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<Value>> {
    state.catalog_service.delete_payment_method(id).await?;
    Ok(Json(json!({ "success": true })))
}
