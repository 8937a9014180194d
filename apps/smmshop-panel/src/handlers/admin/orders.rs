use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use smmshop_db::models::finance::{Payment, Withdrawal};
use smmshop_db::models::order::Order;
use smmshop_shared::{OrderStatus, WithdrawalStatus};

use super::parse_filter;
use crate::AppState;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentFilter {
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_orders(State(state): State<AppState>, Query(f): Query<OrderFilter>) -> StoreResult<Json<Vec<Order>>> {
    let status = parse_filter::<OrderStatus>(f.status.as_deref())?;
    Ok(Json(
        state
            .order_service
            .list(status, f.limit.unwrap_or(100), f.offset.unwrap_or(0))
            .await?,
    ))
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<Order>> {
    Ok(Json(state.order_service.get(id).await?))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> StoreResult<Json<Order>> {
    let to = parse_filter::<OrderStatus>(Some(&body.status))?
        .ok_or_else(|| StoreError::validation("Status is required"))?;
    Ok(Json(state.order_service.update_status(id, to).await?))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Query(f): Query<StatusFilter>,
) -> StoreResult<Json<Vec<Withdrawal>>> {
    let status = parse_filter::<WithdrawalStatus>(f.status.as_deref())?;
    Ok(Json(state.withdrawal_service.list(status).await?))
}

pub async fn update_withdrawal_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> StoreResult<Json<Withdrawal>> {
    let to = parse_filter::<WithdrawalStatus>(Some(&body.status))?
        .ok_or_else(|| StoreError::validation("Status is required"))?;
    Ok(Json(state.withdrawal_service.update_status(id, to).await?))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(f): Query<PaymentFilter>,
) -> StoreResult<Json<Vec<Payment>>> {
    let payments = match f.user_id {
        Some(tg_id) => state.payment_repo.list_for_user(tg_id).await?,
        None => state.payment_repo.list(f.limit.unwrap_or(100).clamp(1, 1000)).await?,
    };
    Ok(Json(payments))
}
