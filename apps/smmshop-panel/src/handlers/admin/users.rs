use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use smmshop_db::models::finance::Withdrawal;
use smmshop_db::models::order::Order;
use smmshop_db::models::user::User;
use smmshop_shared::WithdrawalKind;

use crate::AppState;
use crate::error::StoreResult;
use crate::services::user_service::BalanceOp;

#[derive(Debug, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceBody {
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustBody {
    pub amount: i64,
    pub op: BalanceOp,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminFlagBody {
    pub is_admin: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct UserDetails {
    pub user: User,
    pub orders: Vec<Order>,
    pub withdrawals: Vec<Withdrawal>,
}

pub async fn list_users(State(state): State<AppState>, Query(q): Query<UserSearch>) -> StoreResult<Json<Vec<User>>> {
    Ok(Json(state.user_service.list(q.q.as_deref()).await?))
}

pub async fn get_user(State(state): State<AppState>, Path(tg_id): Path<i64>) -> StoreResult<Json<UserDetails>> {
    let user = state.user_service.get(tg_id).await?;
    let orders = state.order_service.list_for_user(tg_id, 50).await?;
    let withdrawals = state.withdrawal_service.list_for_user(tg_id).await?;
    Ok(Json(UserDetails {
        user,
        orders,
        withdrawals,
    }))
}

pub async fn set_balance(
    State(state): State<AppState>,
    Path(tg_id): Path<i64>,
    Json(body): Json<BalanceBody>,
) -> StoreResult<Json<User>> {
    Ok(Json(
        state
            .user_service
            .set_balance(tg_id, WithdrawalKind::Main, body.balance)
            .await?,
    ))
}

pub async fn set_referral_balance(
    State(state): State<AppState>,
    Path(tg_id): Path<i64>,
    Json(body): Json<BalanceBody>,
) -> StoreResult<Json<User>> {
    Ok(Json(
        state
            .user_service
            .set_balance(tg_id, WithdrawalKind::Referral, body.balance)
            .await?,
    ))
}

pub async fn adjust_balance(
    State(state): State<AppState>,
    Path(tg_id): Path<i64>,
    Json(body): Json<AdjustBody>,
) -> StoreResult<Json<User>> {
    Ok(Json(state.user_service.adjust_balance(tg_id, body.amount, body.op).await?))
}

pub async fn message_user(
    State(state): State<AppState>,
    Path(tg_id): Path<i64>,
    Json(body): Json<MessageBody>,
) -> StoreResult<Json<Value>> {
    state.user_service.message_user(tg_id, &body.text).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn set_admin(
    State(state): State<AppState>,
    Path(tg_id): Path<i64>,
    Json(body): Json<AdminFlagBody>,
) -> StoreResult<Json<User>> {
    state.user_service.grant_admin(tg_id, body.is_admin).await?;
    Ok(Json(state.user_service.get(tg_id).await?))
}
