//! Endpoints consumed by the Telegram bot process.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use smmshop_shared::api::{
    AdminCheckRequest, AdminCheckResponse, AdminCreditRequest, BalanceChange, CategoryPage, CategoryView,
    OrderView, PaymentMethodView, PlaceOrderRequest, PlaceOrderResponse, Quote, QuoteRequest, ReferralSummary,
    RegisterUserRequest, RegisterUserResponse, ServiceView, SettingValue, UserView, WithdrawalRequest,
    WithdrawalView,
};

use crate::AppState;
use crate::error::StoreResult;
use crate::handlers::auth::bot_auth_middleware;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register_user))
        .route("/users/{tg_id}", get(get_user))
        .route("/users/{tg_id}/orders", get(user_orders))
        .route("/users/{tg_id}/referral", get(referral_summary))
        .route("/categories", get(root_categories))
        .route("/categories/{id}", get(category_page))
        .route("/services/{id}", get(get_service))
        .route("/orders/quote", post(quote_order))
        .route("/orders", post(place_order))
        .route("/withdrawals", post(request_withdrawal))
        .route("/payment-methods", get(payment_methods))
        .route("/settings/{key}", get(get_setting))
        .route("/admin/check", post(admin_check))
        .route("/admin/credit", post(admin_credit))
        .layer(axum::middleware::from_fn_with_state(state, bot_auth_middleware))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> StoreResult<Json<RegisterUserResponse>> {
    let (user, is_new) = state
        .user_service
        .register(
            req.telegram_id,
            req.username.as_deref(),
            req.full_name.as_deref(),
            req.start_payload.as_deref(),
        )
        .await?;
    Ok(Json(RegisterUserResponse {
        user: user.into(),
        is_new,
    }))
}

pub async fn get_user(State(state): State<AppState>, Path(tg_id): Path<i64>) -> StoreResult<Json<UserView>> {
    Ok(Json(state.user_service.get(tg_id).await?.into()))
}

pub async fn user_orders(
    State(state): State<AppState>,
    Path(tg_id): Path<i64>,
    Query(q): Query<LimitQuery>,
) -> StoreResult<Json<Vec<OrderView>>> {
    let orders = state
        .order_service
        .list_for_user(tg_id, q.limit.unwrap_or(10))
        .await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

pub async fn referral_summary(
    State(state): State<AppState>,
    Path(tg_id): Path<i64>,
) -> StoreResult<Json<ReferralSummary>> {
    Ok(Json(state.user_service.referral_summary(tg_id).await?))
}

pub async fn root_categories(State(state): State<AppState>) -> StoreResult<Json<Vec<CategoryView>>> {
    let categories = state.catalog_service.root_categories().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

pub async fn category_page(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<CategoryPage>> {
    Ok(Json(state.catalog_service.category_page(id, true).await?))
}

pub async fn get_service(State(state): State<AppState>, Path(id): Path<i64>) -> StoreResult<Json<ServiceView>> {
    Ok(Json(state.catalog_service.get_service(id).await?.into()))
}

pub async fn quote_order(State(state): State<AppState>, Json(req): Json<QuoteRequest>) -> StoreResult<Json<Quote>> {
    Ok(Json(
        state
            .order_service
            .quote(req.telegram_id, req.service_id, req.quantity)
            .await?,
    ))
}

pub async fn place_order(
    State(state): State<AppState>,
    Json(req): Json<PlaceOrderRequest>,
) -> StoreResult<Json<PlaceOrderResponse>> {
    Ok(Json(state.order_service.place_order(&req).await?))
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<WithdrawalRequest>,
) -> StoreResult<Json<WithdrawalView>> {
    let withdrawal = state
        .withdrawal_service
        .request(req.telegram_id, req.amount, req.kind, &req.payment_info)
        .await?;
    Ok(Json(withdrawal.into()))
}

pub async fn payment_methods(State(state): State<AppState>) -> StoreResult<Json<Vec<PaymentMethodView>>> {
    let methods = state.catalog_service.available_payment_methods().await?;
    Ok(Json(methods.into_iter().map(Into::into).collect()))
}

pub async fn get_setting(State(state): State<AppState>, Path(key): Path<String>) -> Json<SettingValue> {
    let value = state.settings.get(&key).await;
    Json(SettingValue { key, value })
}

pub async fn admin_check(
    State(state): State<AppState>,
    Json(req): Json<AdminCheckRequest>,
) -> StoreResult<Json<AdminCheckResponse>> {
    Ok(Json(AdminCheckResponse {
        is_admin: state.user_service.is_admin(req.telegram_id).await?,
    }))
}

pub async fn admin_credit(
    State(state): State<AppState>,
    Json(req): Json<AdminCreditRequest>,
) -> StoreResult<Json<BalanceChange>> {
    Ok(Json(
        state
            .user_service
            .credit_by_admin(req.admin_telegram_id, req.target_telegram_id, req.amount)
            .await?,
    ))
}
