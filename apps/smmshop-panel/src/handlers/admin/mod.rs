//! JSON admin API, guarded by `X-API-Key`.

pub mod catalog;
pub mod orders;
pub mod providers;
pub mod settings;
pub mod users;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::AppState;
use crate::error::{StoreError, StoreResult};
use crate::handlers::auth::admin_auth_middleware;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(settings::stats))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/{tg_id}", get(users::get_user))
        .route("/users/{tg_id}/balance", put(users::set_balance))
        .route("/users/{tg_id}/referral-balance", put(users::set_referral_balance))
        .route("/users/{tg_id}/adjust", post(users::adjust_balance))
        .route("/users/{tg_id}/message", post(users::message_user))
        .route("/users/{tg_id}/admin", put(users::set_admin))
        // Catalog
        .route("/categories", get(catalog::list_categories).post(catalog::create_category))
        .route(
            "/categories/{id}",
            get(catalog::get_category)
                .put(catalog::update_category)
                .delete(catalog::delete_category),
        )
        .route("/services", get(catalog::list_services).post(catalog::create_service))
        .route(
            "/services/{id}",
            get(catalog::get_service)
                .put(catalog::update_service)
                .delete(catalog::delete_service),
        )
        .route(
            "/payment-methods",
            get(catalog::list_payment_methods).post(catalog::create_payment_method),
        )
        .route(
            "/payment-methods/{id}",
            put(catalog::update_payment_method).delete(catalog::delete_payment_method),
        )
        // Orders and money
        .route("/orders", get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/status", put(orders::update_order_status))
        .route("/withdrawals", get(orders::list_withdrawals))
        .route("/withdrawals/{id}/status", put(orders::update_withdrawal_status))
        .route("/payments", get(orders::list_payments))
        // Providers
        .route("/providers", get(providers::list_providers).post(providers::add_provider))
        .route("/providers/{id}", axum::routing::delete(providers::delete_provider))
        .route("/providers/{id}/toggle", post(providers::toggle_provider))
        .route("/providers/{id}/services", get(providers::provider_services))
        .route("/providers/{id}/balance", get(providers::provider_balance))
        .route("/mappings", get(providers::list_mappings).post(providers::create_mapping))
        .route("/mappings/import", post(providers::import_service))
        .route(
            "/mappings/{id}",
            put(providers::update_mapping).delete(providers::delete_mapping),
        )
        .route("/reconcile", post(providers::run_reconcile))
        // Settings
        .route("/settings", get(settings::list_settings).put(settings::save_settings))
        .route("/settings/{key}", put(settings::set_setting))
        .route("/backup", post(settings::send_backup))
        .layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

/// Parses an optional `?status=` filter into a typed status.
pub(crate) fn parse_filter<T>(raw: Option<&str>) -> StoreResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map(Some).map_err(|e: T::Err| StoreError::validation(e.to_string())),
        None => Ok(None),
    }
}
