pub mod config;
pub mod error;
pub mod handlers;
pub mod provider;
pub mod services;
pub mod settings;
pub mod utils;
pub mod webapp;

use anyhow::Result;
use axum::Router;
use axum::http::{HeaderValue, header};
use smmshop_db::repositories::payment_repo::PaymentRepository;
use smmshop_db::repositories::user_repo::UserRepository;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use config::Config;
use services::backup_service::BackupService;
use services::catalog_service::CatalogService;
use services::notification_service::{NotificationService, Notifier};
use services::order_service::OrderService;
use services::provider_service::ProviderService;
use services::reconcile_service::ReconcileService;
use services::user_service::UserService;
use services::withdrawal_service::WithdrawalService;
use settings::SettingsService;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub settings: Arc<SettingsService>,
    pub notifications: NotificationService,
    pub user_service: UserService,
    pub catalog_service: CatalogService,
    pub order_service: OrderService,
    pub withdrawal_service: WithdrawalService,
    pub provider_service: ProviderService,
    pub reconcile_service: ReconcileService,
    pub backup_service: BackupService,
    pub payment_repo: PaymentRepository,
}

impl AppState {
    pub async fn new(pool: SqlitePool, config: Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let settings = Arc::new(SettingsService::new(pool.clone()).await?);
        let notifications = NotificationService::new(
            notifier,
            UserRepository::new(pool.clone()),
            config.admin_ids.clone(),
        );

        let user_service = UserService::new(
            pool.clone(),
            settings.clone(),
            notifications.clone(),
            config.admin_ids.clone(),
        );
        let catalog_service = CatalogService::new(pool.clone());
        let order_service = OrderService::new(pool.clone(), notifications.clone());
        let withdrawal_service = WithdrawalService::new(pool.clone(), settings.clone(), notifications.clone());
        let provider_service = ProviderService::new(pool.clone(), config.provider_timeout);
        let reconcile_service = ReconcileService::new(
            pool.clone(),
            order_service.clone(),
            provider_service.clone(),
            notifications.clone(),
            &config,
        );
        let backup_service = BackupService::new(
            pool.clone(),
            notifications.clone(),
            config.backup_chat_id,
            config.backup_interval_hours,
        );

        Ok(Self {
            payment_repo: PaymentRepository::new(pool.clone()),
            pool,
            config: Arc::new(config),
            settings,
            notifications,
            user_service,
            catalog_service,
            order_service,
            withdrawal_service,
            provider_service,
            reconcile_service,
            backup_service,
        })
    }
}

/// Full HTTP surface: health, bot API, WebApp endpoint and admin API.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(handlers::health))
        .nest("/api/v2/bot", handlers::api::bot::routes(state.clone()))
        .nest("/api/webapp", handlers::api::webapp::routes())
        .nest("/api/admin", handlers::admin::routes(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}
