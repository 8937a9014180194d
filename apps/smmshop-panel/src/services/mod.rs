pub mod backup_service;
pub mod catalog_service;
pub mod notification_service;
pub mod order_service;
pub mod provider_service;
pub mod reconcile_service;
pub mod user_service;
pub mod withdrawal_service;
