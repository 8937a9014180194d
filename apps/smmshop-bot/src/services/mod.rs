pub mod admin_service;
pub mod settings_service;
pub mod store_service;
