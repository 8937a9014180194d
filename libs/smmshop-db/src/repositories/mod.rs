pub mod category_repo;
pub mod mapping_repo;
pub mod order_repo;
pub mod payment_method_repo;
pub mod payment_repo;
pub mod provider_repo;
pub mod service_repo;
pub mod user_repo;
pub mod withdrawal_repo;
