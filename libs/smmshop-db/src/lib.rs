pub mod db;
pub mod models;
pub mod repositories;
pub mod utils;

pub use db::{init_db, init_memory_db};
pub use sqlx;
