pub mod catalog;
pub mod finance;
pub mod order;
pub mod provider;
pub mod user;
