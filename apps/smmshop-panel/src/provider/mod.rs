//! Client for upstream SMM panels speaking the common "API v2" dialect:
//! every call is a form POST carrying `key` and `action`.

pub mod client;
mod lenient;

pub use client::{ProviderBalance, ProviderClient, ProviderOrderStatus, ProviderServiceInfo, RemoteStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    Api(String),
    #[error("unexpected provider response: {0}")]
    Decode(String),
    #[error("provider balance {available:.4} is below the estimated cost {needed:.4}")]
    InsufficientBalance { needed: f64, available: f64 },
    #[error("provider service {0} not found")]
    UnknownService(String),
}
