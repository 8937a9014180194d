use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceProvider {
    pub id: i64,
    pub name: String,
    pub api_url: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceMapping {
    pub id: i64,
    pub service_id: i64,
    pub provider_id: i64,
    pub provider_service_id: String,
    pub min_quantity: i64,
    pub max_quantity: i64,
    /// Shop price divided by provider rate.
    pub price_multiplier: f64,
}

impl ServiceMapping {
    pub fn accepts_quantity(&self, quantity: i64) -> bool {
        quantity >= self.min_quantity && quantity <= self.max_quantity
    }
}

/// Mapping joined with the names admins need to read it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MappingDetails {
    pub id: i64,
    pub service_id: i64,
    pub service_name: String,
    pub provider_id: i64,
    pub provider_name: String,
    pub provider_active: bool,
    pub provider_service_id: String,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub price_multiplier: f64,
}
