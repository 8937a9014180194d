use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smmshop_shared::api::{CategoryView, PaymentMethodView, ServiceView};
use smmshop_shared::money;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Cents charged per `base_quantity` units.
    pub base_price: i64,
    pub base_quantity: i64,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub is_available: bool,
    pub category_id: Option<i64>,
    pub link_instructions: Option<String>,
}

impl Service {
    pub fn accepts_quantity(&self, quantity: i64) -> bool {
        quantity >= self.min_quantity && quantity <= self.max_quantity
    }

    pub fn total_for(&self, quantity: i64) -> Option<i64> {
        money::order_total(quantity, self.base_price, self.base_quantity)
    }

    pub fn price_per_thousand(&self) -> f64 {
        money::price_per_thousand(self.base_price, self.base_quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentMethod {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub contact_user: Option<String>,
    pub is_available: bool,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Category> for CategoryView {
    fn from(c: Category) -> Self {
        CategoryView {
            id: c.id,
            name: c.name,
            parent_id: c.parent_id,
        }
    }
}

impl From<Service> for ServiceView {
    fn from(s: Service) -> Self {
        ServiceView {
            id: s.id,
            name: s.name,
            description: s.description,
            base_price: s.base_price,
            base_quantity: s.base_quantity,
            min_quantity: s.min_quantity,
            max_quantity: s.max_quantity,
            is_available: s.is_available,
            category_id: s.category_id,
            link_instructions: s.link_instructions,
        }
    }
}

impl From<PaymentMethod> for PaymentMethodView {
    fn from(p: PaymentMethod) -> Self {
        PaymentMethodView {
            id: p.id,
            name: p.name,
            description: p.description,
            contact_user: p.contact_user,
            instructions: p.instructions,
        }
    }
}

/// Fields accepted when creating a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub base_price: i64,
    #[serde(default = "default_base_quantity")]
    pub base_quantity: i64,
    #[serde(default = "default_min_quantity")]
    pub min_quantity: i64,
    #[serde(default = "default_max_quantity")]
    pub max_quantity: i64,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub category_id: Option<i64>,
    pub link_instructions: Option<String>,
}

/// Partial update, `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<i64>,
    pub base_quantity: Option<i64>,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub is_available: Option<bool>,
    pub category_id: Option<i64>,
    pub link_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentMethod {
    pub name: String,
    pub description: Option<String>,
    pub contact_user: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub instructions: Option<String>,
}

fn default_base_quantity() -> i64 {
    1000
}

fn default_min_quantity() -> i64 {
    1
}

fn default_max_quantity() -> i64 {
    1_000_000
}

fn default_true() -> bool {
    true
}
