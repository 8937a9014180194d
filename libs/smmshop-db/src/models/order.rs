use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smmshop_shared::OrderStatus;
use smmshop_shared::api::OrderView;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    /// Telegram id of the buyer.
    pub user_id: i64,
    pub service_id: i64,
    #[sqlx(default)]
    pub service_name: Option<String>,
    pub quantity: i64,
    pub link_or_id: String,
    pub total_price: i64,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    /// Provider that accepted the order, set together with `provider_order_id`.
    pub provider_id: Option<i64>,
    pub provider_order_id: Option<String>,
    pub params: Option<String>,
    pub request_key: Option<String>,
    pub refunded_amount: i64,
    pub dispatch_attempts: i64,
    pub last_error: Option<String>,
    pub ordered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Amount still held by the shop for this order.
    pub fn refundable(&self) -> i64 {
        (self.total_price - self.refunded_amount).max(0)
    }
}

impl From<Order> for OrderView {
    fn from(o: Order) -> Self {
        OrderView {
            id: o.id,
            user_id: o.user_id,
            service_id: o.service_id,
            service_name: o.service_name,
            quantity: o.quantity,
            link_or_id: o.link_or_id,
            total_price: o.total_price,
            status: o.status,
            provider_order_id: o.provider_order_id,
            refunded_amount: o.refunded_amount,
            ordered_at: o.ordered_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopStats {
    pub total_users: i64,
    pub total_services: i64,
    pub total_orders: i64,
    pub total_pending_orders: i64,
    pub total_processing_orders: i64,
    pub total_completed_orders: i64,
    pub total_balance: i64,
    pub total_referral_balance: i64,
    pub total_pending_withdrawals: i64,
}
