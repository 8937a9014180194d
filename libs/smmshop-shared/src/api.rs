//! Payloads exchanged between the bot and the panel's bot API.

use crate::status::{OrderStatus, WithdrawalKind, WithdrawalStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub balance: i64,
    pub referral_balance: i64,
    pub is_admin: bool,
    pub referral_code: String,
    pub referrer_id: Option<i64>,
    pub referred_users_count: i64,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    /// Raw `/start` payload, treated as a referral code.
    pub start_payload: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserResponse {
    pub user: UserView,
    pub is_new: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub base_price: i64,
    pub base_quantity: i64,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub is_available: bool,
    pub category_id: Option<i64>,
    pub link_instructions: Option<String>,
}

/// One screen of the catalog: a category with its children and services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPage {
    pub category: CategoryView,
    pub subcategories: Vec<CategoryView>,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub telegram_id: i64,
    pub service_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub service_id: i64,
    pub service_name: String,
    pub quantity: i64,
    pub total_price: i64,
    pub balance: i64,
    pub link_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub telegram_id: i64,
    pub service_id: i64,
    pub quantity: i64,
    pub link: String,
    /// Idempotency key, a retried request with the same key debits nothing.
    pub request_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: i64,
    pub user_id: i64,
    pub service_id: i64,
    pub service_name: Option<String>,
    pub quantity: i64,
    pub link_or_id: String,
    pub total_price: i64,
    pub status: OrderStatus,
    pub provider_order_id: Option<String>,
    pub refunded_amount: i64,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
    pub order: OrderView,
    pub balance: i64,
    /// False when the request key matched an earlier order.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub telegram_id: i64,
    pub amount: i64,
    pub kind: WithdrawalKind,
    pub payment_info: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalView {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub payment_method_info: String,
    pub status: WithdrawalStatus,
    pub withdrawal_type: WithdrawalKind,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub referred_users_count: i64,
    pub referral_balance: i64,
    pub total_earned: i64,
    pub bonus_per_referral: i64,
    pub count_for_bonus: i64,
    pub referrals_to_next_bonus: i64,
    pub min_withdrawal: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub contact_user: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCheckRequest {
    pub telegram_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCheckResponse {
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCreditRequest {
    pub admin_telegram_id: i64,
    pub target_telegram_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChange {
    pub telegram_id: i64,
    pub balance: i64,
    pub referral_balance: i64,
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingValue {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebAppDataRequest {
    #[serde(rename = "initData")]
    pub init_data: String,
}

/// Everything the WebApp renders on first load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebAppData {
    pub user: UserView,
    pub orders: Vec<OrderView>,
    pub categories: Vec<CategoryView>,
    pub services: Vec<ServiceView>,
}
