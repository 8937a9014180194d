use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smmshop_shared::api::UserView;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
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

impl User {
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.username.as_ref().map(|u| format!("@{}", u)))
            .unwrap_or_else(|| self.telegram_id.to_string())
    }
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        UserView {
            id: u.id,
            telegram_id: u.telegram_id,
            username: u.username,
            full_name: u.full_name,
            balance: u.balance,
            referral_balance: u.referral_balance,
            is_admin: u.is_admin,
            referral_code: u.referral_code,
            referrer_id: u.referrer_id,
            referred_users_count: u.referred_users_count,
            registered_at: u.registered_at,
        }
    }
}
