use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smmshop_shared::api::WithdrawalView;
use smmshop_shared::{WithdrawalKind, WithdrawalStatus};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub payment_method_info: String,
    #[sqlx(try_from = "String")]
    pub status: WithdrawalStatus,
    #[sqlx(try_from = "String")]
    pub withdrawal_type: WithdrawalKind,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<Withdrawal> for WithdrawalView {
    fn from(w: Withdrawal) -> Self {
        WithdrawalView {
            id: w.id,
            user_id: w.user_id,
            amount: w.amount,
            payment_method_info: w.payment_method_info,
            status: w.status,
            withdrawal_type: w.withdrawal_type,
            requested_at: w.requested_at,
            processed_at: w.processed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub method: String,
    pub transaction_id: Option<String>,
    pub status: String,
    pub paid_at: DateTime<Utc>,
}
