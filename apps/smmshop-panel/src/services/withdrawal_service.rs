use smmshop_db::models::finance::Withdrawal;
use smmshop_db::repositories::user_repo::UserRepository;
use smmshop_db::repositories::withdrawal_repo::WithdrawalRepository;
use smmshop_shared::money::format_cents;
use smmshop_shared::{WithdrawalKind, WithdrawalStatus};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::services::notification_service::NotificationService;
use crate::settings::{self, SettingsService};
use crate::utils::clean_text;

const PAYMENT_INFO_MAX: usize = 256;

#[derive(Clone)]
pub struct WithdrawalService {
    pool: SqlitePool,
    withdrawal_repo: WithdrawalRepository,
    user_repo: UserRepository,
    settings: Arc<SettingsService>,
    notifications: NotificationService,
}

impl WithdrawalService {
    pub fn new(pool: SqlitePool, settings: Arc<SettingsService>, notifications: NotificationService) -> Self {
        Self {
            withdrawal_repo: WithdrawalRepository::new(pool.clone()),
            user_repo: UserRepository::new(pool.clone()),
            pool,
            settings,
            notifications,
        }
    }

    /// Takes `amount` off the chosen balance and files a pending request.
    pub async fn request(
        &self,
        telegram_id: i64,
        amount: i64,
        kind: WithdrawalKind,
        payment_info: &str,
    ) -> StoreResult<Withdrawal> {
        if amount <= 0 {
            return Err(StoreError::validation("Amount must be positive"));
        }
        let payment_info = clean_text(payment_info, PAYMENT_INFO_MAX).ok_or_else(|| {
            StoreError::validation(format!("Payment details must be 1-{} characters", PAYMENT_INFO_MAX))
        })?;

        if kind == WithdrawalKind::Referral {
            let minimum = self.settings.get_i64(settings::MIN_REFERRAL_WITHDRAWAL, 0).await;
            if amount < minimum {
                return Err(StoreError::validation(format!(
                    "Minimum referral withdrawal is {}",
                    format_cents(minimum)
                )));
            }
        }

        let mut tx = self.pool.begin().await?;
        if UserRepository::debit(&mut *tx, telegram_id, kind, amount).await?.is_none() {
            drop(tx);
            let user = self
                .user_repo
                .get_by_tg_id(telegram_id)
                .await?
                .ok_or_else(|| StoreError::not_found(format!("User {}", telegram_id)))?;
            let available = match kind {
                WithdrawalKind::Referral => user.referral_balance,
                WithdrawalKind::Main => user.balance,
            };
            return Err(StoreError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        let withdrawal = WithdrawalRepository::insert(&mut *tx, telegram_id, amount, kind, &payment_info).await?;
        tx.commit().await?;

        info!(
            "Withdrawal {} requested by {}: {} cents from {} balance",
            withdrawal.id, telegram_id, amount, kind
        );
        let user = self.user_repo.get_by_tg_id(telegram_id).await.ok().flatten();
        self.notifications.withdrawal_requested(&withdrawal, user.as_ref()).await;
        Ok(withdrawal)
    }

    /// Approves or rejects a pending request. A rejected request gives the
    /// money back to the balance it came from.
    pub async fn update_status(&self, id: i64, to: WithdrawalStatus) -> StoreResult<Withdrawal> {
        if to == WithdrawalStatus::Pending {
            return Err(StoreError::validation("Withdrawals cannot be moved back to Pending"));
        }
        let current = self
            .withdrawal_repo
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Withdrawal {}", id)))?;
        if current.status == to {
            return Ok(current);
        }
        if !current.status.can_transition_to(to) {
            return Err(StoreError::conflict(format!(
                "Withdrawal {} is already {}",
                id, current.status
            )));
        }

        let mut tx = self.pool.begin().await?;
        let Some(resolved) = WithdrawalRepository::resolve(&mut *tx, id, to).await? else {
            return Err(StoreError::conflict(format!("Withdrawal {} was processed concurrently", id)));
        };
        if to == WithdrawalStatus::Rejected {
            UserRepository::credit(&mut *tx, resolved.user_id, resolved.withdrawal_type, resolved.amount)
                .await?
                .ok_or_else(|| StoreError::not_found(format!("User {}", resolved.user_id)))?;
        }
        tx.commit().await?;

        info!("Withdrawal {} -> {}", id, to);
        self.notifications.withdrawal_status(&resolved).await;
        Ok(resolved)
    }

    pub async fn list(&self, status: Option<WithdrawalStatus>) -> StoreResult<Vec<Withdrawal>> {
        Ok(self.withdrawal_repo.list(status).await?)
    }

    pub async fn list_for_user(&self, telegram_id: i64) -> StoreResult<Vec<Withdrawal>> {
        Ok(self.withdrawal_repo.list_for_user(telegram_id).await?)
    }
}
