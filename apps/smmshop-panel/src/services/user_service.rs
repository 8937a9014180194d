use serde::Deserialize;
use smmshop_db::models::user::User;
use smmshop_db::repositories::payment_repo::PaymentRepository;
use smmshop_db::repositories::user_repo::{NewUser, UserRepository};
use smmshop_db::utils::{anyhow_is_unique_violation, generate_referral_code, is_referral_code};
use smmshop_shared::WithdrawalKind;
use smmshop_shared::api::{BalanceChange, ReferralSummary};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::services::notification_service::NotificationService;
use crate::settings::{self, SettingsService};

const REFERRAL_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceOp {
    Add,
    Subtract,
}

#[derive(Clone)]
pub struct UserService {
    pool: SqlitePool,
    user_repo: UserRepository,
    settings: Arc<SettingsService>,
    notifications: NotificationService,
    admin_ids: Vec<i64>,
}

impl UserService {
    pub fn new(
        pool: SqlitePool,
        settings: Arc<SettingsService>,
        notifications: NotificationService,
        admin_ids: Vec<i64>,
    ) -> Self {
        let user_repo = UserRepository::new(pool.clone());
        Self {
            pool,
            user_repo,
            settings,
            notifications,
            admin_ids,
        }
    }

    /// Registers a first-time user or refreshes the profile of a known one.
    /// Returns the user and whether it was created by this call.
    pub async fn register(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
        start_payload: Option<&str>,
    ) -> StoreResult<(User, bool)> {
        if let Some(existing) = self.user_repo.get_by_tg_id(telegram_id).await? {
            if existing.username.as_deref() == username && existing.full_name.as_deref() == full_name {
                return Ok((existing, false));
            }
            let user = self
                .user_repo
                .update_profile(telegram_id, username, full_name)
                .await?
                .unwrap_or(existing);
            return Ok((user, false));
        }

        let referrer = self.resolve_referrer(telegram_id, start_payload).await?;
        let bonus = self.settings.get_i64(settings::REFERRAL_BONUS, 0).await.max(0);
        let is_admin = self.admin_ids.contains(&telegram_id);

        for attempt in 1..=REFERRAL_CODE_ATTEMPTS {
            let code = generate_referral_code();
            let mut tx = self.pool.begin().await?;

            let inserted = UserRepository::insert(
                &mut *tx,
                &NewUser {
                    telegram_id,
                    username,
                    full_name,
                    referral_code: &code,
                    is_admin,
                    referrer_id: referrer.as_ref().map(|r| r.telegram_id),
                },
            )
            .await;

            let user = match inserted {
                Ok(Some(user)) => user,
                Ok(None) => {
                    // Lost a registration race for the same telegram id.
                    drop(tx);
                    let user = self
                        .user_repo
                        .get_by_tg_id(telegram_id)
                        .await?
                        .ok_or_else(|| StoreError::not_found(format!("User {}", telegram_id)))?;
                    return Ok((user, false));
                }
                Err(e) if anyhow_is_unique_violation(&e, Some("referral_code")) => {
                    warn!("Referral code collision on attempt {}, retrying", attempt);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let reward = match &referrer {
                Some(r) => UserRepository::reward_referrer(&mut *tx, r.telegram_id, bonus)
                    .await?
                    .map(|balance| (r.telegram_id, balance)),
                None => None,
            };

            tx.commit().await?;
            info!("Registered user {} (referrer: {:?})", telegram_id, user.referrer_id);

            if let Some((referrer_id, balance)) = reward {
                self.notifications.referral_bonus(referrer_id, bonus, balance).await;
            }
            return Ok((user, true));
        }

        Err(StoreError::Internal(anyhow::anyhow!(
            "Could not allocate a unique referral code after {} attempts",
            REFERRAL_CODE_ATTEMPTS
        )))
    }

    async fn resolve_referrer(&self, telegram_id: i64, payload: Option<&str>) -> StoreResult<Option<User>> {
        let Some(code) = payload.map(str::trim).filter(|c| is_referral_code(c)) else {
            return Ok(None);
        };
        Ok(self
            .user_repo
            .get_by_referral_code(code)
            .await?
            .filter(|r| r.telegram_id != telegram_id))
    }

    pub async fn get(&self, telegram_id: i64) -> StoreResult<User> {
        self.user_repo
            .get_by_tg_id(telegram_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("User {}", telegram_id)))
    }

    pub async fn list(&self, query: Option<&str>) -> StoreResult<Vec<User>> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => Ok(self.user_repo.search(q).await?),
            None => Ok(self.user_repo.get_all().await?),
        }
    }

    pub async fn is_admin(&self, telegram_id: i64) -> StoreResult<bool> {
        if self.admin_ids.contains(&telegram_id) {
            return Ok(true);
        }
        Ok(self
            .user_repo
            .get_by_tg_id(telegram_id)
            .await?
            .map(|u| u.is_admin)
            .unwrap_or(false))
    }

    pub async fn referral_summary(&self, telegram_id: i64) -> StoreResult<ReferralSummary> {
        let user = self.get(telegram_id).await?;
        let bonus = self.settings.get_i64(settings::REFERRAL_BONUS, 0).await;
        let count_for_bonus = self.settings.get_i64(settings::REFERRAL_COUNT_FOR_BONUS, 0).await;
        let min_withdrawal = self.settings.get_i64(settings::MIN_REFERRAL_WITHDRAWAL, 0).await;

        Ok(ReferralSummary {
            referral_code: user.referral_code,
            referred_users_count: user.referred_users_count,
            referral_balance: user.referral_balance,
            total_earned: user.referred_users_count * bonus,
            bonus_per_referral: bonus,
            count_for_bonus,
            referrals_to_next_bonus: referrals_to_next_bonus(user.referred_users_count, count_for_bonus),
            min_withdrawal,
        })
    }

    /// Overwrites one of the balances. Negative amounts are refused.
    pub async fn set_balance(&self, telegram_id: i64, kind: WithdrawalKind, cents: i64) -> StoreResult<User> {
        if cents < 0 {
            return Err(StoreError::validation("Balance cannot be negative"));
        }
        let user = self
            .user_repo
            .set_balance(telegram_id, kind, cents)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("User {}", telegram_id)))?;

        info!("Set {} of {} to {}", kind.balance_column(), telegram_id, cents);
        self.notifications.balance_changed(&user).await;
        Ok(user)
    }

    /// Adds to or subtracts from the main balance. Subtraction never takes
    /// the balance below zero.
    pub async fn adjust_balance(&self, telegram_id: i64, amount: i64, op: BalanceOp) -> StoreResult<User> {
        if amount <= 0 {
            return Err(StoreError::validation("Amount must be positive"));
        }

        let changed = match op {
            BalanceOp::Add => UserRepository::credit(&self.pool, telegram_id, WithdrawalKind::Main, amount).await?,
            BalanceOp::Subtract => UserRepository::debit(&self.pool, telegram_id, WithdrawalKind::Main, amount).await?,
        };

        if changed.is_none() {
            let user = self.get(telegram_id).await?;
            return Err(StoreError::InsufficientFunds {
                needed: amount,
                available: user.balance,
            });
        }

        let user = self.get(telegram_id).await?;
        info!("Adjusted balance of {} ({:?} {})", telegram_id, op, amount);
        self.notifications.balance_changed(&user).await;
        Ok(user)
    }

    /// Manual top-up issued by an admin from the bot. Recorded as a payment.
    pub async fn credit_by_admin(
        &self,
        admin_telegram_id: i64,
        target_telegram_id: i64,
        amount: i64,
    ) -> StoreResult<BalanceChange> {
        if !self.is_admin(admin_telegram_id).await? {
            return Err(StoreError::Forbidden("Only admins can add balance".to_string()));
        }
        if amount <= 0 {
            return Err(StoreError::validation("Amount must be positive"));
        }

        let mut tx = self.pool.begin().await?;
        let credited = UserRepository::credit(&mut *tx, target_telegram_id, WithdrawalKind::Main, amount).await?;
        if credited.is_none() {
            return Err(StoreError::not_found(format!("User {}", target_telegram_id)));
        }
        let reference = format!("admin:{}", admin_telegram_id);
        PaymentRepository::record(&mut *tx, target_telegram_id, amount, "admin", Some(&reference)).await?;
        tx.commit().await?;

        let user = self.get(target_telegram_id).await?;
        info!(
            "Admin {} credited {} cents to {}",
            admin_telegram_id, amount, target_telegram_id
        );
        self.notifications.balance_changed(&user).await;

        Ok(BalanceChange {
            telegram_id: user.telegram_id,
            balance: user.balance,
            referral_balance: user.referral_balance,
        })
    }

    /// Grants the admin flag to every configured admin that already exists.
    pub async fn seed_admins(&self) -> StoreResult<usize> {
        let mut granted = 0;
        for id in &self.admin_ids {
            if self.user_repo.set_admin(*id, true).await? {
                granted += 1;
            }
        }
        Ok(granted)
    }

    pub async fn grant_admin(&self, telegram_id: i64, is_admin: bool) -> StoreResult<()> {
        if !self.user_repo.set_admin(telegram_id, is_admin).await? {
            return Err(StoreError::not_found(format!("User {}", telegram_id)));
        }
        Ok(())
    }

    pub async fn message_user(&self, telegram_id: i64, text: &str) -> StoreResult<()> {
        self.get(telegram_id).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::validation("Message is empty"));
        }
        self.notifications
            .direct_message(telegram_id, text)
            .await
            .map_err(|e| StoreError::conflict(format!("Message not delivered: {}", e)))
    }
}

/// Referrals still needed to reach the next multiple of `every`.
pub fn referrals_to_next_bonus(count: i64, every: i64) -> i64 {
    if every <= 0 || count % every == 0 {
        0
    } else {
        every - count % every
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notification_service::NoopNotifier;
    use smmshop_db::init_memory_db;

    async fn service(admin_ids: Vec<i64>) -> UserService {
        let pool = init_memory_db().await.unwrap();
        let settings = Arc::new(SettingsService::new(pool.clone()).await.unwrap());
        let notifications =
            NotificationService::new(Arc::new(NoopNotifier), UserRepository::new(pool.clone()), admin_ids.clone());
        UserService::new(pool, settings, notifications, admin_ids)
    }

    #[tokio::test]
    async fn referral_registration_rewards_once() {
        let svc = service(vec![]).await;
        let (referrer, created) = svc.register(1, Some("ref"), None, None).await.unwrap();
        assert!(created);

        let (invited, created) = svc
            .register(2, Some("new"), None, Some(&referrer.referral_code))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(invited.referrer_id, Some(1));

        // a second /start with the same code is a no-op
        let (_, created) = svc.register(2, Some("new"), None, Some(&referrer.referral_code)).await.unwrap();
        assert!(!created);

        let referrer = svc.get(1).await.unwrap();
        assert_eq!(referrer.referred_users_count, 1);
        assert_eq!(referrer.referral_balance, 10);
    }

    #[tokio::test]
    async fn self_and_unknown_referrals_are_ignored() {
        let svc = service(vec![]).await;
        let (user, _) = svc.register(5, None, None, Some("ZZZZ9999")).await.unwrap();
        assert_eq!(user.referrer_id, None);

        let (other, _) = svc.register(6, None, None, Some("service_3")).await.unwrap();
        assert_eq!(other.referrer_id, None);
    }

    #[tokio::test]
    async fn subtract_refuses_to_overdraw() {
        let svc = service(vec![]).await;
        svc.register(9, None, None, None).await.unwrap();
        svc.adjust_balance(9, 300, BalanceOp::Add).await.unwrap();

        let err = svc.adjust_balance(9, 500, BalanceOp::Subtract).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { needed: 500, available: 300 }));

        let user = svc.adjust_balance(9, 100, BalanceOp::Subtract).await.unwrap();
        assert_eq!(user.balance, 200);
        assert!(svc.set_balance(9, WithdrawalKind::Main, -1).await.is_err());
    }

    #[tokio::test]
    async fn admin_credit_requires_admin_and_records_payment() {
        let svc = service(vec![100]).await;
        let (admin, _) = svc.register(100, Some("boss"), None, None).await.unwrap();
        assert!(admin.is_admin);
        svc.register(200, None, None, None).await.unwrap();

        let err = svc.credit_by_admin(200, 100, 50).await.unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let change = svc.credit_by_admin(100, 200, 1500).await.unwrap();
        assert_eq!(change.balance, 1500);

        let payments = PaymentRepository::new(svc.pool.clone()).list_for_user(200).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].method, "admin");
    }

    #[test]
    fn next_bonus_countdown() {
        assert_eq!(referrals_to_next_bonus(0, 10), 0);
        assert_eq!(referrals_to_next_bonus(3, 10), 7);
        assert_eq!(referrals_to_next_bonus(10, 10), 0);
        assert_eq!(referrals_to_next_bonus(4, 0), 0);
    }
}
