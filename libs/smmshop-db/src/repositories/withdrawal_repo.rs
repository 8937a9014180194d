use anyhow::{Context, Result};
use chrono::Utc;
use smmshop_shared::{WithdrawalKind, WithdrawalStatus};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::finance::Withdrawal;

#[derive(Debug, Clone)]
pub struct WithdrawalRepository {
    pool: SqlitePool,
}

impl WithdrawalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Withdrawal>> {
        sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch withdrawal")
    }

    pub async fn list(&self, status: Option<WithdrawalStatus>) -> Result<Vec<Withdrawal>> {
        sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawals WHERE (?1 IS NULL OR status = ?1) ORDER BY id DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list withdrawals")
    }

    pub async fn list_for_user(&self, telegram_id: i64) -> Result<Vec<Withdrawal>> {
        sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE user_id = ? ORDER BY id DESC")
            .bind(telegram_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list user withdrawals")
    }

    pub async fn insert<'e, E>(
        executor: E,
        telegram_id: i64,
        amount: i64,
        kind: WithdrawalKind,
        payment_info: &str,
    ) -> Result<Withdrawal>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Withdrawal>(
            "INSERT INTO withdrawals (user_id, amount, payment_method_info, status, withdrawal_type, requested_at)
             VALUES (?, ?, ?, 'Pending', ?, ?)
             RETURNING *",
        )
        .bind(telegram_id)
        .bind(amount)
        .bind(payment_info)
        .bind(kind.as_str())
        .bind(Utc::now())
        .fetch_one(executor)
        .await
        .context("Failed to insert withdrawal")
    }

    /// Moves a pending withdrawal to `to`. Returns the updated row, or `None`
    /// when it was already processed.
    pub async fn resolve<'e, E>(executor: E, id: i64, to: WithdrawalStatus) -> Result<Option<Withdrawal>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Withdrawal>(
            "UPDATE withdrawals SET status = ?, processed_at = ?
             WHERE id = ? AND status = 'Pending'
             RETURNING *",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to resolve withdrawal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;
    use crate::repositories::user_repo::{NewUser, UserRepository};

    #[tokio::test]
    async fn resolves_only_once() {
        let pool = init_memory_db().await.unwrap();
        UserRepository::insert(
            &pool,
            &NewUser {
                telegram_id: 9,
                username: None,
                full_name: None,
                referral_code: "WDRL0001",
                is_admin: false,
                referrer_id: None,
            },
        )
        .await
        .unwrap();

        let w = WithdrawalRepository::insert(&pool, 9, 700, WithdrawalKind::Referral, "card 1234")
            .await
            .unwrap();
        assert_eq!(w.status, WithdrawalStatus::Pending);

        let done = WithdrawalRepository::resolve(&pool, w.id, WithdrawalStatus::Approved)
            .await
            .unwrap()
            .unwrap();
        assert!(done.processed_at.is_some());
        assert!(WithdrawalRepository::resolve(&pool, w.id, WithdrawalStatus::Rejected)
            .await
            .unwrap()
            .is_none());

        let repo = WithdrawalRepository::new(pool);
        assert_eq!(repo.list(Some(WithdrawalStatus::Pending)).await.unwrap().len(), 0);
        assert_eq!(repo.list(None).await.unwrap().len(), 1);
    }
}
