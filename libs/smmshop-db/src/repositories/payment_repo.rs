use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::finance::Payment;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record<'e, E>(
        executor: E,
        telegram_id: i64,
        amount: i64,
        method: &str,
        transaction_id: Option<&str>,
    ) -> Result<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            "INSERT INTO payments (user_id, amount, method, transaction_id, status, paid_at)
             VALUES (?, ?, ?, ?, 'Completed', ?)
             RETURNING id",
        )
        .bind(telegram_id)
        .bind(amount)
        .bind(method)
        .bind(transaction_id)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
        .context("Failed to record payment")
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<Payment>> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list payments")
    }

    pub async fn list_for_user(&self, telegram_id: i64) -> Result<Vec<Payment>> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE user_id = ? ORDER BY id DESC")
            .bind(telegram_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list user payments")
    }
}
