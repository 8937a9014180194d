use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::catalog::{NewPaymentMethod, PaymentMethod};

#[derive(Debug, Clone)]
pub struct PaymentMethodRepository {
    pool: SqlitePool,
}

impl PaymentMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethod>("SELECT * FROM payment_methods ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch payment methods")
    }

    pub async fn get_available(&self) -> Result<Vec<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethod>("SELECT * FROM payment_methods WHERE is_available = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch available payment methods")
    }

    pub async fn create(&self, method: &NewPaymentMethod) -> Result<PaymentMethod> {
        sqlx::query_as::<_, PaymentMethod>(
            "INSERT INTO payment_methods (name, description, contact_user, is_available, instructions, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&method.name)
        .bind(&method.description)
        .bind(&method.contact_user)
        .bind(method.is_available)
        .bind(&method.instructions)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("Failed to create payment method")
    }

    pub async fn update(&self, id: i64, method: &NewPaymentMethod) -> Result<Option<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethod>(
            "UPDATE payment_methods
             SET name = ?, description = ?, contact_user = ?, is_available = ?, instructions = ?
             WHERE id = ?
             RETURNING *",
        )
        .bind(&method.name)
        .bind(&method.description)
        .bind(&method.contact_user)
        .bind(method.is_available)
        .bind(&method.instructions)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update payment method")
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM payment_methods WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete payment method")?;
        Ok(res.rows_affected() > 0)
    }
}
