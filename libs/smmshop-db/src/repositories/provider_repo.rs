use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::provider::ServiceProvider;

#[derive(Debug, Clone)]
pub struct ProviderRepository {
    pool: SqlitePool,
}

impl ProviderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<ServiceProvider>> {
        sqlx::query_as::<_, ServiceProvider>("SELECT * FROM service_providers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch provider")
    }

    pub async fn get_all(&self) -> Result<Vec<ServiceProvider>> {
        sqlx::query_as::<_, ServiceProvider>("SELECT * FROM service_providers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch providers")
    }

    pub async fn create(&self, name: &str, api_url: &str, api_key: &str, is_active: bool) -> Result<ServiceProvider> {
        sqlx::query_as::<_, ServiceProvider>(
            "INSERT INTO service_providers (name, api_url, api_key, is_active, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(name)
        .bind(api_url)
        .bind(api_key)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("Failed to create provider")
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let res = sqlx::query("UPDATE service_providers SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to toggle provider")?;
        Ok(res.rows_affected() > 0)
    }

    /// Deletes the provider, its mappings go with it.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM service_providers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete provider")?;
        Ok(res.rows_affected() > 0)
    }
}
