use anyhow::{Context, Result};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::provider::{MappingDetails, ServiceMapping};

#[derive(Debug, Clone)]
pub struct MappingRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct NewMapping<'a> {
    pub service_id: i64,
    pub provider_id: i64,
    pub provider_service_id: &'a str,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub price_multiplier: f64,
}

impl MappingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<ServiceMapping>> {
        sqlx::query_as::<_, ServiceMapping>("SELECT * FROM service_mappings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch mapping")
    }

    pub async fn list_details(&self) -> Result<Vec<MappingDetails>> {
        sqlx::query_as::<_, MappingDetails>(
            "SELECT m.id, m.service_id, s.name AS service_name, m.provider_id,
                    p.name AS provider_name, p.is_active AS provider_active,
                    m.provider_service_id, m.min_quantity, m.max_quantity, m.price_multiplier
             FROM service_mappings m
             JOIN services s ON s.id = m.service_id
             JOIN service_providers p ON p.id = m.provider_id
             ORDER BY m.id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list mappings")
    }

    pub async fn list_for_service(&self, service_id: i64) -> Result<Vec<ServiceMapping>> {
        sqlx::query_as::<_, ServiceMapping>("SELECT * FROM service_mappings WHERE service_id = ? ORDER BY id")
            .bind(service_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list service mappings")
    }

    /// First mapping of the service, by id, whose provider is active and whose
    /// bounds accept `quantity`.
    pub async fn find_for_order(&self, service_id: i64, quantity: i64) -> Result<Option<ServiceMapping>> {
        sqlx::query_as::<_, ServiceMapping>(
            "SELECT m.* FROM service_mappings m
             JOIN service_providers p ON p.id = m.provider_id
             WHERE m.service_id = ?1 AND p.is_active = 1
               AND m.min_quantity <= ?2 AND m.max_quantity >= ?2
             ORDER BY m.id
             LIMIT 1",
        )
        .bind(service_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to select mapping for order")
    }

    pub async fn create<'e, E>(executor: E, mapping: &NewMapping<'_>) -> Result<ServiceMapping>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ServiceMapping>(
            "INSERT INTO service_mappings
                (service_id, provider_id, provider_service_id, min_quantity, max_quantity, price_multiplier)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(mapping.service_id)
        .bind(mapping.provider_id)
        .bind(mapping.provider_service_id)
        .bind(mapping.min_quantity)
        .bind(mapping.max_quantity)
        .bind(mapping.price_multiplier)
        .fetch_one(executor)
        .await
        .context("Failed to create mapping")
    }

    pub async fn update(
        &self,
        id: i64,
        min_quantity: i64,
        max_quantity: i64,
        price_multiplier: Option<f64>,
    ) -> Result<Option<ServiceMapping>> {
        sqlx::query_as::<_, ServiceMapping>(
            "UPDATE service_mappings
             SET min_quantity = ?, max_quantity = ?, price_multiplier = COALESCE(?, price_multiplier)
             WHERE id = ?
             RETURNING *",
        )
        .bind(min_quantity)
        .bind(max_quantity)
        .bind(price_multiplier)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update mapping")
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM service_mappings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete mapping")?;
        Ok(res.rows_affected() > 0)
    }
}
