use anyhow::{Context, Result};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::catalog::{NewService, Service, ServiceUpdate};

#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRemoval {
    Deleted,
    /// Kept because orders reference it, now unavailable.
    Retired,
}

impl ServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Service>> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch service")
    }

    pub async fn get_all(&self) -> Result<Vec<Service>> {
        sqlx::query_as::<_, Service>("SELECT * FROM services ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch services")
    }

    pub async fn get_available(&self) -> Result<Vec<Service>> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE is_available = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch available services")
    }

    pub async fn get_by_category(&self, category_id: i64, only_available: bool) -> Result<Vec<Service>> {
        sqlx::query_as::<_, Service>(
            "SELECT * FROM services WHERE category_id = ? AND (is_available = 1 OR ? = 0) ORDER BY id",
        )
        .bind(category_id)
        .bind(only_available)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch services by category")
    }

    pub async fn create<'e, E>(executor: E, service: &NewService) -> Result<Service>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Service>(
            "INSERT INTO services
                (name, description, base_price, base_quantity, min_quantity, max_quantity,
                 is_available, category_id, link_instructions)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.base_price)
        .bind(service.base_quantity)
        .bind(service.min_quantity)
        .bind(service.max_quantity)
        .bind(service.is_available)
        .bind(service.category_id)
        .bind(&service.link_instructions)
        .fetch_one(executor)
        .await
        .context("Failed to create service")
    }

    pub async fn update(&self, id: i64, update: &ServiceUpdate) -> Result<Option<Service>> {
        sqlx::query_as::<_, Service>(
            "UPDATE services SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                base_price = COALESCE(?, base_price),
                base_quantity = COALESCE(?, base_quantity),
                min_quantity = COALESCE(?, min_quantity),
                max_quantity = COALESCE(?, max_quantity),
                is_available = COALESCE(?, is_available),
                category_id = COALESCE(?, category_id),
                link_instructions = COALESCE(?, link_instructions)
             WHERE id = ?
             RETURNING *",
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.base_price)
        .bind(update.base_quantity)
        .bind(update.min_quantity)
        .bind(update.max_quantity)
        .bind(update.is_available)
        .bind(update.category_id)
        .bind(&update.link_instructions)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update service")
    }

    pub async fn delete(&self, id: i64) -> Result<Option<ServiceRemoval>> {
        let mut tx = self.pool.begin().await?;

        let has_orders: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE service_id = ?)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to check service orders")?;

        let (affected, outcome) = if has_orders {
            let res = sqlx::query("UPDATE services SET is_available = 0 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to retire service")?;
            (res.rows_affected(), ServiceRemoval::Retired)
        } else {
            let res = sqlx::query("DELETE FROM services WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete service")?;
            (res.rows_affected(), ServiceRemoval::Deleted)
        };

        tx.commit().await?;
        Ok((affected > 0).then_some(outcome))
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM services")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count services")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;
    use crate::repositories::category_repo::CategoryRepository;

    fn sample(name: &str, category_id: Option<i64>) -> NewService {
        NewService {
            name: name.to_string(),
            description: None,
            base_price: 250,
            base_quantity: 1000,
            min_quantity: 100,
            max_quantity: 10_000,
            is_available: true,
            category_id,
            link_instructions: None,
        }
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let pool = init_memory_db().await.unwrap();
        let repo = ServiceRepository::new(pool.clone());
        let svc = ServiceRepository::create(&pool, &sample("Followers", None)).await.unwrap();

        let updated = repo
            .update(
                svc.id,
                &ServiceUpdate {
                    base_price: Some(400),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.base_price, 400);
        assert_eq!(updated.name, "Followers");
        assert_eq!(updated.min_quantity, 100);
    }

    #[tokio::test]
    async fn category_delete_removes_subtree_services() {
        let pool = init_memory_db().await.unwrap();
        let cats = CategoryRepository::new(pool.clone());
        let services = ServiceRepository::new(pool.clone());

        let root = cats.create("Instagram", None).await.unwrap();
        let child = cats.create("Instagram Likes", Some(root.id)).await.unwrap();
        ServiceRepository::create(&pool, &sample("Likes", Some(child.id))).await.unwrap();
        ServiceRepository::create(&pool, &sample("Followers", Some(root.id))).await.unwrap();

        let removal = cats.delete_subtree(root.id).await.unwrap().unwrap();
        assert_eq!(removal.categories, 2);
        assert_eq!(removal.services_deleted, 2);
        assert_eq!(removal.services_retired, 0);
        assert!(cats.get(child.id).await.unwrap().is_none());
        assert!(services.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filters_unavailable_by_category() {
        let pool = init_memory_db().await.unwrap();
        let cats = CategoryRepository::new(pool.clone());
        let repo = ServiceRepository::new(pool.clone());
        let cat = cats.create("TikTok", None).await.unwrap();
        let mut hidden = sample("Hidden", Some(cat.id));
        hidden.is_available = false;
        ServiceRepository::create(&pool, &hidden).await.unwrap();
        ServiceRepository::create(&pool, &sample("Views", Some(cat.id))).await.unwrap();

        assert_eq!(repo.get_by_category(cat.id, true).await.unwrap().len(), 1);
        assert_eq!(repo.get_by_category(cat.id, false).await.unwrap().len(), 2);
    }
}
