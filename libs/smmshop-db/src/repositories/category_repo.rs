use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::models::catalog::Category;

/// Recursive CTE yielding the id of category `?1` and all of its descendants.
const SUBTREE: &str = "WITH RECURSIVE tree(id) AS (
        SELECT id FROM categories WHERE id = ?1
        UNION ALL
        SELECT c.id FROM categories c JOIN tree t ON c.parent_id = t.id
    )";

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

/// Effect of deleting a category subtree on the services inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SubtreeRemoval {
    pub categories: u64,
    pub services_deleted: u64,
    pub services_retired: u64,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch category")
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch category by name")
    }

    pub async fn get_all(&self) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY parent_id IS NOT NULL, parent_id, id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch categories")
    }

    pub async fn get_roots(&self) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE parent_id IS NULL ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch root categories")
    }

    pub async fn get_children(&self, parent_id: i64) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE parent_id = ? ORDER BY id")
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch subcategories")
    }

    pub async fn create(&self, name: &str, parent_id: Option<i64>) -> Result<Category> {
        sqlx::query_as::<_, Category>("INSERT INTO categories (name, parent_id) VALUES (?, ?) RETURNING *")
            .bind(name)
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create category")
    }

    pub async fn update(&self, id: i64, name: &str, parent_id: Option<i64>) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("UPDATE categories SET name = ?, parent_id = ? WHERE id = ? RETURNING *")
            .bind(name)
            .bind(parent_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update category")
    }

    /// Ids of `id` and everything below it.
    pub async fn subtree_ids(&self, id: i64) -> Result<Vec<i64>> {
        let sql = format!("{} SELECT id FROM tree", SUBTREE);
        sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to walk category tree")
    }

    /// Deletes a category with all subcategories. Services without orders
    /// are deleted, services with order history are detached and disabled.
    pub async fn delete_subtree(&self, id: i64) -> Result<Option<SubtreeRemoval>> {
        let mut tx = self.pool.begin().await?;

        let categories: i64 = sqlx::query_scalar(&format!("{} SELECT COUNT(*) FROM tree", SUBTREE))
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count category subtree")?;
        if categories == 0 {
            return Ok(None);
        }

        let deleted = sqlx::query(&format!(
            "{} DELETE FROM services
             WHERE category_id IN (SELECT id FROM tree)
               AND NOT EXISTS (SELECT 1 FROM orders o WHERE o.service_id = services.id)",
            SUBTREE
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete category services")?
        .rows_affected();

        let retired = sqlx::query(&format!(
            "{} UPDATE services SET is_available = 0, category_id = NULL
             WHERE category_id IN (SELECT id FROM tree)",
            SUBTREE
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to retire category services")?
        .rows_affected();

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete category")?;

        tx.commit().await?;

        Ok(Some(SubtreeRemoval {
            categories: categories as u64,
            services_deleted: deleted,
            services_retired: retired,
        }))
    }
}
