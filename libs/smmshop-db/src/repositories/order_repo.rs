use anyhow::{Context, Result};
use chrono::Utc;
use smmshop_shared::OrderStatus;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::order::{Order, ShopStats};

const SELECT_ORDER: &str = "SELECT o.*, s.name AS service_name
    FROM orders o
    LEFT JOIN services s ON s.id = o.service_id";

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: i64,
    pub service_id: i64,
    pub quantity: i64,
    pub link_or_id: &'a str,
    pub total_price: i64,
    pub request_key: Option<&'a str>,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Order>> {
        sqlx::query_as::<_, Order>(&format!("{} WHERE o.id = ?", SELECT_ORDER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch order")
    }

    pub async fn get_by_request_key(&self, key: &str) -> Result<Option<Order>> {
        sqlx::query_as::<_, Order>(&format!("{} WHERE o.request_key = ?", SELECT_ORDER))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch order by request key")
    }

    pub async fn list(&self, status: Option<OrderStatus>, limit: i64, offset: i64) -> Result<Vec<Order>> {
        sqlx::query_as::<_, Order>(&format!(
            "{} WHERE (?1 IS NULL OR o.status = ?1) ORDER BY o.id DESC LIMIT ?2 OFFSET ?3",
            SELECT_ORDER
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list orders")
    }

    pub async fn list_for_user(&self, telegram_id: i64, limit: i64) -> Result<Vec<Order>> {
        sqlx::query_as::<_, Order>(&format!(
            "{} WHERE o.user_id = ? ORDER BY o.id DESC LIMIT ?",
            SELECT_ORDER
        ))
        .bind(telegram_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list user orders")
    }

    /// Pending orders not yet accepted by a provider, oldest first, starting
    /// after `after_id`. Callers page with the last id they saw.
    pub async fn list_dispatchable(&self, after_id: i64, limit: i64) -> Result<Vec<Order>> {
        sqlx::query_as::<_, Order>(&format!(
            "{} WHERE o.status = 'Pending' AND o.provider_order_id IS NULL AND o.id > ? ORDER BY o.id LIMIT ?",
            SELECT_ORDER
        ))
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list dispatchable orders")
    }

    /// Processing orders that can still be polled: both the provider and its
    /// order id are known.
    pub async fn list_processing(&self, after_id: i64, limit: i64) -> Result<Vec<Order>> {
        sqlx::query_as::<_, Order>(&format!(
            "{} WHERE o.status = 'Processing' AND o.provider_id IS NOT NULL
                 AND o.provider_order_id IS NOT NULL AND o.id > ?
             ORDER BY o.id LIMIT ?",
            SELECT_ORDER
        ))
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list processing orders")
    }

    pub async fn insert<'e, E>(executor: E, order: &NewOrder<'_>) -> Result<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_scalar(
            "INSERT INTO orders
                (user_id, service_id, quantity, link_or_id, total_price, status, request_key, ordered_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'Pending', ?, ?, ?)
             RETURNING id",
        )
        .bind(order.user_id)
        .bind(order.service_id)
        .bind(order.quantity)
        .bind(order.link_or_id)
        .bind(order.total_price)
        .bind(order.request_key)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .context("Failed to insert order")
    }

    /// Compare-and-set on the status column. `false` means the order was not
    /// in `from` any more, so somebody else already moved it. Requeueing to
    /// `Pending` forgets the provider order id.
    pub async fn transition<'e, E>(executor: E, id: i64, from: OrderStatus, to: OrderStatus) -> Result<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let res = sqlx::query(
            "UPDATE orders
             SET status = ?1, dispatch_claimed_at = NULL, updated_at = ?2,
                 provider_order_id = CASE WHEN ?1 = 'Pending' THEN NULL ELSE provider_order_id END,
                 provider_id = CASE WHEN ?1 = 'Pending' THEN NULL ELSE provider_id END,
                 dispatch_attempts = CASE WHEN ?1 = 'Pending' THEN 0 ELSE dispatch_attempts END
             WHERE id = ?3 AND status = ?4",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await
        .context("Failed to update order status")?;
        Ok(res.rows_affected() == 1)
    }

    /// Pending -> Processing once the provider accepted the order.
    pub async fn mark_processing(&self, id: i64, provider_id: i64, provider_order_id: &str) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE orders
             SET status = 'Processing', provider_id = ?, provider_order_id = ?, dispatch_claimed_at = NULL,
                 last_error = NULL, updated_at = ?
             WHERE id = ? AND status = 'Pending'",
        )
        .bind(provider_id)
        .bind(provider_order_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark order processing")?;
        Ok(res.rows_affected() == 1)
    }

    /// Records a refund, refusing anything that would exceed the order total.
    pub async fn add_refund<'e, E>(executor: E, id: i64, amount: i64) -> Result<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let res = sqlx::query(
            "UPDATE orders SET refunded_amount = refunded_amount + ?1, updated_at = ?2
             WHERE id = ?3 AND refunded_amount + ?1 <= total_price",
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await
        .context("Failed to record refund")?;
        Ok(res.rows_affected() == 1)
    }

    /// Takes the dispatch lease on a pending order. A lease older than
    /// `stale_before` (unix seconds) is considered abandoned.
    pub async fn claim_for_dispatch(&self, id: i64, now: i64, stale_before: i64) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE orders SET dispatch_claimed_at = ?
             WHERE id = ? AND status = 'Pending' AND provider_order_id IS NULL
               AND (dispatch_claimed_at IS NULL OR dispatch_claimed_at < ?)",
        )
        .bind(now)
        .bind(id)
        .bind(stale_before)
        .execute(&self.pool)
        .await
        .context("Failed to claim order")?;
        Ok(res.rows_affected() == 1)
    }

    /// Drops the lease after a failed attempt and returns the attempt count.
    pub async fn release_claim(&self, id: i64, error: &str) -> Result<i64> {
        sqlx::query_scalar(
            "UPDATE orders
             SET dispatch_claimed_at = NULL, dispatch_attempts = dispatch_attempts + 1,
                 last_error = ?, updated_at = ?
             WHERE id = ?
             RETURNING dispatch_attempts",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to release order claim")
    }

    /// Drops the lease without counting an attempt, used when no provider
    /// could be chosen for the order.
    pub async fn unclaim(&self, id: i64, note: &str) -> Result<()> {
        sqlx::query("UPDATE orders SET dispatch_claimed_at = NULL, last_error = ? WHERE id = ?")
            .bind(note)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to unclaim order")?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<ShopStats> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM services),
                (SELECT COUNT(*) FROM orders),
                (SELECT COUNT(*) FROM orders WHERE status = 'Pending'),
                (SELECT COUNT(*) FROM orders WHERE status = 'Processing'),
                (SELECT COUNT(*) FROM orders WHERE status = 'Completed'),
                (SELECT COALESCE(SUM(balance), 0) FROM users),
                (SELECT COALESCE(SUM(referral_balance), 0) FROM users),
                (SELECT COUNT(*) FROM withdrawals WHERE status = 'Pending')",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute stats")?;

        Ok(ShopStats {
            total_users: row.0,
            total_services: row.1,
            total_orders: row.2,
            total_pending_orders: row.3,
            total_processing_orders: row.4,
            total_completed_orders: row.5,
            total_balance: row.6,
            total_referral_balance: row.7,
            total_pending_withdrawals: row.8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;
    use crate::models::catalog::NewService;
    use crate::repositories::service_repo::ServiceRepository;
    use crate::repositories::user_repo::{NewUser, UserRepository};

    async fn setup() -> (SqlitePool, i64) {
        let pool = init_memory_db().await.unwrap();
        UserRepository::insert(
            &pool,
            &NewUser {
                telegram_id: 42,
                username: None,
                full_name: None,
                referral_code: "ORDR0001",
                is_admin: false,
                referrer_id: None,
            },
        )
        .await
        .unwrap();
        let svc = ServiceRepository::create(
            &pool,
            &NewService {
                name: "Views".to_string(),
                description: None,
                base_price: 100,
                base_quantity: 1000,
                min_quantity: 10,
                max_quantity: 5000,
                is_available: true,
                category_id: None,
                link_instructions: None,
            },
        )
        .await
        .unwrap();
        (pool, svc.id)
    }

    async fn place(pool: &SqlitePool, service_id: i64, key: Option<&str>) -> i64 {
        OrderRepository::insert(
            pool,
            &NewOrder {
                user_id: 42,
                service_id,
                quantity: 1000,
                link_or_id: "https://t.me/example",
                total_price: 100,
                request_key: key,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let (pool, service_id) = setup().await;
        let id = place(&pool, service_id, None).await;

        assert!(OrderRepository::transition(&pool, id, OrderStatus::Pending, OrderStatus::Canceled).await.unwrap());
        assert!(!OrderRepository::transition(&pool, id, OrderStatus::Pending, OrderStatus::Canceled).await.unwrap());

        let repo = OrderRepository::new(pool);
        let order = repo.get(id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.service_name.as_deref(), Some("Views"));
    }

    #[tokio::test]
    async fn refunds_cannot_exceed_total() {
        let (pool, service_id) = setup().await;
        let id = place(&pool, service_id, None).await;

        assert!(OrderRepository::add_refund(&pool, id, 60).await.unwrap());
        assert!(!OrderRepository::add_refund(&pool, id, 60).await.unwrap());
        assert!(OrderRepository::add_refund(&pool, id, 40).await.unwrap());

        let order = OrderRepository::new(pool).get(id).await.unwrap().unwrap();
        assert_eq!(order.refunded_amount, 100);
        assert_eq!(order.refundable(), 0);
    }

    #[tokio::test]
    async fn request_key_is_unique() {
        let (pool, service_id) = setup().await;
        place(&pool, service_id, Some("42:7")).await;
        let dup = OrderRepository::insert(
            &pool,
            &NewOrder {
                user_id: 42,
                service_id,
                quantity: 1000,
                link_or_id: "x",
                total_price: 100,
                request_key: Some("42:7"),
            },
        )
        .await
        .unwrap_err();
        assert!(crate::utils::anyhow_is_unique_violation(&dup, Some("request_key")));

        let repo = OrderRepository::new(pool);
        assert!(repo.get_by_request_key("42:7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dispatch_claim_is_exclusive_until_stale() {
        let (pool, service_id) = setup().await;
        let id = place(&pool, service_id, None).await;
        let provider = crate::repositories::provider_repo::ProviderRepository::new(pool.clone())
            .create("Main", "https://smm.example/api/v2", "key", true)
            .await
            .unwrap();
        let repo = OrderRepository::new(pool);

        assert!(repo.claim_for_dispatch(id, 1_000, 400).await.unwrap());
        assert!(!repo.claim_for_dispatch(id, 1_010, 410).await.unwrap());
        // lease from t=1000 is stale once the cutoff passes it
        assert!(repo.claim_for_dispatch(id, 2_000, 1_400).await.unwrap());

        assert_eq!(repo.release_claim(id, "timeout").await.unwrap(), 1);
        assert!(repo.mark_processing(id, provider.id, "P-99").await.unwrap());
        assert!(repo.list_dispatchable(0, 10).await.unwrap().is_empty());
        assert_eq!(repo.list_processing(0, 10).await.unwrap().len(), 1);
        assert!(repo.list_processing(id, 10).await.unwrap().is_empty());

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.total_processing_orders, 1);
    }

    #[tokio::test]
    async fn listings_page_past_the_cursor_and_skip_orphans() {
        let (pool, service_id) = setup().await;
        let first = place(&pool, service_id, None).await;
        let second = place(&pool, service_id, None).await;
        let third = place(&pool, service_id, None).await;
        let repo = OrderRepository::new(pool.clone());

        let page: Vec<i64> = repo.list_dispatchable(0, 2).await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(page, vec![first, second]);
        let page: Vec<i64> = repo.list_dispatchable(second, 2).await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(page, vec![third]);

        let providers = crate::repositories::provider_repo::ProviderRepository::new(pool.clone());
        let provider = providers.create("Gone", "https://smm.example/api/v2", "key", true).await.unwrap();
        assert!(repo.mark_processing(first, provider.id, "P-1").await.unwrap());
        assert!(repo.mark_processing(second, provider.id, "P-2").await.unwrap());
        // provider deleted: its orders lose the reference and stop being polled
        sqlx::query("UPDATE orders SET provider_id = NULL WHERE id = ?")
            .bind(first)
            .execute(&pool)
            .await
            .unwrap();

        let polled: Vec<i64> = repo.list_processing(0, 10).await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(polled, vec![second]);
    }
}
