use smmshop_db::models::catalog::Service;
use smmshop_db::models::order::{Order, ShopStats};
use smmshop_db::repositories::order_repo::{NewOrder, OrderRepository};
use smmshop_db::repositories::service_repo::ServiceRepository;
use smmshop_db::repositories::user_repo::UserRepository;
use smmshop_db::utils::anyhow_is_unique_violation;
use smmshop_shared::api::{PlaceOrderRequest, PlaceOrderResponse, Quote};
use smmshop_shared::{OrderStatus, WithdrawalKind};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::services::notification_service::NotificationService;
use crate::utils::clean_text;

const LINK_MAX: usize = 512;
const REQUEST_KEY_MAX: usize = 128;

/// Result of a status change that actually happened.
#[derive(Debug, Clone)]
pub struct Transition {
    pub order: Order,
    pub refunded: i64,
}

#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
    order_repo: OrderRepository,
    service_repo: ServiceRepository,
    user_repo: UserRepository,
    notifications: NotificationService,
}

impl OrderService {
    pub fn new(pool: SqlitePool, notifications: NotificationService) -> Self {
        Self {
            order_repo: OrderRepository::new(pool.clone()),
            service_repo: ServiceRepository::new(pool.clone()),
            user_repo: UserRepository::new(pool.clone()),
            pool,
            notifications,
        }
    }

    async fn orderable_service(&self, service_id: i64, quantity: i64) -> StoreResult<(Service, i64)> {
        let service = self
            .service_repo
            .get(service_id)
            .await?
            .filter(|s| s.is_available)
            .ok_or_else(|| StoreError::not_found(format!("Service {}", service_id)))?;

        if !service.accepts_quantity(quantity) {
            return Err(StoreError::validation(format!(
                "Quantity must be between {} and {}",
                service.min_quantity, service.max_quantity
            )));
        }

        let total = service
            .total_for(quantity)
            .ok_or_else(|| StoreError::validation("Quantity is too large"))?;
        Ok((service, total))
    }

    /// Prices an order without touching any balance.
    pub async fn quote(&self, telegram_id: i64, service_id: i64, quantity: i64) -> StoreResult<Quote> {
        let user = self
            .user_repo
            .get_by_tg_id(telegram_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("User {}", telegram_id)))?;
        let (service, total) = self.orderable_service(service_id, quantity).await?;

        if user.balance < total {
            return Err(StoreError::InsufficientFunds {
                needed: total,
                available: user.balance,
            });
        }

        Ok(Quote {
            service_id: service.id,
            service_name: service.name,
            quantity,
            total_price: total,
            balance: user.balance,
            link_instructions: service.link_instructions,
        })
    }

    /// Debits the buyer and records a pending order in one transaction.
    /// Replaying the same `request_key` returns the first order untouched.
    pub async fn place_order(&self, req: &PlaceOrderRequest) -> StoreResult<PlaceOrderResponse> {
        let link = clean_text(&req.link, LINK_MAX)
            .ok_or_else(|| StoreError::validation(format!("Link must be 1-{} characters", LINK_MAX)))?;
        let request_key = req.request_key.trim();
        let request_key = (!request_key.is_empty()).then_some(request_key);
        if request_key.is_some_and(|k| k.len() > REQUEST_KEY_MAX) {
            return Err(StoreError::validation("Request key is too long"));
        }

        if let Some(key) = request_key
            && let Some(existing) = self.order_repo.get_by_request_key(key).await?
        {
            return self.replayed(req.telegram_id, existing).await;
        }

        let (service, total) = self.orderable_service(req.service_id, req.quantity).await?;

        let mut tx = self.pool.begin().await?;
        let balance = UserRepository::debit(&mut *tx, req.telegram_id, WithdrawalKind::Main, total).await?;
        let Some(balance) = balance else {
            drop(tx);
            let user = self
                .user_repo
                .get_by_tg_id(req.telegram_id)
                .await?
                .ok_or_else(|| StoreError::not_found(format!("User {}", req.telegram_id)))?;
            return Err(StoreError::InsufficientFunds {
                needed: total,
                available: user.balance,
            });
        };

        let inserted = OrderRepository::insert(
            &mut *tx,
            &NewOrder {
                user_id: req.telegram_id,
                service_id: service.id,
                quantity: req.quantity,
                link_or_id: &link,
                total_price: total,
                request_key,
            },
        )
        .await;

        let order_id = match inserted {
            Ok(id) => id,
            Err(e) if anyhow_is_unique_violation(&e, Some("request_key")) => {
                // A concurrent request with the same key won, its debit stands alone.
                drop(tx);
                let key = request_key.unwrap_or_default();
                let existing = self
                    .order_repo
                    .get_by_request_key(key)
                    .await?
                    .ok_or_else(|| StoreError::conflict("Duplicate order request"))?;
                return self.replayed(req.telegram_id, existing).await;
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        let order = self.get(order_id).await?;
        info!(
            "Order {} placed by {}: {} x{} for {} cents",
            order.id, order.user_id, service.name, order.quantity, order.total_price
        );

        let buyer = self.user_repo.get_by_tg_id(req.telegram_id).await.ok().flatten();
        self.notifications.new_order(&order, buyer.as_ref()).await;

        Ok(PlaceOrderResponse {
            order: order.into(),
            balance,
            created: true,
        })
    }

    async fn replayed(&self, telegram_id: i64, existing: Order) -> StoreResult<PlaceOrderResponse> {
        if existing.user_id != telegram_id {
            return Err(StoreError::conflict("Request key belongs to another user"));
        }
        let user = self
            .user_repo
            .get_by_tg_id(telegram_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("User {}", telegram_id)))?;
        info!("Replayed order request for order {}", existing.id);
        Ok(PlaceOrderResponse {
            order: existing.into(),
            balance: user.balance,
            created: false,
        })
    }

    pub async fn get(&self, id: i64) -> StoreResult<Order> {
        self.order_repo
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Order {}", id)))
    }

    pub async fn list(&self, status: Option<OrderStatus>, limit: i64, offset: i64) -> StoreResult<Vec<Order>> {
        Ok(self.order_repo.list(status, limit.clamp(1, 500), offset.max(0)).await?)
    }

    pub async fn list_for_user(&self, telegram_id: i64, limit: i64) -> StoreResult<Vec<Order>> {
        Ok(self.order_repo.list_for_user(telegram_id, limit.clamp(1, 100)).await?)
    }

    /// Compare-and-set from the order's current status to `to`, refunding up
    /// to `refund` cents in the same transaction. `None` when another writer
    /// moved the order first.
    pub async fn transition(&self, order: &Order, to: OrderStatus, refund: i64) -> StoreResult<Option<Transition>> {
        let refund = refund.clamp(0, order.refundable());

        let mut tx = self.pool.begin().await?;
        if !OrderRepository::transition(&mut *tx, order.id, order.status, to).await? {
            return Ok(None);
        }

        let mut refunded = 0;
        if refund > 0 && OrderRepository::add_refund(&mut *tx, order.id, refund).await? {
            if UserRepository::credit(&mut *tx, order.user_id, WithdrawalKind::Main, refund)
                .await?
                .is_none()
            {
                warn!("Order {} belongs to unknown user {}", order.id, order.user_id);
                return Err(StoreError::not_found(format!("User {}", order.user_id)));
            }
            refunded = refund;
        }
        tx.commit().await?;

        info!(
            "Order {}: {} -> {} (refunded {} cents)",
            order.id, order.status, to, refunded
        );
        let order = self.get(order.id).await?;
        Ok(Some(Transition { order, refunded }))
    }

    /// Admin status change. Setting the current status again is a no-op;
    /// cancelling refunds whatever the shop still holds for the order.
    pub async fn update_status(&self, order_id: i64, to: OrderStatus) -> StoreResult<Order> {
        let order = self.get(order_id).await?;
        if order.status == to {
            return Ok(order);
        }
        if !order.status.can_transition_to(to) {
            return Err(StoreError::conflict(format!(
                "Order {} cannot move from {} to {}",
                order.id, order.status, to
            )));
        }

        let refund = if to == OrderStatus::Canceled { order.refundable() } else { 0 };
        let done = self
            .transition(&order, to, refund)
            .await?
            .ok_or_else(|| StoreError::conflict(format!("Order {} was modified concurrently", order.id)))?;

        self.notifications.order_status(&done.order, done.refunded).await;
        Ok(done.order)
    }

    pub async fn stats(&self) -> StoreResult<ShopStats> {
        Ok(self.order_repo.stats().await?)
    }
}
