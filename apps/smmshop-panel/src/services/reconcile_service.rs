use chrono::Utc;
use serde::Serialize;
use smmshop_db::models::order::Order;
use smmshop_db::repositories::mapping_repo::MappingRepository;
use smmshop_db::repositories::order_repo::OrderRepository;
use smmshop_db::repositories::provider_repo::ProviderRepository;
use smmshop_db::repositories::service_repo::ServiceRepository;
use smmshop_shared::{OrderStatus, money};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Duration, interval, sleep};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::provider::{ProviderError, RemoteStatus};
use crate::services::notification_service::NotificationService;
use crate::services::order_service::OrderService;
use crate::services::provider_service::ProviderService;

const BATCH: i64 = 50;
/// A dispatch lease older than this is considered abandoned by a dead worker.
const CLAIM_TTL_SECS: i64 = 600;

#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchSummary {
    pub claimed: usize,
    pub dispatched: usize,
    pub unmapped: usize,
    pub failed: usize,
    pub canceled: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncSummary {
    pub checked: usize,
    pub completed: usize,
    pub partial: usize,
    pub canceled: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CycleSummary {
    pub dispatch: DispatchSummary,
    pub sync: SyncSummary,
}

impl CycleSummary {
    pub fn is_idle(&self) -> bool {
        self.dispatch.claimed == 0 && self.sync.checked == 0
    }
}

enum Dispatch {
    Sent,
    Unmapped,
    /// Accepted upstream but the local order had already moved on.
    Raced,
}

/// Forwards paid orders to providers and follows them to a final state.
#[derive(Clone)]
pub struct ReconcileService {
    order_repo: OrderRepository,
    mapping_repo: MappingRepository,
    provider_repo: ProviderRepository,
    service_repo: ServiceRepository,
    orders: OrderService,
    providers: ProviderService,
    notifications: NotificationService,
    every: Duration,
    request_delay: Duration,
    max_attempts: i64,
    cycle_lock: Arc<Mutex<()>>,
}

impl ReconcileService {
    pub fn new(
        pool: SqlitePool,
        orders: OrderService,
        providers: ProviderService,
        notifications: NotificationService,
        config: &Config,
    ) -> Self {
        Self {
            order_repo: OrderRepository::new(pool.clone()),
            mapping_repo: MappingRepository::new(pool.clone()),
            provider_repo: ProviderRepository::new(pool.clone()),
            service_repo: ServiceRepository::new(pool),
            orders,
            providers,
            notifications,
            every: config.reconcile_interval,
            request_delay: config.provider_request_delay,
            max_attempts: config.max_dispatch_attempts.max(1),
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting reconcile worker, every {:?}", self.every);
        let mut ticker = interval(self.every);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(summary) if summary.is_idle() => debug!("Reconcile cycle: nothing to do"),
                        Ok(summary) => info!("Reconcile cycle: {:?}", summary),
                        Err(e) => error!("Reconcile cycle failed: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Reconcile worker stopping");
                    break;
                }
            }
        }
    }

    /// Dispatch then sync. Cycles never overlap, a manual trigger waits for
    /// the running one.
    pub async fn run_cycle(&self) -> StoreResult<CycleSummary> {
        let _guard = self.cycle_lock.lock().await;
        let dispatch = self.dispatch_pending().await?;
        let sync = self.sync_processing().await?;
        Ok(CycleSummary { dispatch, sync })
    }

    async fn pace(&self, calls: &mut u32) {
        if *calls > 0 && !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
        *calls += 1;
    }

    pub async fn dispatch_pending(&self) -> StoreResult<DispatchSummary> {
        let mut summary = DispatchSummary::default();
        let mut balances: HashMap<i64, f64> = HashMap::new();
        let mut calls = 0u32;

        // Walk every pending order by id so orders left for manual handling
        // never starve the ones behind them.
        let mut cursor = 0;
        loop {
            let page = self.order_repo.list_dispatchable(cursor, BATCH).await?;
            let Some(last) = page.last() else { break };
            cursor = last.id;

            for order in page {
                let now = Utc::now().timestamp();
                if !self
                    .order_repo
                    .claim_for_dispatch(order.id, now, now - CLAIM_TTL_SECS)
                    .await?
                {
                    continue;
                }
                summary.claimed += 1;

                match self.dispatch_one(&order, &mut balances, &mut calls).await {
                    Ok(Dispatch::Sent) => summary.dispatched += 1,
                    Ok(Dispatch::Unmapped) => summary.unmapped += 1,
                    Ok(Dispatch::Raced) => {}
                    Err(e) => {
                        summary.failed += 1;
                        let attempts = self.order_repo.release_claim(order.id, &e.to_string()).await?;
                        warn!(
                            "Dispatch of order {} failed (attempt {}/{}): {}",
                            order.id, attempts, self.max_attempts, e
                        );
                        if attempts >= self.max_attempts && self.give_up(order.id).await? {
                            summary.canceled += 1;
                        }
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn dispatch_one(
        &self,
        order: &Order,
        balances: &mut HashMap<i64, f64>,
        calls: &mut u32,
    ) -> StoreResult<Dispatch> {
        let Some(mapping) = self.mapping_repo.find_for_order(order.service_id, order.quantity).await? else {
            self.order_repo
                .unclaim(order.id, "No active provider mapping for this quantity")
                .await?;
            debug!("Order {} has no usable mapping, left for manual handling", order.id);
            return Ok(Dispatch::Unmapped);
        };

        let provider = self
            .provider_repo
            .get(mapping.provider_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Provider {}", mapping.provider_id)))?;
        let service = self
            .service_repo
            .get(order.service_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Service {}", order.service_id)))?;
        let client = self.providers.client_for(&provider)?;

        let estimate =
            money::provider_cost_estimate(order.quantity, service.price_per_thousand(), mapping.price_multiplier);
        let available = match balances.get(&provider.id) {
            Some(cached) => *cached,
            None => {
                self.pace(calls).await;
                let fetched = client.balance().await?.balance;
                balances.insert(provider.id, fetched);
                fetched
            }
        };
        if available < estimate {
            return Err(ProviderError::InsufficientBalance {
                needed: estimate,
                available,
            }
            .into());
        }

        self.pace(calls).await;
        let remote_id = client
            .add_order(&mapping.provider_service_id, &order.link_or_id, order.quantity)
            .await?;
        balances.insert(provider.id, available - estimate);

        match self.order_repo.mark_processing(order.id, provider.id, &remote_id).await {
            Ok(true) => {
                info!(
                    "Order {} sent to provider {} as {} (est. cost {:.4})",
                    order.id, provider.name, remote_id, estimate
                );
                Ok(Dispatch::Sent)
            }
            Ok(false) => {
                error!(
                    "Order {} changed while dispatching, provider {} order {} needs manual review",
                    order.id, provider.name, remote_id
                );
                Ok(Dispatch::Raced)
            }
            Err(e) => {
                // The lease stays so the order is not sent twice before an admin looks.
                error!(
                    "Order {} accepted by provider {} as {} but not recorded: {:#}",
                    order.id, provider.name, remote_id, e
                );
                Ok(Dispatch::Raced)
            }
        }
    }

    /// Cancels and refunds an order that exhausted its dispatch attempts.
    async fn give_up(&self, order_id: i64) -> StoreResult<bool> {
        let order = self.orders.get(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Ok(false);
        }
        let refund = order.refundable();
        match self.orders.transition(&order, OrderStatus::Canceled, refund).await? {
            Some(done) => {
                warn!("Order {} canceled after {} failed dispatch attempts", order.id, order.dispatch_attempts);
                self.notifications.order_status(&done.order, done.refunded).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn sync_processing(&self) -> StoreResult<SyncSummary> {
        let mut summary = SyncSummary::default();
        let mut calls = 0u32;

        let mut cursor = 0;
        loop {
            let page = self.order_repo.list_processing(cursor, BATCH).await?;
            let Some(last) = page.last() else { break };
            cursor = last.id;

            for order in page {
                let (Some(provider_id), Some(remote_id)) = (order.provider_id, order.provider_order_id.as_deref()) else {
                    warn!("Processing order {} has no provider reference", order.id);
                    continue;
                };
                let Some(provider) = self.provider_repo.get(provider_id).await? else {
                    warn!("Provider {} of order {} no longer exists", provider_id, order.id);
                    continue;
                };
                summary.checked += 1;

                self.pace(&mut calls).await;
                let remote = match self.providers.client_for(&provider) {
                    Ok(client) => client.order_status(remote_id).await,
                    Err(e) => Err(e),
                };
                let remote = match remote {
                    Ok(r) => r,
                    Err(e) => {
                        summary.failed += 1;
                        warn!("Status check for order {} at {} failed: {}", order.id, provider.name, e);
                        continue;
                    }
                };

                let (to, refund) = match remote.remote_status() {
                    RemoteStatus::Active => continue,
                    RemoteStatus::Completed => (OrderStatus::Completed, 0),
                    RemoteStatus::Partial => (
                        OrderStatus::Partial,
                        money::partial_refund(order.total_price, order.quantity, remote.remains.unwrap_or(0)),
                    ),
                    RemoteStatus::Canceled => (OrderStatus::Canceled, order.refundable()),
                };

                if let Some(done) = self.orders.transition(&order, to, refund).await? {
                    match to {
                        OrderStatus::Completed => summary.completed += 1,
                        OrderStatus::Partial => summary.partial += 1,
                        _ => summary.canceled += 1,
                    }
                    self.notifications.order_status(&done.order, done.refunded).await;
                }
            }
        }

        Ok(summary)
    }
}
