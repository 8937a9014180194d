use smmshop_db::models::catalog::{Category, NewPaymentMethod, NewService, PaymentMethod, Service, ServiceUpdate};
use smmshop_db::repositories::category_repo::{CategoryRepository, SubtreeRemoval};
use smmshop_db::repositories::payment_method_repo::PaymentMethodRepository;
use smmshop_db::repositories::service_repo::{ServiceRemoval, ServiceRepository};
use smmshop_db::utils::anyhow_is_unique_violation;
use smmshop_shared::api::CategoryPage;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::utils::clean_text;

const NAME_MAX: usize = 128;

#[derive(Debug, Clone)]
pub struct CatalogService {
    pool: SqlitePool,
    category_repo: CategoryRepository,
    service_repo: ServiceRepository,
    payment_method_repo: PaymentMethodRepository,
}

impl CatalogService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            category_repo: CategoryRepository::new(pool.clone()),
            service_repo: ServiceRepository::new(pool.clone()),
            payment_method_repo: PaymentMethodRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn root_categories(&self) -> StoreResult<Vec<Category>> {
        Ok(self.category_repo.get_roots().await?)
    }

    pub async fn all_categories(&self) -> StoreResult<Vec<Category>> {
        Ok(self.category_repo.get_all().await?)
    }

    pub async fn get_category(&self, id: i64) -> StoreResult<Category> {
        self.category_repo
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Category {}", id)))
    }

    /// Category with its direct children and services, as the bot shows it.
    pub async fn category_page(&self, id: i64, only_available: bool) -> StoreResult<CategoryPage> {
        let category = self.get_category(id).await?;
        let subcategories = self.category_repo.get_children(id).await?;
        let services = self.service_repo.get_by_category(id, only_available).await?;

        Ok(CategoryPage {
            category: category.into(),
            subcategories: subcategories.into_iter().map(Into::into).collect(),
            services: services.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn create_category(&self, name: &str, parent_id: Option<i64>) -> StoreResult<Category> {
        let name = clean_text(name, NAME_MAX).ok_or_else(|| StoreError::validation("Category name is required"))?;
        if let Some(parent) = parent_id {
            self.get_category(parent).await?;
        }

        match self.category_repo.create(&name, parent_id).await {
            Ok(category) => {
                info!("Created category {} ({})", category.id, category.name);
                Ok(category)
            }
            Err(e) if anyhow_is_unique_violation(&e, Some("name")) => {
                Err(StoreError::conflict(format!("Category `{}` already exists", name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Renames and/or moves a category. Moving below one of its own
    /// descendants is refused.
    pub async fn update_category(&self, id: i64, name: &str, parent_id: Option<i64>) -> StoreResult<Category> {
        let name = clean_text(name, NAME_MAX).ok_or_else(|| StoreError::validation("Category name is required"))?;
        self.get_category(id).await?;

        if let Some(parent) = parent_id {
            self.get_category(parent).await?;
            let subtree = self.category_repo.subtree_ids(id).await?;
            if subtree.contains(&parent) {
                return Err(StoreError::validation("A category cannot be moved under itself"));
            }
        }

        match self.category_repo.update(id, &name, parent_id).await {
            Ok(Some(category)) => Ok(category),
            Ok(None) => Err(StoreError::not_found(format!("Category {}", id))),
            Err(e) if anyhow_is_unique_violation(&e, Some("name")) => {
                Err(StoreError::conflict(format!("Category `{}` already exists", name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_category(&self, id: i64) -> StoreResult<SubtreeRemoval> {
        let removal = self
            .category_repo
            .delete_subtree(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Category {}", id)))?;
        info!(
            "Deleted category {}: {} categories, {} services deleted, {} retired",
            id, removal.categories, removal.services_deleted, removal.services_retired
        );
        Ok(removal)
    }

    pub async fn list_services(&self, category_id: Option<i64>, only_available: bool) -> StoreResult<Vec<Service>> {
        match (category_id, only_available) {
            (Some(cat), _) => Ok(self.service_repo.get_by_category(cat, only_available).await?),
            (None, true) => Ok(self.service_repo.get_available().await?),
            (None, false) => Ok(self.service_repo.get_all().await?),
        }
    }

    pub async fn get_service(&self, id: i64) -> StoreResult<Service> {
        self.service_repo
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Service {}", id)))
    }

    pub async fn create_service(&self, mut service: NewService) -> StoreResult<Service> {
        service.name = clean_text(&service.name, NAME_MAX).ok_or_else(|| StoreError::validation("Service name is required"))?;
        validate_pricing(service.base_price, service.base_quantity, service.min_quantity, service.max_quantity)?;
        if let Some(cat) = service.category_id {
            self.get_category(cat).await?;
        }

        let created = ServiceRepository::create(&self.pool, &service).await?;
        info!("Created service {} ({})", created.id, created.name);
        Ok(created)
    }

    /// Partial update; the merged result must still be a valid service.
    pub async fn update_service(&self, id: i64, mut update: ServiceUpdate) -> StoreResult<Service> {
        let current = self.get_service(id).await?;

        if let Some(name) = update.name.as_deref() {
            update.name = Some(clean_text(name, NAME_MAX).ok_or_else(|| StoreError::validation("Service name is required"))?);
        }
        validate_pricing(
            update.base_price.unwrap_or(current.base_price),
            update.base_quantity.unwrap_or(current.base_quantity),
            update.min_quantity.unwrap_or(current.min_quantity),
            update.max_quantity.unwrap_or(current.max_quantity),
        )?;
        if let Some(cat) = update.category_id {
            self.get_category(cat).await?;
        }

        self.service_repo
            .update(id, &update)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Service {}", id)))
    }

    pub async fn delete_service(&self, id: i64) -> StoreResult<ServiceRemoval> {
        let outcome = self
            .service_repo
            .delete(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Service {}", id)))?;
        info!("Removed service {}: {:?}", id, outcome);
        Ok(outcome)
    }

    pub async fn available_payment_methods(&self) -> StoreResult<Vec<PaymentMethod>> {
        Ok(self.payment_method_repo.get_available().await?)
    }

    pub async fn all_payment_methods(&self) -> StoreResult<Vec<PaymentMethod>> {
        Ok(self.payment_method_repo.get_all().await?)
    }

    pub async fn create_payment_method(&self, method: NewPaymentMethod) -> StoreResult<PaymentMethod> {
        let method = validate_payment_method(method)?;
        Ok(self.payment_method_repo.create(&method).await?)
    }

    pub async fn update_payment_method(&self, id: i64, method: NewPaymentMethod) -> StoreResult<PaymentMethod> {
        let method = validate_payment_method(method)?;
        self.payment_method_repo
            .update(id, &method)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Payment method {}", id)))
    }

    pub async fn delete_payment_method(&self, id: i64) -> StoreResult<()> {
        if !self.payment_method_repo.delete(id).await? {
            return Err(StoreError::not_found(format!("Payment method {}", id)));
        }
        Ok(())
    }
}

fn validate_pricing(base_price: i64, base_quantity: i64, min_quantity: i64, max_quantity: i64) -> StoreResult<()> {
    if base_price < 0 {
        return Err(StoreError::validation("Price cannot be negative"));
    }
    if base_quantity <= 0 {
        return Err(StoreError::validation("Base quantity must be positive"));
    }
    if min_quantity < 1 || min_quantity > max_quantity {
        return Err(StoreError::validation("Quantity bounds must satisfy 1 <= min <= max"));
    }
    Ok(())
}

fn validate_payment_method(mut method: NewPaymentMethod) -> StoreResult<NewPaymentMethod> {
    method.name =
        clean_text(&method.name, NAME_MAX).ok_or_else(|| StoreError::validation("Payment method name is required"))?;
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smmshop_db::init_memory_db;

    fn new_service(name: &str, category_id: Option<i64>) -> NewService {
        NewService {
            name: name.to_string(),
            description: None,
            base_price: 500,
            base_quantity: 1000,
            min_quantity: 100,
            max_quantity: 10_000,
            is_available: true,
            category_id,
            link_instructions: Some("Send a public profile link".to_string()),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_category_names() {
        let catalog = CatalogService::new(init_memory_db().await.unwrap());
        catalog.create_category("Instagram", None).await.unwrap();
        let err = catalog.create_category(" Instagram ", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn refuses_category_cycles() {
        let catalog = CatalogService::new(init_memory_db().await.unwrap());
        let root = catalog.create_category("Social", None).await.unwrap();
        let child = catalog.create_category("Instagram", Some(root.id)).await.unwrap();

        let err = catalog.update_category(root.id, "Social", Some(child.id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        let err = catalog.update_category(root.id, "Social", Some(root.id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn page_hides_unavailable_services() {
        let catalog = CatalogService::new(init_memory_db().await.unwrap());
        let root = catalog.create_category("TikTok", None).await.unwrap();
        catalog.create_category("TikTok Views", Some(root.id)).await.unwrap();
        let svc = catalog.create_service(new_service("Followers", Some(root.id))).await.unwrap();
        catalog.create_service(new_service("Likes", Some(root.id))).await.unwrap();
        catalog
            .update_service(
                svc.id,
                ServiceUpdate {
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let page = catalog.category_page(root.id, true).await.unwrap();
        assert_eq!(page.subcategories.len(), 1);
        assert_eq!(page.services.len(), 1);
        assert_eq!(page.services[0].name, "Likes");
    }

    #[tokio::test]
    async fn invalid_bounds_are_rejected() {
        let catalog = CatalogService::new(init_memory_db().await.unwrap());
        let mut bad = new_service("Views", None);
        bad.min_quantity = 500;
        bad.max_quantity = 100;
        assert!(matches!(
            catalog.create_service(bad).await.unwrap_err(),
            StoreError::Validation(_)
        ));

        let svc = catalog.create_service(new_service("Views", None)).await.unwrap();
        let err = catalog
            .update_service(
                svc.id,
                ServiceUpdate {
                    min_quantity: Some(20_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
