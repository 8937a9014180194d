use serde::Deserialize;
use smmshop_db::models::catalog::{NewService, Service};
use smmshop_db::models::provider::{MappingDetails, ServiceMapping, ServiceProvider};
use smmshop_db::repositories::mapping_repo::{MappingRepository, NewMapping};
use smmshop_db::repositories::provider_repo::ProviderRepository;
use smmshop_db::repositories::service_repo::ServiceRepository;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::provider::{ProviderBalance, ProviderClient, ProviderError, ProviderServiceInfo};
use crate::utils::clean_text;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProviderRequest {
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingRequest {
    pub service_id: i64,
    pub provider_id: i64,
    pub provider_service_id: String,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub price_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingUpdateRequest {
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub price_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub provider_id: i64,
    pub provider_service_id: String,
    pub category_id: Option<i64>,
    /// Shop price in cents per 1000 units.
    pub price: i64,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportedService {
    pub service: Service,
    pub mapping: ServiceMapping,
}

fn default_active() -> bool {
    true
}

#[derive(Clone)]
pub struct ProviderService {
    pool: SqlitePool,
    provider_repo: ProviderRepository,
    mapping_repo: MappingRepository,
    service_repo: ServiceRepository,
    timeout: Duration,
}

impl ProviderService {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self {
            provider_repo: ProviderRepository::new(pool.clone()),
            mapping_repo: MappingRepository::new(pool.clone()),
            service_repo: ServiceRepository::new(pool.clone()),
            pool,
            timeout,
        }
    }

    pub fn client_for(&self, provider: &ServiceProvider) -> Result<ProviderClient, ProviderError> {
        ProviderClient::new(&provider.api_url, &provider.api_key, self.timeout)
    }

    pub async fn get_provider(&self, id: i64) -> StoreResult<ServiceProvider> {
        self.provider_repo
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Provider {}", id)))
    }

    pub async fn list_providers(&self) -> StoreResult<Vec<ServiceProvider>> {
        Ok(self.provider_repo.get_all().await?)
    }

    pub async fn add_provider(&self, req: &NewProviderRequest) -> StoreResult<ServiceProvider> {
        let name = clean_text(&req.name, 100).ok_or_else(|| StoreError::validation("Provider name is required"))?;
        let api_key = req.api_key.trim();
        if api_key.is_empty() {
            return Err(StoreError::validation("API key is required"));
        }
        let api_url = validate_api_url(&req.api_url)?;

        let provider = self.provider_repo.create(&name, &api_url, api_key, req.is_active).await?;
        info!("Provider {} added ({})", provider.id, provider.name);
        Ok(provider)
    }

    /// Flips the active flag and returns the provider as stored afterwards.
    pub async fn toggle_provider(&self, id: i64) -> StoreResult<ServiceProvider> {
        let provider = self.get_provider(id).await?;
        self.provider_repo.set_active(id, !provider.is_active).await?;
        info!("Provider {} active = {}", id, !provider.is_active);
        self.get_provider(id).await
    }

    pub async fn delete_provider(&self, id: i64) -> StoreResult<()> {
        if !self.provider_repo.delete(id).await? {
            return Err(StoreError::not_found(format!("Provider {}", id)));
        }
        info!("Provider {} deleted with its mappings", id);
        Ok(())
    }

    pub async fn provider_services(&self, provider_id: i64) -> StoreResult<Vec<ProviderServiceInfo>> {
        let provider = self.get_provider(provider_id).await?;
        Ok(self.client_for(&provider)?.services().await?)
    }

    pub async fn provider_balance(&self, provider_id: i64) -> StoreResult<ProviderBalance> {
        let provider = self.get_provider(provider_id).await?;
        Ok(self.client_for(&provider)?.balance().await?)
    }

    async fn remote_service(&self, provider: &ServiceProvider, remote_id: &str) -> StoreResult<ProviderServiceInfo> {
        let listing = self.client_for(provider)?.services().await?;
        listing
            .into_iter()
            .find(|s| s.service == remote_id)
            .ok_or_else(|| ProviderError::UnknownService(remote_id.to_string()).into())
    }

    pub async fn list_mappings(&self) -> StoreResult<Vec<MappingDetails>> {
        Ok(self.mapping_repo.list_details().await?)
    }

    /// Links a shop service to a provider service. Without an explicit
    /// multiplier it is derived from the provider's current rate.
    pub async fn create_mapping(&self, req: &MappingRequest) -> StoreResult<ServiceMapping> {
        let service = self
            .service_repo
            .get(req.service_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Service {}", req.service_id)))?;
        let provider = self.get_provider(req.provider_id).await?;
        let remote_id = req.provider_service_id.trim();
        if remote_id.is_empty() {
            return Err(StoreError::validation("Provider service id is required"));
        }

        let needs_remote = req.price_multiplier.is_none() || req.min_quantity.is_none() || req.max_quantity.is_none();
        let remote = if needs_remote {
            Some(self.remote_service(&provider, remote_id).await?)
        } else {
            None
        };

        let multiplier = match req.price_multiplier {
            Some(m) => validate_multiplier(m)?,
            None => multiplier_for(&service, remote.as_ref().map_or(0.0, |r| r.rate))?,
        };
        let min = req
            .min_quantity
            .or(remote.as_ref().map(|r| r.min))
            .unwrap_or(service.min_quantity);
        let max = req
            .max_quantity
            .or(remote.as_ref().map(|r| r.max))
            .unwrap_or(service.max_quantity);
        validate_bounds(min, max)?;

        let mapping = MappingRepository::create(
            &self.pool,
            &NewMapping {
                service_id: service.id,
                provider_id: provider.id,
                provider_service_id: remote_id,
                min_quantity: min,
                max_quantity: max,
                price_multiplier: multiplier,
            },
        )
        .await?;
        info!(
            "Mapped service {} to provider {} service {} (x{:.4})",
            service.id, provider.id, remote_id, multiplier
        );
        Ok(mapping)
    }

    pub async fn update_mapping(&self, id: i64, req: &MappingUpdateRequest) -> StoreResult<ServiceMapping> {
        validate_bounds(req.min_quantity, req.max_quantity)?;
        let multiplier = req.price_multiplier.map(validate_multiplier).transpose()?;
        self.mapping_repo
            .update(id, req.min_quantity, req.max_quantity, multiplier)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("Mapping {}", id)))
    }

    pub async fn delete_mapping(&self, id: i64) -> StoreResult<()> {
        if !self.mapping_repo.delete(id).await? {
            return Err(StoreError::not_found(format!("Mapping {}", id)));
        }
        Ok(())
    }

    /// Creates a shop service from a provider listing entry together with its
    /// mapping. Bounds are clamped into the provider's range.
    pub async fn import_service(&self, req: &ImportRequest) -> StoreResult<ImportedService> {
        if req.price <= 0 {
            return Err(StoreError::validation("Price must be positive"));
        }
        let provider = self.get_provider(req.provider_id).await?;
        let remote_id = req.provider_service_id.trim();
        let remote = self.remote_service(&provider, remote_id).await?;

        let min = req.min_quantity.unwrap_or(remote.min).clamp(remote.min, remote.max);
        let max = req.max_quantity.unwrap_or(remote.max).clamp(remote.min, remote.max);
        validate_bounds(min, max)?;

        let name = req
            .name
            .as_deref()
            .and_then(|n| clean_text(n, 200))
            .or_else(|| clean_text(&remote.name, 200))
            .unwrap_or_else(|| format!("{} #{}", provider.name, remote_id));

        let new_service = NewService {
            name,
            description: remote.category.clone(),
            base_price: req.price,
            base_quantity: 1000,
            min_quantity: min,
            max_quantity: max,
            is_available: true,
            category_id: req.category_id,
            link_instructions: None,
        };

        let mut tx = self.pool.begin().await?;
        let service = ServiceRepository::create(&mut *tx, &new_service).await?;
        let multiplier = multiplier_for(&service, remote.rate)?;
        let mapping = MappingRepository::create(
            &mut *tx,
            &NewMapping {
                service_id: service.id,
                provider_id: provider.id,
                provider_service_id: remote_id,
                min_quantity: min,
                max_quantity: max,
                price_multiplier: multiplier,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            "Imported provider {} service {} as service {}",
            provider.id, remote_id, service.id
        );
        Ok(ImportedService { service, mapping })
    }
}

fn validate_api_url(raw: &str) -> StoreResult<String> {
    let parsed = url::Url::parse(raw.trim()).map_err(|_| StoreError::validation("API URL is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StoreError::validation("API URL must use http or https"));
    }
    Ok(parsed.to_string())
}

fn validate_bounds(min: i64, max: i64) -> StoreResult<()> {
    if min < 1 || max < min {
        return Err(StoreError::validation(format!("Invalid quantity bounds {}..{}", min, max)));
    }
    Ok(())
}

fn validate_multiplier(m: f64) -> StoreResult<f64> {
    if !m.is_finite() || m <= 0.0 {
        return Err(StoreError::validation("Price multiplier must be positive"));
    }
    Ok(m)
}

/// Shop price per 1000 divided by the provider rate.
pub fn multiplier_for(service: &Service, provider_rate: f64) -> StoreResult<f64> {
    if !provider_rate.is_finite() || provider_rate <= 0.0 {
        return Err(StoreError::validation("Provider rate must be positive"));
    }
    validate_multiplier(service.price_per_thousand() / provider_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smmshop_db::init_memory_db;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_listing(server: &MockServer) {
        Mock::given(method("POST"))
            .and(body_string_contains("action=services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "service": "11", "name": "IG Followers HQ", "category": "Instagram", "rate": "1.50", "min": "100", "max": "20000" }
            ])))
            .mount(server)
            .await;
    }

    async fn setup(server: &MockServer) -> (ProviderService, ServiceProvider) {
        let pool = init_memory_db().await.unwrap();
        let svc = ProviderService::new(pool, Duration::from_secs(5));
        let provider = svc
            .add_provider(&NewProviderRequest {
                name: "Upstream".to_string(),
                api_url: format!("{}/api/v2", server.uri()),
                api_key: "k".to_string(),
                is_active: true,
            })
            .await
            .unwrap();
        (svc, provider)
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let pool = init_memory_db().await.unwrap();
        let svc = ProviderService::new(pool, Duration::from_secs(5));
        let err = svc
            .add_provider(&NewProviderRequest {
                name: "Bad".to_string(),
                api_url: "ftp://example.com".to_string(),
                api_key: "k".to_string(),
                is_active: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn import_clamps_bounds_and_derives_multiplier() {
        let server = MockServer::start().await;
        mock_listing(&server).await;
        let (svc, provider) = setup(&server).await;

        let imported = svc
            .import_service(&ImportRequest {
                provider_id: provider.id,
                provider_service_id: "11".to_string(),
                category_id: None,
                price: 300,
                min_quantity: Some(10),
                max_quantity: Some(50_000),
                name: None,
            })
            .await
            .unwrap();

        assert_eq!(imported.service.name, "IG Followers HQ");
        assert_eq!(imported.service.min_quantity, 100);
        assert_eq!(imported.service.max_quantity, 20_000);
        // $3.00 per 1000 sold over a $1.50 rate
        assert!((imported.mapping.price_multiplier - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_remote_service_is_a_provider_error() {
        let server = MockServer::start().await;
        mock_listing(&server).await;
        let (svc, provider) = setup(&server).await;
        let service = ServiceRepository::create(
            &svc.pool,
            &NewService {
                name: "Likes".to_string(),
                description: None,
                base_price: 100,
                base_quantity: 1000,
                min_quantity: 10,
                max_quantity: 1000,
                is_available: true,
                category_id: None,
                link_instructions: None,
            },
        )
        .await
        .unwrap();

        let err = svc
            .create_mapping(&MappingRequest {
                service_id: service.id,
                provider_id: provider.id,
                provider_service_id: "999".to_string(),
                min_quantity: None,
                max_quantity: None,
                price_multiplier: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Provider(ProviderError::UnknownService(_))));

        // explicit multiplier and bounds need no provider round trip
        let mapping = svc
            .create_mapping(&MappingRequest {
                service_id: service.id,
                provider_id: provider.id,
                provider_service_id: "999".to_string(),
                min_quantity: Some(10),
                max_quantity: Some(500),
                price_multiplier: Some(1.25),
            })
            .await
            .unwrap();
        assert_eq!(mapping.max_quantity, 500);
    }

    #[tokio::test]
    async fn toggle_flips_active_flag() {
        let server = MockServer::start().await;
        let (svc, provider) = setup(&server).await;
        assert!(!svc.toggle_provider(provider.id).await.unwrap().is_active);
        assert!(svc.toggle_provider(provider.id).await.unwrap().is_active);
    }
}
