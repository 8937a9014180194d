use crate::api_client::ApiClient;
use smmshop_shared::api::SettingValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const CACHE_TTL: Duration = Duration::from_secs(300);

/// Read-through cache over the panel's settings endpoint. Entries expire so
/// edits made in the admin API reach the bot without a restart.
#[derive(Clone)]
pub struct SettingsService {
    api: ApiClient,
    cache: Arc<RwLock<HashMap<String, (Option<String>, Instant)>>>,
}

impl SettingsService {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let cache = self.cache.read().await;
        if let Some((val, fetched)) = cache.get(key) {
            if fetched.elapsed() < CACHE_TTL {
                return val.clone();
            }
        }
        drop(cache);

        match self.api.get::<SettingValue>(&format!("/settings/{}", key)).await {
            Ok(setting) => {
                let value = setting.value.filter(|v| !v.trim().is_empty());
                let mut cache = self.cache.write().await;
                cache.insert(key.to_string(), (value.clone(), Instant::now()));
                value
            }
            Err(e) => {
                tracing::warn!("Failed to fetch setting {}: {}", key, e);
                None
            }
        }
    }

    pub async fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get(key).await.unwrap_or_else(|| default.to_string())
    }
}
