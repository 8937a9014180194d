use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub const REFERRAL_BONUS: &str = "referral_bonus";
pub const REFERRAL_COUNT_FOR_BONUS: &str = "referral_count_for_bonus";
pub const MIN_REFERRAL_WITHDRAWAL: &str = "min_referral_withdrawal";
pub const START_MESSAGE: &str = "start_message";
pub const SUPPORT_URL: &str = "support_url";
pub const REQUIRED_CHANNEL_LINK: &str = "required_channel_link";

/// Settings holding amounts or counters; writes to these must be integers.
const NUMERIC_KEYS: [&str; 3] = [REFERRAL_BONUS, REFERRAL_COUNT_FOR_BONUS, MIN_REFERRAL_WITHDRAWAL];
/// Settings rendered as links by the bot. Empty clears them.
const URL_KEYS: [&str; 2] = [SUPPORT_URL, REQUIRED_CHANNEL_LINK];
/// Telegram's limit for a single message.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Clone)]
pub struct SettingsService {
    pool: SqlitePool,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl SettingsService {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let service = Self {
            pool,
            cache: Arc::new(RwLock::new(HashMap::new())),
        };

        service.reload_cache().await?;
        Ok(service)
    }

    pub async fn reload_cache(&self) -> Result<()> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch settings from DB")?;

        let mut cache = self.cache.write().await;
        cache.clear();
        cache.extend(rows);

        info!("Settings cache loaded with {} items", cache.len());
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let cache = self.cache.read().await;
        cache.get(key).cloned()
    }

    /// Integer setting, `default` when missing or unparsable.
    pub async fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .await
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub async fn all(&self) -> BTreeMap<String, String> {
        let cache = self.cache.read().await;
        cache.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_setting(key, value)?;

        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to update setting in DB")?;

        let mut cache = self.cache.write().await;
        cache.insert(key.to_string(), value.to_string());

        Ok(())
    }

    pub async fn set_multiple(&self, settings: HashMap<String, String>) -> Result<()> {
        for (key, value) in &settings {
            validate_setting(key, value)?;
        }

        let mut tx = self.pool.begin().await?;
        for (key, value) in &settings {
            sqlx::query(
                "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .context(format!("Failed to update setting {}", key))?;
        }
        tx.commit().await?;

        let mut cache = self.cache.write().await;
        cache.extend(settings);

        Ok(())
    }
}

pub fn validate_setting(key: &str, value: &str) -> Result<()> {
    if key.trim().is_empty() {
        anyhow::bail!("Setting key must not be empty");
    }
    if NUMERIC_KEYS.contains(&key) {
        let n: i64 = value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Setting {} must be an integer", key))?;
        if n < 0 {
            anyhow::bail!("Setting {} must not be negative", key);
        }
    }
    if URL_KEYS.contains(&key) && !value.trim().is_empty() {
        let url = url::Url::parse(value.trim()).map_err(|_| anyhow::anyhow!("Setting {} must be a URL", key))?;
        if !matches!(url.scheme(), "http" | "https" | "tg") {
            anyhow::bail!("Setting {} must be an http(s) or tg link", key);
        }
    }
    if key == START_MESSAGE && value.chars().count() > MAX_MESSAGE_CHARS {
        anyhow::bail!("Start message is longer than {} characters", MAX_MESSAGE_CHARS);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smmshop_db::init_memory_db;

    #[tokio::test]
    async fn loads_seeded_defaults() {
        let pool = init_memory_db().await.unwrap();
        let settings = SettingsService::new(pool).await.unwrap();

        assert_eq!(settings.get_i64(REFERRAL_BONUS, 0).await, 10);
        assert_eq!(settings.get_i64(MIN_REFERRAL_WITHDRAWAL, 0).await, 500);
        assert_eq!(settings.get_i64("missing", 7).await, 7);
    }

    #[tokio::test]
    async fn writes_through_to_db() {
        let pool = init_memory_db().await.unwrap();
        let settings = SettingsService::new(pool.clone()).await.unwrap();
        settings.set(SUPPORT_URL, "https://t.me/help").await.unwrap();

        let fresh = SettingsService::new(pool).await.unwrap();
        assert_eq!(fresh.get(SUPPORT_URL).await.as_deref(), Some("https://t.me/help"));
    }

    #[tokio::test]
    async fn numeric_settings_are_validated() {
        let pool = init_memory_db().await.unwrap();
        let settings = SettingsService::new(pool).await.unwrap();

        assert!(settings.set(REFERRAL_BONUS, "ten").await.is_err());
        assert!(settings.set(REFERRAL_BONUS, "-1").await.is_err());
        assert_eq!(settings.get_i64(REFERRAL_BONUS, 0).await, 10);
    }

    #[test]
    fn link_and_message_settings_are_checked() {
        assert!(validate_setting(SUPPORT_URL, "https://t.me/help").is_ok());
        assert!(validate_setting(SUPPORT_URL, "").is_ok());
        assert!(validate_setting(REQUIRED_CHANNEL_LINK, "t.me/channel").is_err());
        assert!(validate_setting(REQUIRED_CHANNEL_LINK, "ftp://x.org").is_err());
        assert!(validate_setting(START_MESSAGE, &"a".repeat(5000)).is_err());
        assert!(validate_setting("custom_key", "anything").is_ok());
    }
}
