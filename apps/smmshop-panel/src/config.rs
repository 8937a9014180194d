use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Process configuration read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub bot_token: Option<String>,
    pub bot_api_token: String,
    pub admin_api_key: String,
    pub admin_ids: Vec<i64>,
    pub reconcile_interval: Duration,
    pub provider_timeout: Duration,
    pub provider_request_delay: Duration,
    pub max_dispatch_attempts: i64,
    pub backup_chat_id: Option<i64>,
    pub backup_interval_hours: u32,
    pub webapp_max_age_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://smmshop.db".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            bot_token: None,
            bot_api_token: String::new(),
            admin_api_key: String::new(),
            admin_ids: Vec::new(),
            reconcile_interval: Duration::from_secs(60),
            provider_timeout: Duration::from_secs(30),
            provider_request_delay: Duration::from_millis(1000),
            max_dispatch_attempts: 5,
            backup_chat_id: None,
            backup_interval_hours: 2,
            webapp_max_age_secs: 86_400,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bot_api_token = var("BOT_API_TOKEN").context("BOT_API_TOKEN must be set")?;
        let admin_api_key = var("ADMIN_API_KEY").context("ADMIN_API_KEY must be set")?;

        let bind_addr = match var("BIND_ADDR") {
            Some(raw) => raw.parse().with_context(|| format!("BIND_ADDR `{}` is not host:port", raw))?,
            None => defaults.bind_addr,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr,
            bot_token: var("BOT_TOKEN"),
            bot_api_token,
            admin_api_key,
            admin_ids: parse_id_list(var("ADMIN_IDS").as_deref().unwrap_or(""))?,
            reconcile_interval: var("RECONCILE_INTERVAL_SECS")
                .map(|v| parse_number::<u64>("RECONCILE_INTERVAL_SECS", &v))
                .transpose()?
                .map(|s| Duration::from_secs(s.max(5)))
                .unwrap_or(defaults.reconcile_interval),
            provider_timeout: var("PROVIDER_TIMEOUT_SECS")
                .map(|v| parse_number::<u64>("PROVIDER_TIMEOUT_SECS", &v))
                .transpose()?
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            provider_request_delay: var("PROVIDER_REQUEST_DELAY_MS")
                .map(|v| parse_number::<u64>("PROVIDER_REQUEST_DELAY_MS", &v))
                .transpose()?
                .map(Duration::from_millis)
                .unwrap_or(defaults.provider_request_delay),
            max_dispatch_attempts: var("MAX_DISPATCH_ATTEMPTS")
                .map(|v| parse_number::<i64>("MAX_DISPATCH_ATTEMPTS", &v))
                .transpose()?
                .map(|n| n.max(1))
                .unwrap_or(defaults.max_dispatch_attempts),
            backup_chat_id: var("BACKUP_CHAT_ID")
                .map(|v| parse_number::<i64>("BACKUP_CHAT_ID", &v))
                .transpose()?,
            backup_interval_hours: var("BACKUP_INTERVAL_HOURS")
                .map(|v| parse_number::<u32>("BACKUP_INTERVAL_HOURS", &v))
                .transpose()?
                .map(|h| h.clamp(1, 24))
                .unwrap_or(defaults.backup_interval_hours),
            webapp_max_age_secs: var("WEBAPP_MAX_AGE_SECS")
                .map(|v| parse_number::<i64>("WEBAPP_MAX_AGE_SECS", &v))
                .transpose()?
                .unwrap_or(defaults.webapp_max_age_secs),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| anyhow::anyhow!("{} must be a number, got `{}`", key, raw))
}

/// Comma or whitespace separated telegram ids.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| parse_number::<i64>("ADMIN_IDS", s))
        .collect()
}
