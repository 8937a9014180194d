use crate::services::admin_service::AdminService;
use crate::services::settings_service::SettingsService;
use crate::services::store_service::StoreService;

/// Static bot configuration taken from the environment at startup.
#[derive(Debug, Clone, Default)]
pub struct BotConfig {
    pub required_channel_id: Option<i64>,
    pub webapp_url: Option<String>,
    pub bot_username: String,
}

#[derive(Clone)]
pub struct AppState {
    pub config: BotConfig,
    pub settings: SettingsService,
    pub store_service: StoreService,
    pub admin_service: AdminService,
}
