use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use teloxide::prelude::*;

mod api_client;
mod bot;
mod services;
mod state;

use crate::api_client::ApiClient;
use crate::services::admin_service::AdminService;
use crate::services::settings_service::SettingsService;
use crate::services::store_service::StoreService;
use crate::state::{AppState, BotConfig};

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting SMM Shop bot...");

    let token = non_empty_var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
    let panel_url = non_empty_var("PANEL_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
    let panel_token = non_empty_var("PANEL_TOKEN").unwrap_or_default();

    let required_channel_id = match non_empty_var("REQUIRED_CHANNEL_ID") {
        Some(raw) => Some(
            raw.parse::<i64>()
                .with_context(|| format!("REQUIRED_CHANNEL_ID `{}` is not a chat id", raw))?,
        ),
        None => None,
    };

    let api_client = ApiClient::new(panel_url, panel_token)?;
    if !api_client.has_token() {
        log::warn!("PANEL_TOKEN is empty, the panel will reject bot requests");
    }

    let state = AppState {
        config: BotConfig {
            required_channel_id,
            webapp_url: non_empty_var("WEBAPP_URL"),
            bot_username: String::new(),
        },
        settings: SettingsService::new(api_client.clone()),
        store_service: StoreService::new(api_client.clone()),
        admin_service: AdminService::new(api_client),
    };

    let bot = Bot::new(token);

    let (tx, rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });

    bot::run_bot(bot, rx, state).await;
    Ok(())
}
