use anyhow::{Context, Result};
use smmshop_panel::AppState;
use smmshop_panel::config::Config;
use std::env;
use std::fs;
use std::path::Path;

pub async fn grant_admin(state: &AppState, telegram_id: i64, revoke: bool) -> Result<()> {
    state
        .user_service
        .grant_admin(telegram_id, !revoke)
        .await
        .with_context(|| format!("User {} must /start the bot first", telegram_id))?;
    if revoke {
        println!("Admin rights revoked from {}.", telegram_id);
    } else {
        println!("User {} is now an admin.", telegram_id);
    }
    Ok(())
}

pub async fn print_info(state: &AppState, config: &Config) -> Result<()> {
    let stats = state.order_service.stats().await?;
    let providers = state.provider_service.list_providers().await?;

    println!("\n=== SMM SHOP INFO ===");
    println!("Database:        {}", config.database_url);
    println!("Listen address:  {}", config.bind_addr);
    println!("Bot token:       {}", if config.bot_token.is_some() { "set" } else { "not set" });
    println!("Admin ids:       {:?}", config.admin_ids);
    println!("Users:           {}", stats.total_users);
    println!("Services:        {}", stats.total_services);
    println!("Orders:          {} ({} pending, {} processing)", stats.total_orders, stats.total_pending_orders, stats.total_processing_orders);
    println!("Providers:       {} ({} active)", providers.len(), providers.iter().filter(|p| p.is_active).count());
    println!("=====================\n");
    Ok(())
}

pub async fn backup_to(state: &AppState, path: &Path) -> Result<()> {
    state.backup_service.snapshot_to(path).await?;
    println!("Database snapshot written to {}", path.display());
    Ok(())
}

pub fn install_service() -> Result<()> {
    let exe_path = env::current_exe()?;
    let exe_name = exe_path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Executable name is not valid UTF-8")?
        .to_string();
    let working_dir = env::current_dir()?;

    let service_content = format!(
        r#"[Unit]
Description=SMM Shop panel
After=network.target

[Service]
Type=simple
User=root
WorkingDirectory={}
ExecStart={} serve
Restart=always
EnvironmentFile={}/.env

[Install]
WantedBy=multi-user.target
"#,
        working_dir.display(),
        exe_path.display(),
        working_dir.display()
    );

    let service_path = format!("/etc/systemd/system/{}.service", exe_name);

    if unsafe { libc::getuid() } != 0 {
        return Err(anyhow::anyhow!(
            "This command must be run as root (sudo) to install systemd service."
        ));
    }

    fs::write(&service_path, service_content)
        .with_context(|| format!("Failed to write service file to {}", service_path))?;

    println!("Systemd service created at {}", service_path);
    println!("You can now start the service using:");
    println!("  systemctl daemon-reload");
    println!("  systemctl enable --now {}", exe_name);

    Ok(())
}
