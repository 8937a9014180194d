use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{error, info};

use crate::services::notification_service::NotificationService;

/// Periodic database snapshots delivered to a Telegram chat.
#[derive(Clone)]
pub struct BackupService {
    pool: SqlitePool,
    notifications: NotificationService,
    chat_id: Option<i64>,
    every_hours: u32,
}

impl BackupService {
    pub fn new(pool: SqlitePool, notifications: NotificationService, chat_id: Option<i64>, every_hours: u32) -> Self {
        Self {
            pool,
            notifications,
            chat_id,
            every_hours: every_hours.clamp(1, 24),
        }
    }

    /// Writes a consistent copy of the database to `path`, which must not exist.
    pub async fn snapshot_to(&self, path: &Path) -> Result<()> {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        let target = path.to_str().context("Backup path is not valid UTF-8")?;
        sqlx::query("VACUUM INTO ?")
            .bind(target)
            .execute(&self.pool)
            .await
            .context("Failed to snapshot database")?;
        Ok(())
    }

    /// Snapshots into the temp dir, uploads, then removes the file.
    pub async fn send_backup(&self, chat_id: i64) -> Result<()> {
        let now = Utc::now();
        let path = temp_backup_path(now);
        self.snapshot_to(&path).await?;

        let caption = format!("Database backup {}", now.format("%Y-%m-%d %H:%M UTC"));
        let sent = self.notifications.send_document(chat_id, &path, &caption).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            error!("Failed to remove temporary backup {}: {}", path.display(), e);
        }
        sent.context("Failed to deliver backup")?;

        info!("Backup sent to chat {}", chat_id);
        Ok(())
    }

    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        let Some(chat_id) = self.chat_id else {
            info!("BACKUP_CHAT_ID not set, backups disabled");
            return;
        };
        info!("Starting backup scheduler, every {}h", self.every_hours);

        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.every_hours);
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = sleep(wait) => {
                    if let Err(e) = self.send_backup(chat_id).await {
                        error!("Scheduled backup failed: {:#}", e);
                    }
                }
                _ = shutdown.recv() => {
                    info!("Backup scheduler stopping");
                    break;
                }
            }
        }
    }
}

fn temp_backup_path(now: DateTime<Utc>) -> PathBuf {
    std::env::temp_dir().join(format!("smmshop_{}.db", now.format("%Y%m%d_%H%M%S")))
}

/// Next wall-clock slot that is a multiple of `hours` since midnight UTC.
/// Slots restart at midnight when `hours` does not divide the day.
pub fn next_run_after(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    let step = i64::from(hours.clamp(1, 24)) * 3600;
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let elapsed = (now - midnight).num_seconds();
    let candidate = midnight + ChronoDuration::seconds((elapsed / step + 1) * step);
    candidate.min(midnight + ChronoDuration::days(1))
}
