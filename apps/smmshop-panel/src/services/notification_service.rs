use anyhow::Result;
use async_trait::async_trait;
use smmshop_db::models::finance::Withdrawal;
use smmshop_db::models::order::Order;
use smmshop_db::models::user::User;
use smmshop_db::repositories::user_repo::UserRepository;
use smmshop_shared::money::format_cents;
use smmshop_shared::{OrderStatus, WithdrawalKind, WithdrawalStatus};
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tracing::{info, warn};

use crate::utils::escape_html;

/// Outbound message transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_html(&self, chat_id: i64, text: &str) -> Result<()>;
    async fn send_document(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_html(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        self.bot
            .send_document(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .caption(caption)
            .await?;
        Ok(())
    }
}

/// Used when no bot token is configured, messages are only logged.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_html(&self, chat_id: i64, _text: &str) -> Result<()> {
        info!("Notification to {} dropped, no bot configured", chat_id);
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, path: &Path, _caption: &str) -> Result<()> {
        info!("Document {} for {} dropped, no bot configured", path.display(), chat_id);
        Ok(())
    }
}

/// Shop events turned into Telegram messages. Delivery failures are logged
/// and never propagated into the operation that caused them.
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    user_repo: UserRepository,
    admin_ids: Vec<i64>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, user_repo: UserRepository, admin_ids: Vec<i64>) -> Self {
        Self {
            notifier,
            user_repo,
            admin_ids,
        }
    }

    /// Configured admins plus users flagged as admin in the database.
    async fn admin_recipients(&self) -> Vec<i64> {
        let mut ids = self.admin_ids.clone();
        match self.user_repo.admin_ids().await {
            Ok(db_ids) => ids.extend(db_ids),
            Err(e) => warn!("Failed to load admin ids: {}", e),
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub async fn notify_user(&self, telegram_id: i64, text: &str) -> bool {
        match self.notifier.send_html(telegram_id, text).await {
            Ok(_) => {
                info!("✓ Notified user {}", telegram_id);
                true
            }
            Err(e) => {
                warn!("✗ Failed to notify user {}: {}", telegram_id, e);
                false
            }
        }
    }

    pub async fn notify_admins(&self, text: &str) -> usize {
        let recipients = self.admin_recipients().await;
        let mut sent = 0;
        for id in &recipients {
            match self.notifier.send_html(*id, text).await {
                Ok(_) => {
                    sent += 1;
                    info!("✓ Notified admin {}", id);
                }
                Err(e) => warn!("✗ Failed to notify admin {}: {}", id, e),
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        sent
    }

    /// Admin-initiated message to one user. Unlike event notifications the
    /// caller wants to know whether it went through.
    pub async fn direct_message(&self, telegram_id: i64, text: &str) -> Result<()> {
        self.notifier
            .send_html(telegram_id, &format!("📩 <b>Message from support</b>\n\n{}", escape_html(text)))
            .await
    }

    pub async fn send_document(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        self.notifier.send_document(chat_id, path, caption).await
    }

    pub async fn new_order(&self, order: &Order, buyer: Option<&User>) {
        self.notify_admins(&format_new_order(order, buyer)).await;
    }

    pub async fn order_status(&self, order: &Order, refunded: i64) {
        self.notify_user(order.user_id, &format_order_status(order, refunded)).await;
    }

    pub async fn withdrawal_requested(&self, withdrawal: &Withdrawal, user: Option<&User>) {
        self.notify_admins(&format_withdrawal_request(withdrawal, user)).await;
    }

    pub async fn withdrawal_status(&self, withdrawal: &Withdrawal) {
        self.notify_user(withdrawal.user_id, &format_withdrawal_status(withdrawal)).await;
    }

    pub async fn balance_changed(&self, user: &User) {
        let text = format!(
            "💰 <b>Your balance was updated</b>\n\nBalance: <b>${}</b>\nReferral balance: <b>${}</b>",
            format_cents(user.balance),
            format_cents(user.referral_balance)
        );
        self.notify_user(user.telegram_id, &text).await;
    }

    pub async fn referral_bonus(&self, referrer_id: i64, bonus: i64, referral_balance: i64) {
        let text = format!(
            "🎉 <b>New referral!</b>\n\nSomeone joined through your link. \
             <b>${}</b> was added to your referral balance.\nReferral balance: <b>${}</b>",
            format_cents(bonus),
            format_cents(referral_balance)
        );
        self.notify_user(referrer_id, &text).await;
    }
}

pub fn format_new_order(order: &Order, buyer: Option<&User>) -> String {
    let who = buyer
        .map(|u| escape_html(&u.display_name()))
        .unwrap_or_else(|| order.user_id.to_string());
    format!(
        "🛒 <b>New order #{}</b>\n\n\
         User: {} (<code>{}</code>)\n\
         Service: {}\n\
         Quantity: {}\n\
         Link: {}\n\
         Total: <b>${}</b>",
        order.id,
        who,
        order.user_id,
        escape_html(order.service_name.as_deref().unwrap_or("?")),
        order.quantity,
        escape_html(&order.link_or_id),
        format_cents(order.total_price)
    )
}

pub fn format_order_status(order: &Order, refunded: i64) -> String {
    let headline = match order.status {
        OrderStatus::Pending => "is waiting to be processed",
        OrderStatus::Processing => "is being processed",
        OrderStatus::Completed => "has been completed",
        OrderStatus::Partial => "was partially completed",
        OrderStatus::Canceled => "has been canceled",
    };
    let mut text = format!(
        "{} <b>Order #{}</b> {}\n\nService: {}\nQuantity: {}",
        order.status.emoji(),
        order.id,
        headline,
        escape_html(order.service_name.as_deref().unwrap_or("?")),
        order.quantity
    );
    if refunded > 0 {
        text.push_str(&format!("\n\n💸 <b>${}</b> was returned to your balance.", format_cents(refunded)));
    }
    text
}

pub fn format_withdrawal_request(w: &Withdrawal, user: Option<&User>) -> String {
    let who = user
        .map(|u| escape_html(&u.display_name()))
        .unwrap_or_else(|| w.user_id.to_string());
    let kind = match w.withdrawal_type {
        WithdrawalKind::Referral => "referral",
        WithdrawalKind::Main => "main",
    };
    format!(
        "💸 <b>Withdrawal request #{}</b>\n\n\
         User: {} (<code>{}</code>)\n\
         Amount: <b>${}</b> from the {} balance\n\
         Payment details: <code>{}</code>",
        w.id,
        who,
        w.user_id,
        format_cents(w.amount),
        kind,
        escape_html(&w.payment_method_info)
    )
}

pub fn format_withdrawal_status(w: &Withdrawal) -> String {
    match w.status {
        WithdrawalStatus::Approved => format!(
            "✅ Your withdrawal request #{} for <b>${}</b> was approved.",
            w.id,
            format_cents(w.amount)
        ),
        WithdrawalStatus::Rejected => format!(
            "❌ Your withdrawal request #{} for <b>${}</b> was rejected. The amount was returned to your balance.",
            w.id,
            format_cents(w.amount)
        ),
        WithdrawalStatus::Pending => format!("⏳ Your withdrawal request #{} is pending.", w.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: 12,
            user_id: 777,
            service_id: 3,
            service_name: Some("Likes <fast>".to_string()),
            quantity: 500,
            link_or_id: "https://x.com/a?b=1&c=2".to_string(),
            total_price: 1250,
            status,
            provider_id: None,
            provider_order_id: None,
            params: None,
            request_key: None,
            refunded_amount: 0,
            dispatch_attempts: 0,
            last_error: None,
            ordered_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn new_order_message_is_escaped() {
        let text = format_new_order(&order(OrderStatus::Pending), None);
        assert!(text.contains("New order #12"));
        assert!(text.contains("Likes &lt;fast&gt;"));
        assert!(text.contains("b=1&amp;c=2"));
        assert!(text.contains("$12.50"));
    }

    #[test]
    fn status_message_mentions_refund() {
        let text = format_order_status(&order(OrderStatus::Canceled), 1250);
        assert!(text.contains("has been canceled"));
        assert!(text.contains("$12.50</b> was returned"));

        let text = format_order_status(&order(OrderStatus::Completed), 0);
        assert!(!text.contains("returned"));
    }
}
