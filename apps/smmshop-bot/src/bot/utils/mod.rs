pub mod channel_check;

use smmshop_shared::api::{OrderView, UserView};
use smmshop_shared::money::format_cents;
use teloxide::utils::html::escape;

pub fn money(cents: i64) -> String {
    format!("${}", format_cents(cents))
}

/// `https://t.me/<bot>?start=<payload>` deep link.
pub fn start_link(bot_username: &str, payload: &str) -> String {
    format!("https://t.me/{}?start={}", bot_username, payload)
}

pub fn user_card(user: &UserView) -> String {
    let name = user.full_name.as_deref().unwrap_or("-");
    let username = user
        .username
        .as_deref()
        .map(|u| format!("@{}", u))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "👤 <b>{}</b> ({})\n🆔 <code>{}</code>\n💰 Balance: <b>{}</b>\n🎁 Referral balance: <b>{}</b>\n👥 Referrals: {}\n📅 Since {}",
        escape(name),
        escape(&username),
        user.telegram_id,
        money(user.balance),
        money(user.referral_balance),
        user.referred_users_count,
        user.registered_at.format("%Y-%m-%d"),
    )
}

pub fn order_line(order: &OrderView) -> String {
    let mut line = format!(
        "{} <b>#{}</b> {} × {} · {} · {}",
        order.status.emoji(),
        order.id,
        escape(order.service_name.as_deref().unwrap_or("Service")),
        order.quantity,
        money(order.total_price),
        order.status,
    );
    if order.refunded_amount > 0 {
        line.push_str(&format!(" (refunded {})", money(order.refunded_amount)));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use smmshop_shared::OrderStatus;

    #[test]
    fn order_line_escapes_and_mentions_refund() {
        let order = OrderView {
            id: 17,
            user_id: 1,
            service_id: 2,
            service_name: Some("Likes <fast>".into()),
            quantity: 500,
            link_or_id: "https://x".into(),
            total_price: 125,
            status: OrderStatus::Partial,
            provider_order_id: None,
            refunded_amount: 50,
            ordered_at: Utc::now(),
        };
        let line = order_line(&order);
        assert!(line.contains("Likes &lt;fast&gt;"));
        assert!(line.contains("$1.25"));
        assert!(line.contains("refunded $0.50"));
    }

    #[test]
    fn deep_links() {
        assert_eq!(start_link("smm_bot", "ABCD1234"), "https://t.me/smm_bot?start=ABCD1234");
    }
}
