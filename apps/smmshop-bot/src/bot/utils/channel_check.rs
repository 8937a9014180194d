use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId};

/// Whether the user may use the bot. Without a configured channel everyone
/// passes. Telegram errors count as "not a member" so the gate stays closed.
pub async fn passes_channel_gate(bot: &Bot, channel_id: Option<i64>, user_id: i64) -> bool {
    let Some(channel_id) = channel_id else {
        return true;
    };

    match bot.get_chat_member(ChatId(channel_id), UserId(user_id as u64)).await {
        Ok(member) => {
            let is_member = member.is_present();
            if !is_member {
                tracing::debug!(
                    "User {} is NOT a member of channel {} (status: {:?})",
                    user_id,
                    channel_id,
                    member.kind
                );
            }
            is_member
        }
        Err(e) => {
            tracing::warn!("Failed to check channel membership for user {}: {}", user_id, e);
            false
        }
    }
}
