use crate::AppState;
use crate::bot::handlers::command::{
    report_error, send_channel_gate, send_quantity_prompt, send_start_message, send_withdraw_prompt,
};
use crate::bot::keyboards::{CallbackAction, category_keyboard, price_label, roots_keyboard, service_keyboard};
use crate::bot::utils::channel_check::passes_channel_gate;
use smmshop_shared::api::ServiceView;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardMarkup, MaybeInaccessibleMessage, ParseMode};
use teloxide::utils::html::escape;
use tracing::{debug, warn};

pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: AppState) -> Result<(), teloxide::RequestError> {
    let tg_id = q.from.id.0 as i64;
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        debug!("Ignoring callback {:?}", q.data);
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let chat_id = message.chat().id;

    match action {
        CallbackAction::Roots => {
            bot.answer_callback_query(q.id.clone()).await?;
            match state.store_service.root_categories().await {
                Ok(roots) => {
                    edit_menu(&bot, message, "🛒 <b>Choose a category</b>".to_string(), roots_keyboard(&roots)).await
                }
                Err(e) => report_error(&bot, chat_id, &e).await?,
            }
        }

        CallbackAction::Category(id) => {
            bot.answer_callback_query(q.id.clone()).await?;
            match state.store_service.category_page(id).await {
                Ok(page) => {
                    let mut text = format!("📁 <b>{}</b>", escape(&page.category.name));
                    if page.subcategories.is_empty() && page.services.is_empty() {
                        text.push_str("\n\nNothing here yet.");
                    }
                    edit_menu(&bot, message, text, category_keyboard(&page)).await
                }
                Err(e) => report_error(&bot, chat_id, &e).await?,
            }
        }

        CallbackAction::Service(id) => {
            bot.answer_callback_query(q.id.clone()).await?;
            match state.store_service.get_service(id).await {
                Ok(service) => edit_menu(&bot, message, service_text(&service), service_keyboard(&service)).await,
                Err(e) => report_error(&bot, chat_id, &e).await?,
            }
        }

        CallbackAction::Buy(id) => {
            if !passes_channel_gate(&bot, state.config.required_channel_id, tg_id).await {
                bot.answer_callback_query(q.id.clone()).await?;
                return send_channel_gate(&bot, chat_id, &state).await;
            }
            match state.store_service.get_service(id).await {
                Ok(service) if service.is_available => {
                    bot.answer_callback_query(q.id.clone()).await?;
                    send_quantity_prompt(&bot, chat_id, &service).await?;
                }
                Ok(_) => {
                    bot.answer_callback_query(q.id.clone())
                        .text("❌ This service is currently unavailable.")
                        .show_alert(true)
                        .await?;
                }
                Err(e) => {
                    bot.answer_callback_query(q.id.clone()).await?;
                    report_error(&bot, chat_id, &e).await?;
                }
            }
        }

        CallbackAction::Withdraw => {
            bot.answer_callback_query(q.id.clone()).await?;
            send_withdraw_prompt(&bot, chat_id, &state, tg_id).await?;
        }

        CallbackAction::CheckChannel => {
            if passes_channel_gate(&bot, state.config.required_channel_id, tg_id).await {
                bot.answer_callback_query(q.id.clone()).text("✅ Thanks for joining!").await?;
                if let Err(e) = bot.delete_message(chat_id, message.id()).await {
                    debug!("Could not delete channel gate message: {}", e);
                }
                send_start_message(&bot, chat_id, &state).await?;
            } else {
                bot.answer_callback_query(q.id.clone())
                    .text("You have not joined the channel yet.")
                    .show_alert(true)
                    .await?;
            }
        }
    }

    Ok(())
}

fn service_text(service: &ServiceView) -> String {
    let mut text = format!("🛍 <b>{}</b>\n\n💵 {}", escape(&service.name), price_label(service));
    text.push_str(&format!(
        "\n📊 Quantity: {} - {}",
        service.min_quantity, service.max_quantity
    ));
    if let Some(desc) = service.description.as_deref().filter(|d| !d.trim().is_empty()) {
        text.push_str(&format!("\n\n{}", escape(desc)));
    }
    if !service.is_available {
        text.push_str("\n\n❌ Currently unavailable");
    }
    text
}

/// Replaces the inline menu in place. Telegram refuses edits that change
/// nothing, which is harmless here.
async fn edit_menu(bot: &Bot, message: &MaybeInaccessibleMessage, text: String, keyboard: InlineKeyboardMarkup) {
    if let Err(e) = bot
        .edit_message_text(message.chat().id, message.id(), text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await
    {
        warn!("Failed to edit menu message: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_text_shows_bounds_and_availability() {
        let service = ServiceView {
            id: 1,
            name: "Views & Likes".into(),
            description: Some("Fast start".into()),
            base_price: 90,
            base_quantity: 1000,
            min_quantity: 50,
            max_quantity: 20_000,
            is_available: false,
            category_id: Some(2),
            link_instructions: None,
        };
        let text = service_text(&service);
        assert!(text.contains("Views &amp; Likes"));
        assert!(text.contains("$0.90 / 1000"));
        assert!(text.contains("50 - 20000"));
        assert!(text.contains("Currently unavailable"));
    }
}
