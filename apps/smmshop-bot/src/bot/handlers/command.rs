use crate::AppState;
use crate::api_client::ApiError;
use crate::bot::keyboards::{
    BTN_INFO, BTN_ORDERS, BTN_RECHARGE, BTN_REFERRAL, BTN_SERVICES, BTN_SUPPORT, channel_keyboard, main_menu,
    payment_methods_keyboard, roots_keyboard, withdraw_keyboard,
};
use crate::bot::prompts::{Prompt, parse_quantity};
use crate::bot::utils::channel_check::passes_channel_gate;
use crate::bot::utils::{money, order_line, start_link, user_card};
use smmshop_shared::WithdrawalKind;
use smmshop_shared::api::{PlaceOrderRequest, ServiceView};
use smmshop_shared::money::parse_amount;
use teloxide::prelude::*;
use teloxide::types::{ForceReply, ParseMode};
use teloxide::utils::html::escape;
use tracing::{error, info};

const DEFAULT_START_MESSAGE: &str =
    "👋 <b>Welcome to the SMM shop!</b>\n\nPick a service, top up your balance and track your orders from the menu below.";

pub async fn message_handler(bot: Bot, msg: Message, state: AppState) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let tg_id = from.id.0 as i64;

    let replied_prompt = msg
        .reply_to_message()
        .filter(|r| r.from.as_ref().is_some_and(|u| u.is_bot))
        .and_then(|r| r.text())
        .and_then(Prompt::parse);
    if let Some(prompt) = replied_prompt {
        return handle_prompt_reply(&bot, &msg, &state, tg_id, prompt, text).await;
    }

    let chat_id = msg.chat.id;
    match text.trim() {
        BTN_SERVICES => return show_categories(&bot, chat_id, &state).await,
        BTN_RECHARGE => return show_payment_methods(&bot, chat_id, &state, tg_id).await,
        BTN_INFO => return show_user_info(&bot, chat_id, &state, tg_id).await,
        BTN_ORDERS => return show_orders(&bot, chat_id, &state, tg_id).await,
        BTN_REFERRAL => return show_referral(&bot, chat_id, &state, tg_id).await,
        BTN_SUPPORT => return show_support(&bot, chat_id, &state).await,
        _ => {}
    }

    let mut parts = text.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or(command);
    let args: Vec<&str> = parts.collect();

    match command {
        "/start" => handle_start(&bot, &msg, &state, args.first().copied()).await,
        "/add" => handle_add(&bot, chat_id, &state, tg_id, &args).await,
        "/id" => handle_id(&bot, chat_id, &state, tg_id, &args).await,
        "/help" | "/menu" => send_start_message(&bot, chat_id, &state).await,
        _ => {
            bot.send_message(chat_id, "Use the menu below 👇")
                .reply_markup(main_menu(state.config.webapp_url.as_deref()))
                .await?;
            Ok(())
        }
    }
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    payload: Option<&str>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let tg_id = from.id.0 as i64;

    let deep_service = payload
        .and_then(|p| p.strip_prefix("service_"))
        .and_then(|id| id.parse::<i64>().ok());
    let referral = if deep_service.is_some() { None } else { payload };

    let full_name = from.full_name();
    let registered = state
        .store_service
        .register_user(tg_id, from.username.as_deref(), Some(full_name.as_str()), referral)
        .await;
    match registered {
        Ok(resp) if resp.is_new => info!("Registered user {} (referrer: {:?})", tg_id, resp.user.referrer_id),
        Ok(_) => {}
        Err(e) => {
            error!("Failed to register user {} on /start: {:#}", tg_id, e);
            return report_error(bot, chat_id, &e).await;
        }
    }

    if !passes_channel_gate(bot, state.config.required_channel_id, tg_id).await {
        return send_channel_gate(bot, chat_id, state).await;
    }

    send_start_message(bot, chat_id, state).await?;

    if let Some(service_id) = deep_service {
        match state.store_service.get_service(service_id).await {
            Ok(service) if service.is_available => send_quantity_prompt(bot, chat_id, &service).await?,
            Ok(_) => {
                bot.send_message(chat_id, "❌ This service is currently unavailable.").await?;
            }
            Err(e) => return report_error(bot, chat_id, &e).await,
        }
    }
    Ok(())
}

async fn handle_prompt_reply(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    tg_id: i64,
    prompt: Prompt,
    text: &str,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;

    match prompt {
        Prompt::Quantity { service_id } => {
            let service = match state.store_service.get_service(service_id).await {
                Ok(s) => s,
                Err(e) => return report_error(bot, chat_id, &e).await,
            };
            let Some(quantity) = parse_quantity(text) else {
                bot.send_message(chat_id, "❌ Please send a whole number.").await?;
                return send_quantity_prompt(bot, chat_id, &service).await;
            };

            match state.store_service.quote(tg_id, service_id, quantity).await {
                Ok(quote) => {
                    let next = Prompt::Link { service_id, quantity };
                    let mut body = format!(
                        "{} × {} = {}\nYour balance: {}\n\nReply with the link or username to promote.",
                        quote.service_name,
                        quote.quantity,
                        money(quote.total_price),
                        money(quote.balance),
                    );
                    if let Some(hint) = quote.link_instructions.as_deref().filter(|h| !h.trim().is_empty()) {
                        body.push_str(&format!("\nℹ️ {}", hint));
                    }
                    bot.send_message(chat_id, next.render(&body))
                        .reply_markup(ForceReply::new())
                        .await?;
                }
                Err(e) => {
                    report_error(bot, chat_id, &e).await?;
                    if ApiError::user_message(&e).is_some() {
                        send_quantity_prompt(bot, chat_id, &service).await?;
                    }
                }
            }
        }

        Prompt::Link { service_id, quantity } => {
            let request = PlaceOrderRequest {
                telegram_id: tg_id,
                service_id,
                quantity,
                link: text.trim().to_string(),
                request_key: format!("{}:{}", chat_id.0, msg.id.0),
            };
            match state.store_service.place_order(&request).await {
                Ok(placed) => {
                    let headline = if placed.created {
                        "✅ <b>Order placed!</b>"
                    } else {
                        "ℹ️ <b>This order was already placed.</b>"
                    };
                    let reply = format!(
                        "{}\n\n{}\n\n💰 Balance: <b>{}</b>",
                        headline,
                        order_line(&placed.order),
                        money(placed.balance)
                    );
                    bot.send_message(chat_id, reply)
                        .parse_mode(ParseMode::Html)
                        .reply_markup(main_menu(state.config.webapp_url.as_deref()))
                        .await?;
                }
                Err(e) => {
                    error!("Order from {} for service {} failed: {:#}", tg_id, service_id, e);
                    report_error(bot, chat_id, &e).await?;
                }
            }
        }

        Prompt::WithdrawAmount => match parse_amount(text) {
            Ok(amount) => {
                let next = Prompt::WithdrawInfo { amount };
                bot.send_message(
                    chat_id,
                    next.render("Reply with your payment details (wallet, card or account)."),
                )
                .reply_markup(ForceReply::new())
                .await?;
            }
            Err(e) => {
                bot.send_message(chat_id, format!("❌ {}", e)).await?;
                send_withdraw_prompt(bot, chat_id, state, tg_id).await?;
            }
        },

        Prompt::WithdrawInfo { amount } => {
            let info = text.trim();
            if info.is_empty() {
                bot.send_message(chat_id, "❌ Payment details cannot be empty.").await?;
                return Ok(());
            }
            match state
                .store_service
                .request_withdrawal(tg_id, amount, WithdrawalKind::Referral, info)
                .await
            {
                Ok(w) => {
                    bot.send_message(
                        chat_id,
                        format!(
                            "✅ Withdrawal request <b>#{}</b> for <b>{}</b> submitted. You will be notified once it is processed.",
                            w.id,
                            money(w.amount)
                        ),
                    )
                    .parse_mode(ParseMode::Html)
                    .await?;
                }
                Err(e) => report_error(bot, chat_id, &e).await?,
            }
        }
    }
    Ok(())
}

async fn handle_add(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    tg_id: i64,
    args: &[&str],
) -> Result<(), teloxide::RequestError> {
    if !state.admin_service.is_admin(tg_id).await {
        bot.send_message(chat_id, "⛔ Admins only.").await?;
        return Ok(());
    }
    let parsed = match args {
        [target, amount] => target.parse::<i64>().ok().zip(parse_amount(amount).ok()),
        _ => None,
    };
    let Some((target, amount)) = parsed else {
        bot.send_message(chat_id, "Usage: /add <telegram_id> <amount>").await?;
        return Ok(());
    };

    match state.admin_service.credit(tg_id, target, amount).await {
        Ok(change) => {
            info!("Admin {} added {} cents to {}", tg_id, amount, target);
            bot.send_message(
                chat_id,
                format!(
                    "✅ Added {} to <code>{}</code>. New balance: <b>{}</b>",
                    money(amount),
                    change.telegram_id,
                    money(change.balance)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            Ok(())
        }
        Err(e) => report_error(bot, chat_id, &e).await,
    }
}

async fn handle_id(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    tg_id: i64,
    args: &[&str],
) -> Result<(), teloxide::RequestError> {
    if !state.admin_service.is_admin(tg_id).await {
        bot.send_message(chat_id, "⛔ Admins only.").await?;
        return Ok(());
    }
    let Some(target) = args.first().and_then(|a| a.parse::<i64>().ok()) else {
        bot.send_message(chat_id, "Usage: /id <telegram_id>").await?;
        return Ok(());
    };

    match state.store_service.get_user(target).await {
        Ok(user) => {
            let mut text = user_card(&user);
            text.push_str(&format!("\n🔗 Code: <code>{}</code>", escape(&user.referral_code)));
            if user.is_admin {
                text.push_str("\n⭐ Admin");
            }
            bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?;
            Ok(())
        }
        Err(e) => report_error(bot, chat_id, &e).await,
    }
}

pub(crate) async fn show_categories(bot: &Bot, chat_id: ChatId, state: &AppState) -> Result<(), teloxide::RequestError> {
    match state.store_service.root_categories().await {
        Ok(roots) if roots.is_empty() => {
            bot.send_message(chat_id, "No services available yet.").await?;
        }
        Ok(roots) => {
            bot.send_message(chat_id, "🛒 <b>Choose a category</b>")
                .parse_mode(ParseMode::Html)
                .reply_markup(roots_keyboard(&roots))
                .await?;
        }
        Err(e) => report_error(bot, chat_id, &e).await?,
    }
    Ok(())
}

async fn show_payment_methods(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    tg_id: i64,
) -> Result<(), teloxide::RequestError> {
    let methods = match state.store_service.payment_methods().await {
        Ok(m) => m,
        Err(e) => return report_error(bot, chat_id, &e).await,
    };
    if methods.is_empty() {
        bot.send_message(chat_id, "💰 Top-ups are not available right now. Please contact support.")
            .await?;
        return Ok(());
    }

    let mut text = format!(
        "💰 <b>Recharge your balance</b>\n\nPay with one of the methods below and send the receipt to the operator together with your ID <code>{}</code>.",
        tg_id
    );
    for m in &methods {
        text.push_str(&format!("\n\n<b>{}</b>", escape(&m.name)));
        if let Some(desc) = m.description.as_deref().filter(|d| !d.is_empty()) {
            text.push_str(&format!("\n{}", escape(desc)));
        }
        if let Some(instructions) = m.instructions.as_deref().filter(|d| !d.is_empty()) {
            text.push_str(&format!("\n<i>{}</i>", escape(instructions)));
        }
    }

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(payment_methods_keyboard(&methods))
        .await?;
    Ok(())
}

async fn show_user_info(bot: &Bot, chat_id: ChatId, state: &AppState, tg_id: i64) -> Result<(), teloxide::RequestError> {
    match state.store_service.get_user(tg_id).await {
        Ok(user) => {
            bot.send_message(chat_id, user_card(&user)).parse_mode(ParseMode::Html).await?;
            Ok(())
        }
        Err(e) => report_error(bot, chat_id, &e).await,
    }
}

async fn show_orders(bot: &Bot, chat_id: ChatId, state: &AppState, tg_id: i64) -> Result<(), teloxide::RequestError> {
    let orders = match state.store_service.user_orders(tg_id, 10).await {
        Ok(o) => o,
        Err(e) => return report_error(bot, chat_id, &e).await,
    };
    if orders.is_empty() {
        bot.send_message(chat_id, "📦 You have no orders yet.").await?;
        return Ok(());
    }

    let lines: Vec<String> = orders.iter().map(order_line).collect();
    bot.send_message(chat_id, format!("📦 <b>Your latest orders</b>\n\n{}", lines.join("\n")))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn show_referral(bot: &Bot, chat_id: ChatId, state: &AppState, tg_id: i64) -> Result<(), teloxide::RequestError> {
    let summary = match state.store_service.referral_summary(tg_id).await {
        Ok(s) => s,
        Err(e) => return report_error(bot, chat_id, &e).await,
    };

    let mut text = format!(
        "🎁 <b>Referral program</b>\n\nYour link:\n{}\n\n👥 Invited: <b>{}</b>\n💵 Earned: <b>{}</b>\n🎁 Referral balance: <b>{}</b>\n\nYou get {} for every user who joins with your link.",
        escape(&start_link(&state.config.bot_username, &summary.referral_code)),
        summary.referred_users_count,
        money(summary.total_earned),
        money(summary.referral_balance),
        money(summary.bonus_per_referral),
    );
    if summary.count_for_bonus > 0 {
        text.push_str(&format!(
            "\nInvite {} more to reach the next milestone.",
            summary.referrals_to_next_bonus
        ));
    }
    if summary.min_withdrawal > 0 {
        text.push_str(&format!("\nMinimum withdrawal: {}", money(summary.min_withdrawal)));
    }

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(withdraw_keyboard())
        .await?;
    Ok(())
}

async fn show_support(bot: &Bot, chat_id: ChatId, state: &AppState) -> Result<(), teloxide::RequestError> {
    let text = match state.settings.get("support_url").await {
        Some(url) => format!("❓ Need help? Contact support: {}", url),
        None => "❓ Support contact is not configured yet.".to_string(),
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

pub(crate) async fn send_start_message(bot: &Bot, chat_id: ChatId, state: &AppState) -> Result<(), teloxide::RequestError> {
    let text = state.settings.get_or_default("start_message", DEFAULT_START_MESSAGE).await;
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(main_menu(state.config.webapp_url.as_deref()))
        .await?;
    Ok(())
}

pub(crate) async fn send_channel_gate(bot: &Bot, chat_id: ChatId, state: &AppState) -> Result<(), teloxide::RequestError> {
    let link = state.settings.get("required_channel_link").await;
    bot.send_message(
        chat_id,
        "📢 Please join our channel to use the bot, then press the button below.",
    )
    .reply_markup(channel_keyboard(link.as_deref()))
    .await?;
    Ok(())
}

pub(crate) async fn send_quantity_prompt(
    bot: &Bot,
    chat_id: ChatId,
    service: &ServiceView,
) -> Result<(), teloxide::RequestError> {
    let prompt = Prompt::Quantity { service_id: service.id };
    let body = format!(
        "{}\nPrice: {} per {}\n\nReply with a quantity from {} to {}.",
        service.name,
        money(service.base_price),
        service.base_quantity,
        service.min_quantity,
        service.max_quantity
    );
    bot.send_message(chat_id, prompt.render(&body))
        .reply_markup(ForceReply::new())
        .await?;
    Ok(())
}

pub(crate) async fn send_withdraw_prompt(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    tg_id: i64,
) -> Result<(), teloxide::RequestError> {
    let summary = match state.store_service.referral_summary(tg_id).await {
        Ok(s) => s,
        Err(e) => return report_error(bot, chat_id, &e).await,
    };
    if summary.referral_balance <= 0 || summary.referral_balance < summary.min_withdrawal {
        bot.send_message(
            chat_id,
            format!(
                "❌ Your referral balance is {}. The minimum withdrawal is {}.",
                money(summary.referral_balance),
                money(summary.min_withdrawal)
            ),
        )
        .await?;
        return Ok(());
    }

    let body = format!(
        "Available: {}\nMinimum: {}\n\nReply with the amount to withdraw.",
        money(summary.referral_balance),
        money(summary.min_withdrawal)
    );
    bot.send_message(chat_id, Prompt::WithdrawAmount.render(&body))
        .reply_markup(ForceReply::new())
        .await?;
    Ok(())
}

/// Shows the panel's message for client errors, a generic apology otherwise.
pub(crate) async fn report_error(bot: &Bot, chat_id: ChatId, err: &anyhow::Error) -> Result<(), teloxide::RequestError> {
    let text = match ApiError::user_message(err) {
        Some(message) => format!("❌ {}", message),
        None => {
            error!("Panel request failed: {:#}", err);
            "⚠️ Something went wrong. Please try again later.".to_string()
        }
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}
