//! Conversation steps carried in the text of ForceReply prompts.
//!
//! The bot keeps no per-chat session. Every question it asks starts with a
//! header line that names the step and its arguments, and the user's reply
//! points back at that message through `reply_to_message`. Parsing the
//! header of the replied-to message restores where the conversation was.

use smmshop_shared::money::{format_cents, parse_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Quantity { service_id: i64 },
    Link { service_id: i64, quantity: i64 },
    WithdrawAmount,
    WithdrawInfo { amount: i64 },
}

const QUANTITY: &str = "🔢 Quantity for service #";
const LINK: &str = "🔗 Link for service #";
const WITHDRAW_AMOUNT: &str = "💸 Withdrawal amount";
const WITHDRAW_INFO: &str = "💳 Payment details for withdrawal of $";

impl Prompt {
    /// First line of the prompt message. Must stay parseable by [`Prompt::parse`].
    pub fn header(&self) -> String {
        match self {
            Prompt::Quantity { service_id } => format!("{}{}", QUANTITY, service_id),
            Prompt::Link { service_id, quantity } => format!("{}{}, quantity {}", LINK, service_id, quantity),
            Prompt::WithdrawAmount => WITHDRAW_AMOUNT.to_string(),
            Prompt::WithdrawInfo { amount } => format!("{}{}", WITHDRAW_INFO, format_cents(*amount)),
        }
    }

    /// Full prompt text: the header followed by free-form instructions.
    pub fn render(&self, body: &str) -> String {
        if body.is_empty() {
            self.header()
        } else {
            format!("{}\n\n{}", self.header(), body)
        }
    }

    pub fn parse(text: &str) -> Option<Prompt> {
        let header = text.lines().next()?.trim();

        if let Some(rest) = header.strip_prefix(QUANTITY) {
            return Some(Prompt::Quantity {
                service_id: rest.trim().parse().ok()?,
            });
        }
        if let Some(rest) = header.strip_prefix(LINK) {
            let (id, quantity) = rest.split_once(", quantity ")?;
            return Some(Prompt::Link {
                service_id: id.trim().parse().ok()?,
                quantity: quantity.trim().parse().ok()?,
            });
        }
        if header == WITHDRAW_AMOUNT {
            return Some(Prompt::WithdrawAmount);
        }
        if let Some(rest) = header.strip_prefix(WITHDRAW_INFO) {
            return Some(Prompt::WithdrawInfo {
                amount: parse_amount(rest).ok()?,
            });
        }
        None
    }
}

/// Parses a quantity typed by the user, tolerating spaces and thousands separators.
pub fn parse_quantity(input: &str) -> Option<i64> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_' && *c != '.')
        .collect();
    digits.parse::<i64>().ok().filter(|q| *q > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prompt_parses_back_from_its_text() {
        let prompts = [
            Prompt::Quantity { service_id: 42 },
            Prompt::Link {
                service_id: 7,
                quantity: 1500,
            },
            Prompt::WithdrawAmount,
            Prompt::WithdrawInfo { amount: 1250 },
        ];
        for prompt in prompts {
            let text = prompt.render("Reply to this message.\nMin 100, max 10000.");
            assert_eq!(Prompt::parse(&text), Some(prompt), "{}", text);
        }
    }

    #[test]
    fn ordinary_messages_are_not_prompts() {
        assert_eq!(Prompt::parse("Hello there"), None);
        assert_eq!(Prompt::parse(""), None);
        assert_eq!(Prompt::parse("🔢 Quantity for service #abc"), None);
        assert_eq!(Prompt::parse("🔗 Link for service #3"), None);
    }

    #[test]
    fn body_lines_do_not_affect_parsing() {
        let text = "💸 Withdrawal amount\n\n🔢 Quantity for service #1";
        assert_eq!(Prompt::parse(text), Some(Prompt::WithdrawAmount));
    }

    #[test]
    fn quantity_input_is_forgiving() {
        assert_eq!(parse_quantity("1000"), Some(1000));
        assert_eq!(parse_quantity(" 10 000 "), Some(10_000));
        assert_eq!(parse_quantity("2,500"), Some(2500));
        assert_eq!(parse_quantity("0"), None);
        assert_eq!(parse_quantity("-5"), None);
        assert_eq!(parse_quantity("lots"), None);
    }
}
