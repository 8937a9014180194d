use reqwest::Url;
use smmshop_shared::api::{CategoryPage, CategoryView, PaymentMethodView, ServiceView};
use smmshop_shared::money::format_cents;
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, WebAppInfo,
};

pub const BTN_SERVICES: &str = "🛒 Services";
pub const BTN_RECHARGE: &str = "💰 Recharge";
pub const BTN_INFO: &str = "👤 My Info";
pub const BTN_ORDERS: &str = "📦 My Orders";
pub const BTN_REFERRAL: &str = "🎁 Referral";
pub const BTN_SUPPORT: &str = "❓ Support";
pub const BTN_WEBAPP: &str = "🌐 Open Shop";

/// Inline button payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Roots,
    Category(i64),
    Service(i64),
    Buy(i64),
    Withdraw,
    CheckChannel,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Roots => "cats".to_string(),
            CallbackAction::Category(id) => format!("cat_{}", id),
            CallbackAction::Service(id) => format!("svc_{}", id),
            CallbackAction::Buy(id) => format!("buy_{}", id),
            CallbackAction::Withdraw => "withdraw".to_string(),
            CallbackAction::CheckChannel => "check_channel".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "cats" => return Some(CallbackAction::Roots),
            "withdraw" => return Some(CallbackAction::Withdraw),
            "check_channel" => return Some(CallbackAction::CheckChannel),
            _ => {}
        }
        let (prefix, id) = data.split_once('_')?;
        let id: i64 = id.parse().ok()?;
        match prefix {
            "cat" => Some(CallbackAction::Category(id)),
            "svc" => Some(CallbackAction::Service(id)),
            "buy" => Some(CallbackAction::Buy(id)),
            _ => None,
        }
    }

    fn button(&self, text: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(text, self.encode())
    }
}

pub fn main_menu(webapp_url: Option<&str>) -> KeyboardMarkup {
    let mut rows = vec![
        vec![KeyboardButton::new(BTN_SERVICES), KeyboardButton::new(BTN_RECHARGE)],
        vec![KeyboardButton::new(BTN_INFO), KeyboardButton::new(BTN_ORDERS)],
        vec![KeyboardButton::new(BTN_REFERRAL), KeyboardButton::new(BTN_SUPPORT)],
    ];
    if let Some(url) = webapp_url.and_then(|u| Url::parse(u).ok()) {
        rows.push(vec![
            KeyboardButton::new(BTN_WEBAPP).request(ButtonRequest::WebApp(WebAppInfo { url })),
        ]);
    }
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Short price label, e.g. `$2.50 / 1000`.
pub fn price_label(service: &ServiceView) -> String {
    format!("${} / {}", format_cents(service.base_price), service.base_quantity)
}

pub fn roots_keyboard(roots: &[CategoryView]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        roots
            .iter()
            .map(|c| vec![CallbackAction::Category(c.id).button(format!("📁 {}", c.name))]),
    )
}

pub fn category_keyboard(page: &CategoryPage) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = page
        .subcategories
        .iter()
        .map(|c| vec![CallbackAction::Category(c.id).button(format!("📁 {}", c.name))])
        .collect();

    rows.extend(page.services.iter().map(|s| {
        vec![CallbackAction::Service(s.id).button(format!("{} · {}", s.name, price_label(s)))]
    }));

    let back = match page.category.parent_id {
        Some(parent) => CallbackAction::Category(parent),
        None => CallbackAction::Roots,
    };
    rows.push(vec![back.button("⬅️ Back")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn service_keyboard(service: &ServiceView) -> InlineKeyboardMarkup {
    let back = match service.category_id {
        Some(id) => CallbackAction::Category(id),
        None => CallbackAction::Roots,
    };
    InlineKeyboardMarkup::new(vec![
        vec![CallbackAction::Buy(service.id).button("🛒 Order")],
        vec![back.button("⬅️ Back")],
    ])
}

pub fn withdraw_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![CallbackAction::Withdraw.button("💸 Withdraw")]])
}

/// Join button (when the channel link is known) plus a re-check button.
pub fn channel_keyboard(channel_link: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = channel_link.and_then(|l| Url::parse(l).ok()) {
        rows.push(vec![InlineKeyboardButton::url("📢 Join channel", url)]);
    }
    rows.push(vec![CallbackAction::CheckChannel.button("✅ I joined")]);
    InlineKeyboardMarkup::new(rows)
}

/// Link to a Telegram contact given as `@name`, `name` or a full URL.
pub fn contact_url(contact: &str) -> Option<Url> {
    let contact = contact.trim();
    if contact.is_empty() {
        return None;
    }
    if contact.starts_with("http://") || contact.starts_with("https://") {
        return Url::parse(contact).ok();
    }
    let name = contact.trim_start_matches('@');
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Url::parse(&format!("https://t.me/{}", name)).ok()
}

pub fn payment_methods_keyboard(methods: &[PaymentMethodView]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(methods.iter().filter_map(|m| {
        let url = contact_url(m.contact_user.as_deref()?)?;
        Some(vec![InlineKeyboardButton::url(format!("💬 {}", m.name), url)])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn service(id: i64, category_id: Option<i64>) -> ServiceView {
        ServiceView {
            id,
            name: format!("Service {}", id),
            description: None,
            base_price: 250,
            base_quantity: 1000,
            min_quantity: 100,
            max_quantity: 10_000,
            is_available: true,
            category_id,
            link_instructions: None,
        }
    }

    fn callback_data(button: &InlineKeyboardButton) -> Option<&str> {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.as_str()),
            _ => None,
        }
    }

    #[test]
    fn callback_payloads_parse_back() {
        for action in [
            CallbackAction::Roots,
            CallbackAction::Category(3),
            CallbackAction::Service(12),
            CallbackAction::Buy(12),
            CallbackAction::Withdraw,
            CallbackAction::CheckChannel,
        ] {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
        assert_eq!(CallbackAction::parse("cat_x"), None);
        assert_eq!(CallbackAction::parse("set_lang_en"), None);
    }

    #[test]
    fn nested_category_points_back_to_parent() {
        let page = CategoryPage {
            category: CategoryView {
                id: 5,
                name: "Likes".into(),
                parent_id: Some(1),
            },
            subcategories: vec![CategoryView {
                id: 9,
                name: "Reels".into(),
                parent_id: Some(5),
            }],
            services: vec![service(20, Some(5))],
        };

        let kb = category_keyboard(&page);
        let data: Vec<_> = kb.inline_keyboard.iter().flatten().filter_map(callback_data).collect();
        assert_eq!(data, vec!["cat_9", "svc_20", "cat_1"]);
        assert!(kb.inline_keyboard[1][0].text.contains("$2.50 / 1000"));
    }

    #[test]
    fn root_category_points_back_to_roots() {
        let page = CategoryPage {
            category: CategoryView {
                id: 1,
                name: "Instagram".into(),
                parent_id: None,
            },
            subcategories: vec![],
            services: vec![],
        };
        let kb = category_keyboard(&page);
        assert_eq!(callback_data(&kb.inline_keyboard[0][0]), Some("cats"));
    }

    #[test]
    fn webapp_button_only_with_valid_url() {
        assert_eq!(main_menu(None).keyboard.len(), 3);
        assert_eq!(main_menu(Some("not a url")).keyboard.len(), 3);
        assert_eq!(main_menu(Some("https://shop.example.com/app")).keyboard.len(), 4);
    }

    #[test]
    fn contact_links() {
        assert_eq!(contact_url("@pay_admin").unwrap().as_str(), "https://t.me/pay_admin");
        assert_eq!(contact_url("https://t.me/x").unwrap().as_str(), "https://t.me/x");
        assert!(contact_url("call me maybe").is_none());
        assert!(contact_url("").is_none());
    }
}
