use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Lifecycle of an order.
///
/// `Pending` orders are paid but not yet accepted by a provider, `Processing`
/// orders carry a provider order id and are polled until they reach one of
/// the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Partial,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Partial,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Partial => "Partial",
            OrderStatus::Canceled => "Canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Partial | OrderStatus::Canceled
        )
    }

    /// Legal edges of the order graph. Terminal states have no outgoing edges,
    /// `Processing -> Pending` exists so an admin can requeue a stuck order.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Canceled)
                | (Processing, Completed)
                | (Processing, Partial)
                | (Processing, Canceled)
                | (Processing, Pending)
        )
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "⏳",
            OrderStatus::Processing => "⚙️",
            OrderStatus::Completed => "✅",
            OrderStatus::Partial => "🌓",
            OrderStatus::Canceled => "❌",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" | "in progress" | "in_progress" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "partial" => Ok(OrderStatus::Partial),
            "canceled" | "cancelled" => Ok(OrderStatus::Canceled),
            _ => Err(ParseStatusError::new("order status", s)),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderStatus> for String {
    fn from(value: OrderStatus) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "Pending",
            WithdrawalStatus::Approved => "Approved",
            WithdrawalStatus::Rejected => "Rejected",
        }
    }

    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        *self == WithdrawalStatus::Pending && next != WithdrawalStatus::Pending
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" | "completed" => Ok(WithdrawalStatus::Approved),
            "rejected" | "canceled" | "cancelled" => Ok(WithdrawalStatus::Rejected),
            _ => Err(ParseStatusError::new("withdrawal status", s)),
        }
    }
}

impl TryFrom<String> for WithdrawalStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WithdrawalStatus> for String {
    fn from(value: WithdrawalStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Which balance a withdrawal is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WithdrawalKind {
    Referral,
    Main,
}

impl WithdrawalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalKind::Referral => "referral",
            WithdrawalKind::Main => "main",
        }
    }

    /// Column holding the balance this kind draws from.
    pub fn balance_column(&self) -> &'static str {
        match self {
            WithdrawalKind::Referral => "referral_balance",
            WithdrawalKind::Main => "balance",
        }
    }
}

impl fmt::Display for WithdrawalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalKind {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "referral" => Ok(WithdrawalKind::Referral),
            "main" => Ok(WithdrawalKind::Main),
            _ => Err(ParseStatusError::new("withdrawal type", s)),
        }
    }
}

impl TryFrom<String> for WithdrawalKind {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WithdrawalKind> for String {
    fn from(value: WithdrawalKind) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_frozen() {
        for from in [OrderStatus::Completed, OrderStatus::Partial, OrderStatus::Canceled] {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn pending_cannot_jump_to_partial() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Partial));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn parses_provider_spellings() {
        assert_eq!("In progress".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
        assert_eq!("CANCELLED".parse::<OrderStatus>().unwrap(), OrderStatus::Canceled);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn withdrawal_aliases() {
        assert_eq!("Completed".parse::<WithdrawalStatus>().unwrap(), WithdrawalStatus::Approved);
        assert_eq!("Canceled".parse::<WithdrawalStatus>().unwrap(), WithdrawalStatus::Rejected);
        assert!(WithdrawalStatus::Pending.can_transition_to(WithdrawalStatus::Rejected));
        assert!(!WithdrawalStatus::Approved.can_transition_to(WithdrawalStatus::Rejected));
    }

    #[test]
    fn serde_uses_text_form() {
        let json = serde_json::to_string(&OrderStatus::Partial).unwrap();
        assert_eq!(json, "\"Partial\"");
        let kind: WithdrawalKind = serde_json::from_str("\"Referral\"").unwrap();
        assert_eq!(kind, WithdrawalKind::Referral);
    }
}
