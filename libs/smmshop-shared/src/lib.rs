pub mod api;
pub mod money;
pub mod status;

pub use status::{OrderStatus, ParseStatusError, WithdrawalKind, WithdrawalStatus};
