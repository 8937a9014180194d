//! Amounts are integer cents everywhere inside the shop. Provider prices stay
//! in floating point currency units since they come from a foreign API.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("`{0}` is not a valid amount")]
    Invalid(String),
    #[error("amount must be positive")]
    NotPositive,
    #[error("amount is too large")]
    TooLarge,
}

const MAX_CENTS: f64 = 1e13;

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parses user input such as `12`, `12.5`, `$3,75` into cents.
pub fn parse_amount(input: &str) -> Result<i64, AmountError> {
    let cleaned = input.trim().trim_start_matches('$').trim().replace(',', ".");
    if cleaned.is_empty() {
        return Err(AmountError::Empty);
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| AmountError::Invalid(input.trim().to_string()))?;
    if !value.is_finite() {
        return Err(AmountError::Invalid(input.trim().to_string()));
    }

    let cents = (value * 100.0).round();
    if cents < 1.0 {
        return Err(AmountError::NotPositive);
    }
    if cents > MAX_CENTS {
        return Err(AmountError::TooLarge);
    }
    Ok(cents as i64)
}

/// Price of `quantity` units when `base_quantity` units cost `base_price`
/// cents. Rounds up to the next cent so the shop never undercharges.
pub fn order_total(quantity: i64, base_price: i64, base_quantity: i64) -> Option<i64> {
    if quantity <= 0 || base_price < 0 || base_quantity <= 0 {
        return None;
    }
    let numerator = quantity as i128 * base_price as i128;
    let denominator = base_quantity as i128;
    i64::try_from((numerator + denominator - 1) / denominator).ok()
}

/// Shop price per 1000 units in currency units, the unit provider rates use.
pub fn price_per_thousand(base_price: i64, base_quantity: i64) -> f64 {
    if base_quantity <= 0 {
        return 0.0;
    }
    base_price as f64 / 100.0 * 1000.0 / base_quantity as f64
}

/// What the provider is expected to charge for `quantity` units.
pub fn provider_cost_estimate(quantity: i64, shop_price_per_thousand: f64, multiplier: f64) -> f64 {
    if multiplier <= 0.0 {
        return f64::INFINITY;
    }
    quantity as f64 / 1000.0 * (shop_price_per_thousand / multiplier)
}

/// Share of `total` to give back when `remains` of `quantity` units were not
/// delivered. Floors so a refund never exceeds what was paid.
pub fn partial_refund(total: i64, quantity: i64, remains: i64) -> i64 {
    if quantity <= 0 || remains <= 0 || total <= 0 {
        return 0;
    }
    let remains = remains.min(quantity);
    let refund = total as i128 * remains as i128 / quantity as i128;
    refund.clamp(0, total as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount("12"), Ok(1200));
        assert_eq!(parse_amount(" $3,75 "), Ok(375));
        assert_eq!(parse_amount("0.29"), Ok(29));
        assert_eq!(parse_amount("0"), Err(AmountError::NotPositive));
        assert_eq!(parse_amount("-5"), Err(AmountError::NotPositive));
        assert_eq!(parse_amount(""), Err(AmountError::Empty));
        assert!(matches!(parse_amount("ten"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_amount("NaN"), Err(AmountError::Invalid(_))));
    }

    #[test]
    fn totals_round_up() {
        // 1500 units at $2.50 per 1000
        assert_eq!(order_total(1500, 250, 1000), Some(375));
        // 1 unit at $1.00 per 1000 is a tenth of a cent, charged as one cent
        assert_eq!(order_total(1, 100, 1000), Some(1));
        assert_eq!(order_total(0, 100, 1000), None);
        assert_eq!(order_total(10, 100, 0), None);
        assert_eq!(order_total(1000, 0, 1000), Some(0));
    }

    #[test]
    fn provider_estimate_uses_multiplier() {
        let per_thousand = price_per_thousand(300, 1000);
        assert!((per_thousand - 3.0).abs() < 1e-9);
        // shop sells at 3.0, multiplier 1.5 means provider rate is 2.0
        let cost = provider_cost_estimate(2000, per_thousand, 1.5);
        assert!((cost - 4.0).abs() < 1e-9);
        assert!(provider_cost_estimate(10, 1.0, 0.0).is_infinite());
    }

    #[test]
    fn partial_refund_is_proportional_and_bounded() {
        assert_eq!(partial_refund(1000, 1000, 250), 250);
        assert_eq!(partial_refund(333, 1000, 500), 166);
        assert_eq!(partial_refund(1000, 1000, 5000), 1000);
        assert_eq!(partial_refund(1000, 1000, 0), 0);
    }
}
