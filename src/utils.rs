// Utility functions
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses shop price text such as `"1,29 €"`, `"€2.49"` or `"1.299,00"`.
///
/// Returns `None` for text without a usable non-negative number.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    // The last separator is the decimal mark; earlier ones group thousands.
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) if cleaned.len() - c - 1 == 3 && cleaned.matches(',').count() > 1 => {
            cleaned.replace(',', "")
        }
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    let price = Decimal::from_str(&normalized).ok()?;
    (price >= Decimal::ZERO).then_some(price)
}

/// Price from a JSON value: numbers as-is, strings through [`parse_price`].
pub fn price_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .filter(|p| *p >= Decimal::ZERO)
        }
        serde_json::Value::String(s) => parse_price(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_common_formats() {
        assert_eq!(parse_price("1,29 €"), Some(dec!(1.29)));
        assert_eq!(parse_price("€2.49"), Some(dec!(2.49)));
        assert_eq!(parse_price("1.299,00 €"), Some(dec!(1299.00)));
        assert_eq!(parse_price("1,299.50"), Some(dec!(1299.50)));
        assert_eq!(parse_price("3"), Some(dec!(3)));
    }

    #[test]
    fn rejects_garbage_and_negatives() {
        assert_eq!(parse_price("gratis"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("-1,00"), None);
        assert_eq!(parse_price("1.2.3"), None);
    }

    #[test]
    fn json_prices() {
        assert_eq!(price_from_json(&serde_json::json!(0.89)), Some(dec!(0.89)));
        assert_eq!(price_from_json(&serde_json::json!("0,89 €")), Some(dec!(0.89)));
        assert_eq!(price_from_json(&serde_json::json!(null)), None);
        assert_eq!(price_from_json(&serde_json::json!(-2)), None);
    }
}
