use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

/// A price or volume field that upstreams send either as a JSON number or as
/// a string (`2500.00`, `"2500.00"`, `"2,500.00"`, `"-"`).
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

impl NumberOrString {
    /// Decimal value, or `None` for placeholders and unparseable text.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => parse_decimal(&n.to_string()),
            Self::Text(s) => parse_decimal(&s.trim().replace(',', "")),
        }
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() || raw == "-" {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Convenience for `Option<NumberOrString>` fields.
pub(crate) fn decimal(value: &Option<NumberOrString>) -> Option<Decimal> {
    value.as_ref().and_then(NumberOrString::to_decimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(json: &str) -> Option<Decimal> {
        serde_json::from_str::<NumberOrString>(json)
            .ok()
            .and_then(|n| n.to_decimal())
    }

    #[test]
    fn test_numbers_and_strings() {
        assert_eq!(parse("2500.5"), Some(dec!(2500.5)));
        assert_eq!(parse("42"), Some(dec!(42)));
        assert_eq!(parse("\"2474.50\""), Some(dec!(2474.50)));
        assert_eq!(parse("\" 1,234.75 \""), Some(dec!(1234.75)));
        assert_eq!(parse("1e3"), Some(dec!(1000)));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(parse("\"-\""), None);
        assert_eq!(parse("\"\""), None);
        assert_eq!(parse("\"n/a\""), None);
    }
}
