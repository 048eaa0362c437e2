/// Maximum accepted symbol length after normalization.
pub const MAX_SYMBOL_LEN: usize = 20;

/// Trims and uppercases a ticker symbol.
///
/// Returns `None` for symbols that are empty, too long, or contain characters
/// no exchange uses (NSE symbols may contain `&` and `-`, e.g. `M&M`).
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();

    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
        return None;
    }

    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '&' | '-' | '.' | '^' | '_'));

    valid.then_some(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(normalize_symbol("  reliance "), Some("RELIANCE".to_string()));
        assert_eq!(normalize_symbol("m&m"), Some("M&M".to_string()));
        assert_eq!(normalize_symbol("bajaj-auto"), Some("BAJAJ-AUTO".to_string()));
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert_eq!(normalize_symbol("   "), None);
        assert_eq!(normalize_symbol("ABCDEFGHIJKLMNOPQRSTU"), None);
        assert_eq!(normalize_symbol("REL IANCE"), None);
        assert_eq!(normalize_symbol("<script>"), None);
    }
}
