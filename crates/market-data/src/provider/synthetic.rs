//! Synthetic quotes, the last tier of the fallback chain.
//!
//! Values are placeholders: stable per symbol so repeated requests look
//! plausible, jittered slightly, and always tagged [`QuoteSource::Synthetic`].

use chrono::Utc;
use num_traits::{FromPrimitive, ToPrimitive};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{Quote, QuoteSource};

/// Default nominal base price.
pub const DEFAULT_NOMINAL_BASE: Decimal = Decimal::ONE_THOUSAND;

/// Default maximum deviation of the last price from the base, in percent.
pub const DEFAULT_MAX_JITTER_PERCENT: Decimal = Decimal::TWO;

/// Generates placeholder quotes. Never fails.
#[derive(Clone, Debug)]
pub struct SyntheticQuoteGenerator {
    nominal_base: Decimal,
    max_jitter_percent: Decimal,
}

impl Default for SyntheticQuoteGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NOMINAL_BASE, DEFAULT_MAX_JITTER_PERCENT)
    }
}

impl SyntheticQuoteGenerator {
    /// Non-positive bases fall back to the default; the jitter is clamped to
    /// `[0, 50]` percent so the last price stays positive.
    pub fn new(nominal_base: Decimal, max_jitter_percent: Decimal) -> Self {
        let nominal_base = if nominal_base > Decimal::ZERO {
            nominal_base
        } else {
            DEFAULT_NOMINAL_BASE
        };
        Self {
            nominal_base,
            max_jitter_percent: max_jitter_percent.clamp(Decimal::ZERO, Decimal::from(50)),
        }
    }

    /// Stable per-symbol base in `[0.5, 1.5] × nominal`.
    pub fn base_price(&self, symbol: &str) -> Decimal {
        let digest = md5::compute(symbol.as_bytes());
        let bucket = u16::from_be_bytes([digest[0], digest[1]]);
        let fraction = Decimal::from(bucket) / Decimal::from(u16::MAX);
        round_price(self.nominal_base * (Decimal::new(5, 1) + fraction))
    }

    pub fn generate(&self, symbol: &str) -> Quote {
        let base = self.base_price(symbol);

        let max = self.max_jitter_percent.to_f64().unwrap_or(0.0);
        let jitter = if max > 0.0 {
            rand::thread_rng().gen_range(-max..=max)
        } else {
            0.0
        };
        let jitter = Decimal::from_f64(jitter).unwrap_or_default();

        let last = round_price(base * (Decimal::ONE + jitter / Decimal::ONE_HUNDRED));

        Quote::builder(symbol, last, QuoteSource::Synthetic)
            .previous_close(Some(base))
            .open(Some(base))
            .day_range(Some(last.min(base)), Some(last.max(base)))
            .volume(Some(Decimal::ZERO))
            .timestamp(Utc::now())
            .build_clamped()
    }
}

fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_is_positive_and_tagged() {
        let generator = SyntheticQuoteGenerator::default();

        for symbol in ["RELIANCE", "TCS", "X", "M&M", ""] {
            let quote = generator.generate(symbol);
            assert!(quote.last_price > Decimal::ZERO);
            assert_eq!(quote.source, QuoteSource::Synthetic);
            assert!(!quote.source.is_live());
            assert_eq!(quote.volume, Some(Decimal::ZERO));
        }
    }

    #[test]
    fn test_base_is_stable_and_bounded() {
        let generator = SyntheticQuoteGenerator::default();

        let a = generator.base_price("INFY");
        assert_eq!(a, generator.base_price("INFY"));
        assert!(a >= dec!(500) && a <= dec!(1500));
    }

    #[test]
    fn test_jitter_within_bounds() {
        let generator = SyntheticQuoteGenerator::default();
        let base = generator.base_price("HDFCBANK");

        for _ in 0..50 {
            let quote = generator.generate("HDFCBANK");
            let deviation = (quote.last_price - base).abs() / base * Decimal::ONE_HUNDRED;
            // allow for rounding to cents
            assert!(deviation <= dec!(2.01), "deviation {}", deviation);
            assert!(quote.day_low.unwrap() <= quote.day_high.unwrap());
        }
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let generator = SyntheticQuoteGenerator::new(dec!(200), Decimal::ZERO);
        let quote = generator.generate("SBIN");

        assert_eq!(quote.last_price, generator.base_price("SBIN"));
        assert_eq!(quote.change, Some(Decimal::ZERO));
        assert_eq!(quote.percent_change, Some(Decimal::ZERO));
    }

    #[test]
    fn test_tiny_base_still_yields_positive_price() {
        let generator = SyntheticQuoteGenerator::new(dec!(0.001), dec!(2));
        let quote = generator.generate("DUST");

        assert!(quote.last_price >= dec!(0.01));
        assert_eq!(quote.source, QuoteSource::Synthetic);
    }

    #[test]
    fn test_invalid_base_falls_back() {
        let generator = SyntheticQuoteGenerator::new(dec!(-5), dec!(2));
        let base = generator.base_price("ITC");
        assert!(base >= dec!(500));
    }
}
