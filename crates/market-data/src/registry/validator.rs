//! Response and quote validation.
//!
//! Providers behind anti-bot protection do not always fail with a clean status
//! code. A 200 can carry an HTML challenge page, a compressed body the client
//! did not decode, or plain garbage. Bodies are classified before any parsing
//! is attempted, and parsed quotes get a final sanity pass:
//! - Payload classification (JSON / HTML / binary / empty)
//! - Positive last price
//! - Day range invariants (high >= low)
//! - Non-negative volume

use std::fmt;

use log::warn;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::MarketDataError;
use crate::models::Quote;

/// Default number of leading bytes inspected for high-bit density.
const DEFAULT_SNIFF_WINDOW: usize = 512;

/// Default share of high-bit bytes above which a body is considered binary.
const DEFAULT_HIGH_BYTE_RATIO: f64 = 0.20;

/// Maximum characters kept in a log preview.
const PREVIEW_LEN: usize = 48;

/// Magic prefixes of compression/archive formats seen in place of JSON.
const COMPRESSION_MAGIC: &[&[u8]] = &[
    &[0x1f, 0x8b],             // gzip
    &[0x28, 0xb5, 0x2f, 0xfd], // zstd
    &[0x50, 0x4b, 0x03, 0x04], // zip
    &[0x42, 0x5a, 0x68],       // bzip2
    &[0x78, 0x01],             // zlib, no compression
    &[0x78, 0x5e],             // zlib, fast
    &[0x78, 0x9c],             // zlib, default
    &[0x78, 0xda],             // zlib, best
];

/// What a raw response body looks like.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadClass {
    /// Looks like JSON; hand it to the provider parser.
    ValidJson,
    /// An HTML page, usually a block or challenge page.
    HtmlErrorPage,
    /// Compressed, binary, or otherwise unreadable.
    BinaryOrCorrupted,
    /// Nothing but whitespace.
    Empty,
}

impl PayloadClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidJson => "valid_json",
            Self::HtmlErrorPage => "html_error_page",
            Self::BinaryOrCorrupted => "binary_or_corrupted",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for PayloadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject quote, try next tier.
    Hard,
    /// Soft warning - accept quote but log warning.
    Soft,
}

/// Validation result details.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Leading bytes inspected for high-bit density.
    pub sniff_window: usize,
    /// Share of bytes above 0x7F that marks a body as binary.
    pub high_byte_ratio: f64,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            sniff_window: DEFAULT_SNIFF_WINDOW,
            high_byte_ratio: DEFAULT_HIGH_BYTE_RATIO,
            warn_on_zero_volume: true,
        }
    }
}

/// Classifies response bodies and sanity-checks parsed quotes.
#[derive(Clone, Debug, Default)]
pub struct ResponseValidator {
    config: ValidatorConfig,
}

impl ResponseValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Classify a raw body. Heuristics run in a fixed order; the first match wins.
    pub fn classify(&self, body: &[u8]) -> PayloadClass {
        let trimmed = trim_ascii_start(body);

        if trimmed.is_empty() {
            return PayloadClass::Empty;
        }

        if trimmed[0] == b'<' {
            return PayloadClass::HtmlErrorPage;
        }

        if COMPRESSION_MAGIC.iter().any(|magic| body.starts_with(magic)) {
            return PayloadClass::BinaryOrCorrupted;
        }

        if body
            .iter()
            .any(|&b| b.is_ascii_control() && !matches!(b, b'\t' | b'\n' | b'\r'))
        {
            return PayloadClass::BinaryOrCorrupted;
        }

        if self.high_byte_share(body) > self.config.high_byte_ratio {
            return PayloadClass::BinaryOrCorrupted;
        }

        match trimmed[0] {
            b'{' | b'[' => PayloadClass::ValidJson,
            _ => PayloadClass::BinaryOrCorrupted,
        }
    }

    /// Classify and convert anything that is not JSON into an error.
    pub fn ensure_json(&self, provider: &str, body: &[u8]) -> Result<(), MarketDataError> {
        match self.classify(body) {
            PayloadClass::ValidJson => Ok(()),
            class => Err(MarketDataError::InvalidPayload {
                provider: provider.to_string(),
                class,
                preview: preview(body),
            }),
        }
    }

    fn high_byte_share(&self, body: &[u8]) -> f64 {
        let window = &body[..body.len().min(self.config.sniff_window)];
        if window.is_empty() {
            return 0.0;
        }
        let high = window.iter().filter(|&&b| b > 0x7f).count();
        high as f64 / window.len() as f64
    }

    /// Sanity-check a parsed quote.
    ///
    /// Returns Ok(()) if the quote is usable. Warnings are logged but do not
    /// cause rejection.
    pub fn validate_quote(&self, quote: &Quote) -> Result<(), MarketDataError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        if quote.last_price <= Decimal::ZERO {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Non-positive last price: {}", quote.last_price),
            });
        }

        self.validate_day_range(quote, &mut issues);
        self.validate_volume(quote, &mut issues);

        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: errors.join("; "),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Quote validation warning for {}: {}", quote.symbol, issue.message);
        }

        Ok(())
    }

    fn validate_day_range(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        let (Some(high), Some(low)) = (quote.day_high, quote.day_low) else {
            return;
        };

        if high < low {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Hard,
                message: format!("Day high ({}) is less than day low ({})", high, low),
            });
            return;
        }

        if quote.last_price < low || quote.last_price > high {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: format!(
                    "Last price ({}) is outside day range ({}-{})",
                    quote.last_price, low, high
                ),
            });
        }
    }

    fn validate_volume(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        if let Some(volume) = quote.volume {
            if volume < Decimal::ZERO {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Hard,
                    message: format!("Negative volume: {}", volume),
                });
            }

            if self.config.warn_on_zero_volume && volume == Decimal::ZERO && quote.source.is_live() {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: "Zero volume".to_string(),
                });
            }
        }
    }
}

/// Printable preview of a body for logs: at most 48 characters, anything that
/// is not printable ASCII replaced by `.`.
pub fn preview(body: &[u8]) -> String {
    body.iter()
        .take(PREVIEW_LEN)
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

fn trim_ascii_start(body: &[u8]) -> &[u8] {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    &body[start..]
}
