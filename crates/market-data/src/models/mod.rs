//! Market data models
//!
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `quote` - Normalized quote (Quote, QuoteBuilder, QuoteSource)
//! - `session` - Primary provider cookie session (Session)
//! - `symbol` - Symbol normalization

mod quote;
mod session;
mod symbol;
mod types;

pub use quote::{percent_change, Quote, QuoteBuilder, QuoteSource, MIN_TICK};
pub use session::Session;
pub use symbol::{normalize_symbol, MAX_SYMBOL_LEN};
pub use types::ProviderId;
