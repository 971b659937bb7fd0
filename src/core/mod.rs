//! Core business logic abstractions

pub mod analytics;
pub mod cache;
pub mod config;
pub mod fallback;
pub mod fund;
pub mod log;
pub mod quote;
pub mod rate_limit;
pub mod reference;

// Re-export main types for cleaner imports
pub use fund::{FundDetail, FundSnapshot, HistoricalPoint};
pub use quote::{FundQuote, ProviderError, QuoteProvider};
pub use reference::ReferenceTable;
