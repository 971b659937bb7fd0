//! Upstream quote abstractions and core types

use async_trait::async_trait;
use thiserror::Error;

use crate::core::fund::HistoricalPoint;

/// Raw fund fields reported by an upstream provider. Every field is
/// optional; the service decides how to fill the gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundQuote {
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub change: Option<f64>,
    /// Percent, not a fraction.
    pub change_percent: Option<f64>,
    /// Percent, not a fraction.
    pub expense_ratio: Option<f64>,
    pub total_assets: Option<f64>,
    pub currency: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub fund_family: Option<String>,
    pub category: Option<String>,
    pub ytd_return: Option<f64>,
    pub three_year_return: Option<f64>,
    pub five_year_return: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Rate limited by upstream provider for symbol: {0}")]
    RateLimited(String),
    #[error("HTTP error: {status} for symbol: {symbol}")]
    Status { status: u16, symbol: String },
    #[error("Request error: {message} for symbol: {symbol}")]
    Request { symbol: String, message: String },
    #[error("Failed to parse response for {symbol}: {message}")]
    Parse { symbol: String, message: String },
    #[error("No data found for symbol: {0}")]
    NoData(String),
}

impl FundQuote {
    /// Fills fields still missing here from `profile`. Fields already set
    /// are kept.
    pub fn enrich(&mut self, profile: FundQuote) {
        self.price = self.price.or(profile.price);
        self.previous_close = self.previous_close.or(profile.previous_close);
        self.change = self.change.or(profile.change);
        self.change_percent = self.change_percent.or(profile.change_percent);
        self.expense_ratio = self.expense_ratio.or(profile.expense_ratio);
        self.total_assets = self.total_assets.or(profile.total_assets);
        self.currency = self.currency.take().or(profile.currency);
        self.long_name = self.long_name.take().or(profile.long_name);
        self.short_name = self.short_name.take().or(profile.short_name);
        self.fund_family = self.fund_family.take().or(profile.fund_family);
        self.category = self.category.take().or(profile.category);
        self.ytd_return = self.ytd_return.or(profile.ytd_return);
        self.three_year_return = self.three_year_return.or(profile.three_year_return);
        self.five_year_return = self.five_year_return.or(profile.five_year_return);
    }
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Current price, previous close and currency.
    async fn fetch_quote(&self, symbol: &str) -> Result<FundQuote, ProviderError>;

    /// Descriptive fields (expense ratio, assets, family, returns) used to
    /// enrich a quote. Providers without such data report nothing.
    async fn fetch_profile(&self, _symbol: &str) -> Result<FundQuote, ProviderError> {
        Ok(FundQuote::default())
    }

    /// Daily NAV history for `period` (`1mo`, `3mo`, `6mo`, `1y`, `2y`, `5y`),
    /// ascending by date.
    async fn fetch_history(
        &self,
        symbol: &str,
        period: &str,
    ) -> Result<Vec<HistoricalPoint>, ProviderError>;
}
