//! Fund lookups with caching, upstream throttling and reference-table
//! fallback.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::analytics::{
    HoldingInput, PortfolioValue, assemble_detail, calculate_portfolio_value, derive_day_change,
    round2,
};
use crate::core::cache::TtlCache;
use crate::core::fallback;
use crate::core::fund::{
    CATEGORIES, CategoryDescriptor, FundDetail, FundSnapshot, HistoricalPoint, SearchResult,
};
use crate::core::quote::{FundQuote, QuoteProvider};
use crate::core::rate_limit::RateLimiter;
use crate::core::reference::{ReferenceEntry, ReferenceTable};

/// Builds a snapshot from a live quote. Reference metadata and trailing
/// returns take priority over the provider's; prices always come from the
/// provider. `None` when the quote carries no price.
pub fn merge_quote(
    symbol: &str,
    quote: FundQuote,
    reference: Option<&ReferenceEntry>,
) -> Option<FundSnapshot> {
    let nav = quote.price?;

    let mut day_change = quote.change;
    let mut day_change_percent = quote.change_percent;
    if day_change.is_none()
        && let Some(previous_close) = quote.previous_close
    {
        let (change, percent) = derive_day_change(nav, previous_close);
        day_change = Some(round2(change));
        if let Some(percent) = percent {
            day_change_percent = Some(round2(percent));
        }
    }

    let name = reference
        .map(|r| r.name.clone())
        .or(quote.long_name)
        .or(quote.short_name)
        .unwrap_or_else(|| symbol.to_string());

    Some(FundSnapshot {
        symbol: symbol.to_string(),
        name,
        fund_family: reference.map(|r| r.family.clone()).or(quote.fund_family),
        category: reference.map(|r| r.category.clone()).or(quote.category),
        nav,
        previous_close: quote.previous_close,
        day_change,
        day_change_percent,
        expense_ratio: quote.expense_ratio,
        total_assets: quote.total_assets,
        currency: quote.currency.unwrap_or_else(|| "INR".to_string()),
        ytd_return: quote.ytd_return,
        one_year_return: reference.and_then(|r| r.one_year_return),
        three_year_return: reference
            .and_then(|r| r.three_year_return)
            .or(quote.three_year_return),
        five_year_return: reference
            .and_then(|r| r.five_year_return)
            .or(quote.five_year_return),
        is_fallback: false,
    })
}

/// Shared by every request handler. Holds the snapshot cache, the upstream
/// throttle and the sticky fallback flag.
pub struct FundService {
    provider: Arc<dyn QuoteProvider>,
    reference: Arc<ReferenceTable>,
    cache: TtlCache<String, FundSnapshot>,
    rate_limiter: RateLimiter,
    fallback_mode: AtomicBool,
}

impl FundService {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        reference: Arc<ReferenceTable>,
        cache_ttl: Duration,
        rate_limit_delay: Duration,
    ) -> Self {
        FundService {
            provider,
            reference,
            cache: TtlCache::new(cache_ttl),
            rate_limiter: RateLimiter::new(rate_limit_delay),
            fallback_mode: AtomicBool::new(false),
        }
    }

    pub fn reference(&self) -> &ReferenceTable {
        &self.reference
    }

    /// Once set, stays set until the process exits.
    pub fn is_fallback_mode(&self) -> bool {
        self.fallback_mode.load(Ordering::SeqCst)
    }

    pub async fn cached_funds(&self) -> usize {
        self.cache.len().await
    }

    fn enter_fallback_mode(&self) {
        if !self.fallback_mode.swap(true, Ordering::SeqCst) {
            warn!("Rate limited by upstream provider, switching to fallback mode");
        }
    }

    fn synthesize_fallback(&self, symbol: &str) -> Option<FundSnapshot> {
        let entry = self.reference.get(symbol)?;
        Some(fallback::synthesize(entry, &mut rand::rng()))
    }

    async fn cache_fallback(&self, symbol: &str) -> Option<FundSnapshot> {
        let Some(snapshot) = self.synthesize_fallback(symbol) else {
            debug!("No reference data to fall back on for {}", symbol);
            return None;
        };
        self.cache.put(symbol.to_string(), snapshot.clone()).await;
        Some(snapshot)
    }

    /// Current snapshot for `symbol`, from cache, upstream, or the reference
    /// table in that order. Upstream failures never surface here; `None`
    /// means no source knows the fund.
    pub async fn fund_info(&self, symbol: &str) -> Option<FundSnapshot> {
        if let Some(cached) = self.cache.get(&symbol.to_string()).await {
            return Some(cached);
        }

        if self.is_fallback_mode() {
            debug!("Fallback mode active, skipping upstream for {}", symbol);
            return self.cache_fallback(symbol).await;
        }

        self.rate_limiter.wait().await;
        match self.provider.fetch_quote(symbol).await {
            Ok(mut quote) => {
                if quote.price.is_some() {
                    self.enrich_quote(symbol, &mut quote).await;
                }
                self.snapshot_from_quote(symbol, quote).await
            }
            Err(e) => {
                warn!(error = %e, "Error fetching fund info for {}", symbol);
                if e.is_rate_limited() {
                    self.enter_fallback_mode();
                }
                self.cache_fallback(symbol).await
            }
        }
    }

    /// Best effort: a failed profile lookup leaves the quote as it is.
    async fn enrich_quote(&self, symbol: &str, quote: &mut FundQuote) {
        self.rate_limiter.wait().await;
        match self.provider.fetch_profile(symbol).await {
            Ok(profile) => quote.enrich(profile),
            Err(e) => {
                debug!(error = %e, "No profile data for {}", symbol);
                if e.is_rate_limited() {
                    self.enter_fallback_mode();
                }
            }
        }
    }

    async fn snapshot_from_quote(&self, symbol: &str, quote: FundQuote) -> Option<FundSnapshot> {
        match merge_quote(symbol, quote, self.reference.get(symbol)) {
            Some(snapshot) => {
                self.cache.put(symbol.to_string(), snapshot.clone()).await;
                Some(snapshot)
            }
            None => {
                warn!("Upstream quote for {} has no price, using fallback", symbol);
                self.cache_fallback(symbol).await
            }
        }
    }

    /// Daily NAV history. Empty when the upstream fails or fallback mode is
    /// active; no history is ever synthesized.
    pub async fn historical_nav(&self, symbol: &str, period: &str) -> Vec<HistoricalPoint> {
        if self.is_fallback_mode() {
            debug!("Fallback mode active, no history for {}", symbol);
            return Vec::new();
        }

        self.rate_limiter.wait().await;
        match self.provider.fetch_history(symbol, period).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Error fetching history for {} ({})", symbol, period);
                if e.is_rate_limited() {
                    self.enter_fallback_mode();
                }
                Vec::new()
            }
        }
    }

    pub async fn fund_detail(&self, symbol: &str, period: &str) -> Option<FundDetail> {
        let snapshot = self.fund_info(symbol).await?;
        let history = self.historical_nav(symbol, period).await;
        Some(assemble_detail(snapshot, history))
    }

    /// One snapshot per reference fund, in table order, optionally limited
    /// to an exact category.
    pub async fn popular_funds(&self, category: Option<&str>) -> Vec<FundSnapshot> {
        let lookups = self
            .reference
            .by_category(category)
            .map(|entry| self.fund_info(&entry.symbol));
        join_all(lookups).await.into_iter().flatten().collect()
    }

    pub fn search_funds(&self, query: &str) -> Vec<SearchResult> {
        self.reference.search(query)
    }

    pub fn categories(&self) -> &'static [CategoryDescriptor] {
        &CATEGORIES
    }

    pub async fn calculate_portfolio(&self, holdings: &[HoldingInput]) -> PortfolioValue {
        let mut symbols: Vec<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();

        let snapshots: HashMap<String, FundSnapshot> =
            join_all(symbols.into_iter().map(|symbol| async move {
                self.fund_info(symbol)
                    .await
                    .map(|snapshot| (symbol.to_string(), snapshot))
            }))
            .await
            .into_iter()
            .flatten()
            .collect();

        info!(
            "Valuing {} holdings with {} resolved funds",
            holdings.len(),
            snapshots.len()
        );
        calculate_portfolio_value(holdings, &snapshots)
    }
}
