use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::analytics::round2;
use crate::core::fund::HistoricalPoint;
use crate::core::quote::{FundQuote, ProviderError, QuoteProvider};

const QUOTE_MODULES: &str = "price,summaryDetail,fundProfile,defaultKeyStatistics";

pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("mfquote/1.0")
            .timeout(timeout)
            .build()?;
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        symbol: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        debug!("Requesting {} with {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                symbol: symbol.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        let text = response.text().await.map_err(|e| ProviderError::Request {
            symbol: symbol.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Parse {
            symbol: symbol.to_string(),
            message: e.to_string(),
        })
    }
}

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}`; empty objects
/// stand for missing values.
#[derive(Deserialize, Debug, Default)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

/// Yahoo reports ratios and returns as fractions.
fn raw_percent(value: &Option<RawValue>) -> Option<f64> {
    raw(value).map(|v| round2(v * 100.0))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Deserialize, Debug)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryItem>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryItem {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetailModule>,
    fund_profile: Option<FundProfileModule>,
    default_key_statistics: Option<KeyStatisticsModule>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    regular_market_price: Option<RawValue>,
    regular_market_previous_close: Option<RawValue>,
    regular_market_change: Option<RawValue>,
    regular_market_change_percent: Option<RawValue>,
    currency: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    nav_price: Option<RawValue>,
    previous_close: Option<RawValue>,
    total_assets: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FundProfileModule {
    family: Option<String>,
    category_name: Option<String>,
    fees_expenses_investment: Option<FeesModule>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FeesModule {
    annual_report_expense_ratio: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct KeyStatisticsModule {
    ytd_return: Option<RawValue>,
    three_year_average_return: Option<RawValue>,
    five_year_average_return: Option<RawValue>,
}

impl From<QuoteSummaryItem> for FundQuote {
    fn from(item: QuoteSummaryItem) -> Self {
        let mut quote = FundQuote::default();

        if let Some(price) = item.price {
            quote.price = raw(&price.regular_market_price);
            quote.previous_close = raw(&price.regular_market_previous_close);
            quote.change = raw(&price.regular_market_change);
            quote.change_percent = raw_percent(&price.regular_market_change_percent);
            quote.currency = price.currency;
            quote.long_name = price.long_name;
            quote.short_name = price.short_name;
        }
        if let Some(detail) = item.summary_detail {
            quote.price = quote.price.or(raw(&detail.nav_price));
            quote.previous_close = quote.previous_close.or(raw(&detail.previous_close));
            quote.total_assets = raw(&detail.total_assets);
        }
        if let Some(profile) = item.fund_profile {
            quote.fund_family = profile.family;
            quote.category = profile.category_name;
            quote.expense_ratio = profile
                .fees_expenses_investment
                .and_then(|fees| raw_percent(&fees.annual_report_expense_ratio));
        }
        if let Some(stats) = item.default_key_statistics {
            quote.ytd_return = raw_percent(&stats.ytd_return);
            quote.three_year_return = raw_percent(&stats.three_year_average_return);
            quote.five_year_return = raw_percent(&stats.five_year_average_return);
        }

        quote
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(alias = "gmtoffset")]
    gmt_offset: Option<i64>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    currency: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
}

impl From<ChartMeta> for FundQuote {
    fn from(meta: ChartMeta) -> Self {
        FundQuote {
            price: meta.regular_market_price,
            previous_close: meta.chart_previous_close.or(meta.previous_close),
            currency: meta.currency,
            long_name: meta.long_name,
            short_name: meta.short_name,
            ..FundQuote::default()
        }
    }
}

/// Bar timestamps are session opens in UTC; shift by the exchange offset
/// so each bar lands on its local trading date.
fn session_date(timestamp: i64, gmt_offset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmt_offset, 0).map(|dt| dt.date_naive())
}

fn extract_history(item: &ChartItem) -> Vec<HistoricalPoint> {
    let gmt_offset = item.meta.as_ref().and_then(|m| m.gmt_offset).unwrap_or(0);

    let (Some(timestamps), Some(closes)) = (
        item.timestamp.as_ref(),
        item.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return Vec::new();
    };

    let mut history: Vec<HistoricalPoint> = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let nav = (*close)?;
            let date = session_date(*ts, gmt_offset)?;
            Some(HistoricalPoint {
                date,
                nav: round2(nav),
            })
        })
        .collect();

    history.sort_by_key(|point| point.date);
    history.dedup_by_key(|point| point.date);
    history
}

impl YahooFinanceProvider {
    async fn fetch_chart(&self, symbol: &str, range: &str) -> Result<ChartItem, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let data: YahooChartResponse = self
            .get_json(symbol, &url, &[("interval", "1d"), ("range", range)])
            .await?;

        data.chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| ProviderError::NoData(symbol.to_string()))
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    /// Price fields come from the chart endpoint's metadata, which needs no
    /// session crumb.
    #[instrument(name = "YahooQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<FundQuote, ProviderError> {
        let item = self.fetch_chart(symbol, "1d").await?;
        let meta = item
            .meta
            .ok_or_else(|| ProviderError::NoData(symbol.to_string()))?;
        Ok(FundQuote::from(meta))
    }

    /// quoteSummary carries expense ratio, assets, fund profile and returns.
    /// Yahoo may refuse it without a session crumb.
    #[instrument(name = "YahooProfileFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_profile(&self, symbol: &str) -> Result<FundQuote, ProviderError> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);
        let data: QuoteSummaryResponse = self
            .get_json(symbol, &url, &[("modules", QUOTE_MODULES)])
            .await?;

        let item = data
            .quote_summary
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| ProviderError::NoData(symbol.to_string()))?;

        Ok(FundQuote::from(item))
    }

    #[instrument(name = "YahooHistoryFetch", skip(self), fields(symbol = %symbol, period = %period))]
    async fn fetch_history(
        &self,
        symbol: &str,
        period: &str,
    ) -> Result<Vec<HistoricalPoint>, ProviderError> {
        let item = self.fetch_chart(symbol, period).await?;
        let history = extract_history(&item);
        debug!("Received {} history points for {}", history.len(), symbol);
        Ok(history)
    }
}
