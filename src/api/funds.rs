//! Handlers under `/api/mutual-funds`.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::SharedService;
use crate::api::error::{ApiError, ApiResponse, ApiResult};
use crate::core::analytics::{HoldingInput, PortfolioValue};
use crate::core::fund::{
    CategoryDescriptor, FundDetail, FundSnapshot, HistoricalPoint, NavSummary, SearchResult,
};

pub const DEFAULT_PERIOD: &str = "1y";

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    pub period: Option<String>,
}

impl PeriodParams {
    fn period(&self) -> &str {
        self.period.as_deref().unwrap_or(DEFAULT_PERIOD)
    }
}

#[derive(Debug, Serialize)]
pub struct FundList {
    pub funds: Vec<FundSnapshot>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: &'static [CategoryDescriptor],
}

#[derive(Debug, Serialize)]
pub struct FundResponse {
    pub fund: FundDetail,
}

#[derive(Debug, Serialize)]
pub struct NavHistory {
    pub symbol: String,
    pub period: String,
    pub history: Vec<HistoricalPoint>,
    pub count: usize,
}

fn fund_not_found(symbol: &str) -> ApiError {
    ApiError::NotFound(format!("Fund with symbol {symbol} not found"))
}

pub async fn list_funds(
    State(service): State<SharedService>,
    Query(params): Query<ListParams>,
) -> ApiResult<FundList> {
    let funds = service.popular_funds(params.category.as_deref()).await;
    Ok(ApiResponse::ok(FundList {
        count: funds.len(),
        funds,
    }))
}

pub async fn search_funds(
    State(service): State<SharedService>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResults> {
    let query = params
        .q
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'q' is required".to_string()))?;

    let results = service.search_funds(query);
    debug!("Search '{}' matched {} funds", query, results.len());
    Ok(ApiResponse::ok(SearchResults {
        count: results.len(),
        results,
    }))
}

pub async fn list_categories(State(service): State<SharedService>) -> ApiResult<CategoryList> {
    Ok(ApiResponse::ok(CategoryList {
        categories: service.categories(),
    }))
}

pub async fn fund_detail(
    State(service): State<SharedService>,
    Path(symbol): Path<String>,
    Query(params): Query<PeriodParams>,
) -> ApiResult<FundResponse> {
    debug!("Fund detail for {} over {}", symbol, params.period());
    let fund = service
        .fund_detail(&symbol, params.period())
        .await
        .ok_or_else(|| fund_not_found(&symbol))?;
    Ok(ApiResponse::ok(FundResponse { fund }))
}

pub async fn fund_nav(
    State(service): State<SharedService>,
    Path(symbol): Path<String>,
) -> ApiResult<NavSummary> {
    let snapshot = service
        .fund_info(&symbol)
        .await
        .ok_or_else(|| fund_not_found(&symbol))?;
    Ok(ApiResponse::ok(NavSummary::from(&snapshot)))
}

pub async fn fund_history(
    State(service): State<SharedService>,
    Path(symbol): Path<String>,
    Query(params): Query<PeriodParams>,
) -> ApiResult<NavHistory> {
    let period = params.period();
    let history = service.historical_nav(&symbol, period).await;
    if history.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No historical data found for {symbol}"
        )));
    }
    Ok(ApiResponse::ok(NavHistory {
        period: period.to_string(),
        count: history.len(),
        history,
        symbol,
    }))
}

pub async fn calculate_portfolio(
    State(service): State<SharedService>,
    body: Result<Json<Vec<HoldingInput>>, JsonRejection>,
) -> ApiResult<PortfolioValue> {
    let Json(holdings) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if holdings.is_empty() {
        return Err(ApiError::BadRequest(
            "Holdings list cannot be empty".to_string(),
        ));
    }
    Ok(ApiResponse::ok(service.calculate_portfolio(&holdings).await))
}
