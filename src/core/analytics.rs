//! Provides functions for deriving returns and valuing portfolios.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::core::fund::{FundDetail, FundSnapshot, HistoricalPoint};

/// Trading sessions in roughly one month, three months and one year.
pub const ONE_MONTH_SESSIONS: usize = 22;
pub const THREE_MONTH_SESSIONS: usize = 66;
pub const ONE_YEAR_SESSIONS: usize = 252;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change from `base` to `current`, rounded to 2 decimals.
/// `None` when `base` is zero.
pub fn percent_return(current: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some(round2((current - base) / base * 100.0))
}

/// Absolute and percent day change derived from NAV and previous close.
/// The percent is `None` when the previous close is zero.
pub fn derive_day_change(nav: f64, previous_close: f64) -> (f64, Option<f64>) {
    let change = nav - previous_close;
    let change_percent = (previous_close != 0.0).then(|| change / previous_close * 100.0);
    (change, change_percent)
}

/// Return over the trailing `sessions` points of an ascending series,
/// measured from the point `sessions` entries before the end.
fn trailing_return(history: &[HistoricalPoint], sessions: usize) -> Option<f64> {
    if history.len() < sessions {
        return None;
    }
    let current = history.last()?.nav;
    let base = history[history.len() - sessions].nav;
    percent_return(current, base)
}

/// Combines a snapshot with its NAV history.
///
/// The one-year figure from the snapshot is replaced only when the series
/// covers a full year of sessions; the baseline is the point one year of
/// sessions back, so a longer series does not stretch the window.
pub fn assemble_detail(snapshot: FundSnapshot, history: Vec<HistoricalPoint>) -> FundDetail {
    let one_month_return = trailing_return(&history, ONE_MONTH_SESSIONS);
    let three_month_return = trailing_return(&history, THREE_MONTH_SESSIONS);

    let mut snapshot = snapshot;
    if let Some(one_year) = trailing_return(&history, ONE_YEAR_SESSIONS) {
        debug!(
            "Replacing one year return for {} with {one_year} from {} points",
            snapshot.symbol,
            history.len()
        );
        snapshot.one_year_return = Some(one_year);
    }

    FundDetail {
        snapshot,
        one_month_return,
        three_month_return,
        historical_data: history,
    }
}

/// A position as submitted by a client. Missing figures count as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingInput {
    pub symbol: String,
    #[serde(default)]
    pub units: f64,
    #[serde(default)]
    pub avg_nav: f64,
}

/// Represents the calculated value and returns of a single holding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingValue {
    pub symbol: String,
    pub name: String,
    pub units: f64,
    pub avg_nav: f64,
    pub current_nav: f64,
    pub invested_value: f64,
    pub current_value: f64,
    pub returns: f64,
    pub returns_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_invested: f64,
    pub total_current: f64,
    pub total_returns: f64,
    pub total_returns_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioValue {
    pub holdings: Vec<HoldingValue>,
    pub summary: PortfolioSummary,
}

fn returns_percent(returns: f64, invested: f64) -> f64 {
    if invested > 0.0 {
        returns / invested * 100.0
    } else {
        0.0
    }
}

/// Values every holding against its resolved snapshot.
///
/// This is a pure calculation over pre-fetched snapshots: a holding whose
/// symbol is missing from `snapshots` is valued at its own average NAV.
/// Totals are summed before rounding.
pub fn calculate_portfolio_value(
    holdings: &[HoldingInput],
    snapshots: &HashMap<String, FundSnapshot>,
) -> PortfolioValue {
    let mut total_invested = 0.0;
    let mut total_current = 0.0;
    let mut values = Vec::with_capacity(holdings.len());

    for holding in holdings {
        let snapshot = snapshots.get(&holding.symbol);
        if snapshot.is_none() {
            debug!(
                "No snapshot for {}, valuing at average NAV",
                holding.symbol
            );
        }
        let current_nav = snapshot.map_or(holding.avg_nav, |s| s.nav);
        let name = snapshot.map_or_else(|| holding.symbol.clone(), |s| s.name.clone());

        let invested_value = holding.units * holding.avg_nav;
        let current_value = holding.units * current_nav;
        let returns = current_value - invested_value;

        total_invested += invested_value;
        total_current += current_value;

        values.push(HoldingValue {
            symbol: holding.symbol.clone(),
            name,
            units: holding.units,
            avg_nav: holding.avg_nav,
            current_nav,
            invested_value: round2(invested_value),
            current_value: round2(current_value),
            returns: round2(returns),
            returns_percent: round2(returns_percent(returns, invested_value)),
        });
    }

    let total_returns = total_current - total_invested;
    PortfolioValue {
        holdings: values,
        summary: PortfolioSummary {
            total_invested: round2(total_invested),
            total_current: round2(total_current),
            total_returns: round2(total_returns),
            total_returns_percent: round2(returns_percent(total_returns, total_invested)),
        },
    }
}
