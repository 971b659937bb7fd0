//! Fund records served by the API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Current state of a fund. Replaced wholesale on refresh, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSnapshot {
    pub symbol: String,
    pub name: String,
    pub fund_family: Option<String>,
    pub category: Option<String>,
    pub nav: f64,
    pub previous_close: Option<f64>,
    pub day_change: Option<f64>,
    pub day_change_percent: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub total_assets: Option<f64>,
    pub currency: String,
    pub ytd_return: Option<f64>,
    pub one_year_return: Option<f64>,
    pub three_year_return: Option<f64>,
    pub five_year_return: Option<f64>,
    /// Set when the figures were synthesized from the reference table.
    pub is_fallback: bool,
}

/// A single daily NAV observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: NaiveDate,
    pub nav: f64,
}

/// A snapshot enriched with its NAV history and the trailing returns
/// derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundDetail {
    #[serde(flatten)]
    pub snapshot: FundSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_month_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub three_month_return: Option<f64>,
    pub historical_data: Vec<HistoricalPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavSummary {
    pub symbol: String,
    pub name: String,
    pub nav: f64,
    pub previous_close: Option<f64>,
    pub day_change: Option<f64>,
    pub day_change_percent: Option<f64>,
}

impl From<&FundSnapshot> for NavSummary {
    fn from(snapshot: &FundSnapshot) -> Self {
        NavSummary {
            symbol: snapshot.symbol.clone(),
            name: snapshot.name.clone(),
            nav: snapshot.nav,
            previous_close: snapshot.previous_close,
            day_change: snapshot.day_change,
            day_change_percent: snapshot.day_change_percent,
        }
    }
}

/// Lightweight search hit, built from the reference table alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub symbol: String,
    pub name: String,
    pub category: Option<String>,
    pub fund_family: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATEGORIES: [CategoryDescriptor; 6] = [
    CategoryDescriptor {
        id: "large-cap",
        name: "Large Cap",
        description: "Invest in top 100 companies by market cap",
    },
    CategoryDescriptor {
        id: "mid-cap",
        name: "Mid Cap",
        description: "Invest in 101-250 companies by market cap",
    },
    CategoryDescriptor {
        id: "small-cap",
        name: "Small Cap",
        description: "Invest in companies beyond top 250",
    },
    CategoryDescriptor {
        id: "flexi-cap",
        name: "Flexi Cap",
        description: "Flexible allocation across market caps",
    },
    CategoryDescriptor {
        id: "elss",
        name: "ELSS",
        description: "Tax saving funds with 3-year lock-in",
    },
    CategoryDescriptor {
        id: "index-fund",
        name: "Index Fund",
        description: "Track market indices like Nifty 50",
    },
];
