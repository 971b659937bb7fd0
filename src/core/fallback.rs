//! Synthetic snapshots built from the reference table.

use rand::Rng;

use crate::core::analytics::round2;
use crate::core::fund::FundSnapshot;
use crate::core::reference::ReferenceEntry;

/// Maximum relative jitter applied to the reference NAV.
const NAV_JITTER: f64 = 0.02;
/// Bounds of the synthetic day change, in percent.
const DAY_CHANGE_PERCENT: f64 = 2.0;
const EXPENSE_RATIO_RANGE: (f64, f64) = (0.5, 2.0);
/// Share of the one-year return reported as year-to-date.
const YTD_SHARE_OF_ONE_YEAR: f64 = 0.3;

/// Builds a plausible snapshot for `entry` with randomized NAV, day change
/// and expense ratio. The result is always flagged `is_fallback`.
pub fn synthesize<R: Rng>(entry: &ReferenceEntry, rng: &mut R) -> FundSnapshot {
    let nav = entry.fallback_nav * (1.0 + rng.random_range(-NAV_JITTER..=NAV_JITTER));
    let change_percent = rng.random_range(-DAY_CHANGE_PERCENT..=DAY_CHANGE_PERCENT);
    let change = nav * change_percent / 100.0;
    let expense_ratio = rng.random_range(EXPENSE_RATIO_RANGE.0..=EXPENSE_RATIO_RANGE.1);
    let ytd_return = entry
        .one_year_return
        .map(|r| (r * YTD_SHARE_OF_ONE_YEAR * 10.0).round() / 10.0);

    FundSnapshot {
        symbol: entry.symbol.clone(),
        name: entry.name.clone(),
        fund_family: Some(entry.family.clone()),
        category: Some(entry.category.clone()),
        nav: round2(nav),
        previous_close: Some(round2(nav - change)),
        day_change: Some(round2(change)),
        day_change_percent: Some(round2(change_percent)),
        expense_ratio: Some(round2(expense_ratio)),
        total_assets: None,
        currency: "INR".to_string(),
        ytd_return,
        one_year_return: entry.one_year_return,
        three_year_return: entry.three_year_return,
        five_year_return: entry.five_year_return,
        is_fallback: true,
    }
}
