// 📈 Lifestyle Inflation - first half vs second half of the long window
//
// Only meaningful for windows of 180 days or more. Shorter windows get a
// record flagged insufficient with every number zeroed.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::income::LARGE_DEPOSIT_THRESHOLD;
use super::to_map;
use super::window::WINDOW_LONG_DAYS;
use crate::entities::{chronological, Transaction};

/// Category fragments counted as discretionary spend
pub const DISCRETIONARY_CATEGORIES: [&str; 7] = [
    "entertainment",
    "dining",
    "recreation",
    "shopping",
    "travel",
    "food and drink",
    "personal care",
];

/// Percent change beyond which the discretionary trend is not "stable"
pub const TREND_THRESHOLD_PERCENT: f64 = 10.0;

/// Minimum transactions per half for the comparison to count
pub const MIN_TRANSACTIONS_PER_HALF: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifestyleTrend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl LifestyleTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifestyleTrend::Increasing => "increasing",
            LifestyleTrend::Decreasing => "decreasing",
            LifestyleTrend::Stable => "stable",
            LifestyleTrend::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifestyleSignals {
    pub income_change_percent: f64,
    pub savings_rate_change_percent: f64,
    pub discretionary_spending_trend: LifestyleTrend,
    pub income_first_half: f64,
    pub income_second_half: f64,
    pub savings_rate_first_half: f64,
    pub savings_rate_second_half: f64,
    pub discretionary_first_half: f64,
    pub discretionary_second_half: f64,
    pub window_days: u32,
    pub sufficient_data: bool,
}

impl LifestyleSignals {
    fn insufficient(window_days: u32) -> Self {
        LifestyleSignals {
            income_change_percent: 0.0,
            savings_rate_change_percent: 0.0,
            discretionary_spending_trend: LifestyleTrend::InsufficientData,
            income_first_half: 0.0,
            income_second_half: 0.0,
            savings_rate_first_half: 0.0,
            savings_rate_second_half: 0.0,
            discretionary_first_half: 0.0,
            discretionary_second_half: 0.0,
            window_days,
            sufficient_data: false,
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        to_map(self)
    }
}

/// Income heuristic without the payroll-keyword rule
fn is_income_like(transaction: &Transaction) -> bool {
    transaction.is_inflow()
        && (transaction.category_contains("income")
            || transaction.amount.abs() >= LARGE_DEPOSIT_THRESHOLD)
}

/// Category matching treats `_` as a space, so FOOD_AND_DRINK counts
fn is_discretionary(transaction: &Transaction) -> bool {
    let matches = |category: &str| {
        let normalized = category.to_lowercase().replace('_', " ");
        DISCRETIONARY_CATEGORIES
            .iter()
            .any(|needle| normalized.contains(needle))
    };
    matches(&transaction.category_primary)
        || transaction
            .category_detailed
            .as_deref()
            .map(matches)
            .unwrap_or(false)
}

/// `first + (last - first) / 2`; None for an empty set
fn temporal_midpoint(sorted: &[&Transaction]) -> Option<NaiveDateTime> {
    let first = sorted.first()?.date.and_hms_opt(0, 0, 0)?;
    let last = sorted.last()?.date.and_hms_opt(0, 0, 0)?;
    Some(first + (last - first) / 2)
}

/// Split at the midpoint; a transaction on the midpoint belongs to the first half
fn split_at<'a>(
    transactions: &[&'a Transaction],
    midpoint: NaiveDateTime,
) -> (Vec<&'a Transaction>, Vec<&'a Transaction>) {
    transactions.iter().copied().partition(|t| {
        t.date
            .and_hms_opt(0, 0, 0)
            .map(|at| at <= midpoint)
            .unwrap_or(true)
    })
}

fn income_of(half: &[&Transaction]) -> f64 {
    half.iter()
        .filter(|t| is_income_like(t))
        .map(|t| t.amount.abs())
        .sum()
}

fn savings_rate(income: f64, savings_half: &[&Transaction]) -> f64 {
    if income == 0.0 {
        return 0.0;
    }
    let net_inflow = -savings_half.iter().map(|t| t.amount).sum::<f64>();
    net_inflow / income * 100.0
}

fn discretionary_of(half: &[&Transaction]) -> f64 {
    half.iter()
        .filter(|t| t.is_expense() && is_discretionary(t))
        .map(|t| t.amount)
        .sum()
}

fn classify_trend(first: f64, second: f64) -> LifestyleTrend {
    if first == 0.0 {
        return LifestyleTrend::InsufficientData;
    }
    let change = (second - first) / first * 100.0;
    if change > TREND_THRESHOLD_PERCENT {
        LifestyleTrend::Increasing
    } else if change < -TREND_THRESHOLD_PERCENT {
        LifestyleTrend::Decreasing
    } else {
        LifestyleTrend::Stable
    }
}

/// `transactions` is the whole long-window set; `savings_transactions` the
/// subset on savings-like accounts. Both are split at the midpoint of the
/// whole set so the halves cover the same calendar span.
pub fn detect_lifestyle_inflation(
    transactions: &[Transaction],
    savings_transactions: &[Transaction],
    window_days: u32,
) -> LifestyleSignals {
    if window_days < WINDOW_LONG_DAYS {
        return LifestyleSignals::insufficient(window_days);
    }

    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| chronological(a, b));

    let midpoint = match temporal_midpoint(&sorted) {
        Some(midpoint) => midpoint,
        None => return LifestyleSignals::insufficient(window_days),
    };

    let (first_half, second_half) = split_at(&sorted, midpoint);
    let savings: Vec<&Transaction> = savings_transactions.iter().collect();
    let (savings_first, savings_second) = split_at(&savings, midpoint);

    let income_first = income_of(&first_half);
    let income_second = income_of(&second_half);
    let income_change = if income_first > 0.0 {
        (income_second - income_first) / income_first * 100.0
    } else {
        0.0
    };

    let rate_first = savings_rate(income_first, &savings_first);
    let rate_second = savings_rate(income_second, &savings_second);

    let discretionary_first = discretionary_of(&first_half);
    let discretionary_second = discretionary_of(&second_half);

    LifestyleSignals {
        income_change_percent: income_change,
        savings_rate_change_percent: rate_second - rate_first,
        discretionary_spending_trend: classify_trend(discretionary_first, discretionary_second),
        income_first_half: income_first,
        income_second_half: income_second,
        savings_rate_first_half: rate_first,
        savings_rate_second_half: rate_second,
        discretionary_first_half: discretionary_first,
        discretionary_second_half: discretionary_second,
        window_days,
        sufficient_data: income_first > 0.0
            && income_second > 0.0
            && first_half.len() >= MIN_TRANSACTIONS_PER_HALF
            && second_half.len() >= MIN_TRANSACTIONS_PER_HALF,
    }
}

// ============================================================================
// TESTS
// ============================================================================
