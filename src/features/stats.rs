// 📐 Shared statistics for the analyzers
//
// Everything here is total: empty inputs give 0.0, never NaN.

use crate::entities::{chronological, Transaction};

/// Expenses at or above this are treated as one-off transfers and ignored
pub const LARGE_EXPENSE_CUTOFF: f64 = 10_000.0;

/// Median; even counts average the two middle values
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); 0 with fewer than two values
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Day gaps between consecutive transactions in date order
pub fn day_gaps(transactions: &[&Transaction]) -> Vec<i64> {
    let mut sorted: Vec<&Transaction> = transactions.to_vec();
    sorted.sort_by(|a, b| chronological(a, b));
    sorted
        .windows(2)
        .map(|pair| (pair[1].date - pair[0].date).num_days())
        .collect()
}

/// Expenses (0 < amount < cutoff) normalized to a 30-day month
pub fn avg_monthly_expenses(transactions: &[Transaction], window_days: u32) -> f64 {
    if window_days == 0 {
        return 0.0;
    }
    let total: f64 = transactions
        .iter()
        .filter(|t| t.amount > 0.0 && t.amount < LARGE_EXPENSE_CUTOFF)
        .map(|t| t.amount)
        .sum();
    normalize_to_month(total, window_days)
}

/// Scale an amount observed over `window_days` to a 30-day basis
pub fn normalize_to_month(amount: f64, window_days: u32) -> f64 {
    if window_days == 0 {
        return 0.0;
    }
    amount / f64::from(window_days) * 30.0
}

/// `numerator / denominator`, or 0 when the denominator is not positive
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
