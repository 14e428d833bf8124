// 🔁 Subscription Detection - recurring merchants and their share of spend
//
// Candidates come from the requested window, recurrence is verified over a
// fixed 90-day lookback, and spend is summed from the requested window only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::stats::{day_gaps, normalize_to_month, ratio_or_zero};
use super::to_map;
use crate::entities::Transaction;

/// Minimum expense occurrences inside the lookback
pub const MIN_OCCURRENCES: usize = 3;

/// Share of individual gaps that must sit inside the matched band
pub const CADENCE_CONSISTENCY: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    Biweekly,
    Monthly,
}

impl Cadence {
    /// (cadence, target gap days, tolerance days), in test order
    const BANDS: [(Cadence, f64, f64); 3] = [
        (Cadence::Weekly, 7.0, 3.0),
        (Cadence::Biweekly, 14.0, 4.0),
        (Cadence::Monthly, 30.0, 7.0),
    ];

    /// First band whose tolerance holds for the average gap AND for at least
    /// 70% of the individual gaps
    pub fn detect(gaps: &[i64]) -> Option<Cadence> {
        if gaps.is_empty() {
            return None;
        }
        let gaps: Vec<f64> = gaps.iter().map(|g| *g as f64).collect();
        let avg_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;

        for (cadence, target, tolerance) in Self::BANDS {
            if (avg_gap - target).abs() > tolerance {
                continue;
            }
            let within = gaps
                .iter()
                .filter(|gap| (*gap - target).abs() <= tolerance)
                .count();
            if within as f64 >= gaps.len() as f64 * CADENCE_CONSISTENCY {
                return Some(cadence);
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSignals {
    /// Sorted by merchant name
    pub recurring_merchants: Vec<String>,
    pub recurring_merchant_count: usize,
    pub monthly_recurring_spend: f64,
    pub subscription_share_percent: f64,
    pub total_spend: f64,
    pub window_days: u32,
}

impl SubscriptionSignals {
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        to_map(self)
    }
}

/// `lookback` is the history inside the 90-day lookback; `None` verifies
/// recurrence against the window itself.
pub fn detect_subscriptions(
    window_transactions: &[Transaction],
    window_days: u32,
    lookback: Option<&[Transaction]>,
) -> SubscriptionSignals {
    let expenses: Vec<&Transaction> = window_transactions
        .iter()
        .filter(|t| t.is_expense())
        .collect();
    let total_spend: f64 = expenses.iter().map(|t| t.amount).sum();

    // Merchant names are compared exactly
    let mut window_by_merchant: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for tx in expenses.iter().copied() {
        if let Some(merchant) = tx.merchant_name.as_deref() {
            window_by_merchant.entry(merchant).or_default().push(tx);
        }
    }

    let history = lookback.unwrap_or(window_transactions);
    let mut lookback_by_merchant: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for tx in history.iter().filter(|t| t.is_expense()) {
        if let Some(merchant) = tx.merchant_name.as_deref() {
            if window_by_merchant.contains_key(merchant) {
                lookback_by_merchant.entry(merchant).or_default().push(tx);
            }
        }
    }

    let mut recurring_merchants = Vec::new();
    let mut recurring_spend = 0.0;

    for (merchant, window_txs) in &window_by_merchant {
        let occurrences = match lookback_by_merchant.get(merchant) {
            Some(txs) if txs.len() >= MIN_OCCURRENCES => txs,
            _ => continue,
        };
        if let Some(cadence) = Cadence::detect(&day_gaps(occurrences)) {
            debug!(merchant, ?cadence, "recurring merchant");
            recurring_merchants.push(merchant.to_string());
            recurring_spend += window_txs.iter().map(|t| t.amount).sum::<f64>();
        }
    }

    SubscriptionSignals {
        recurring_merchant_count: recurring_merchants.len(),
        recurring_merchants,
        monthly_recurring_spend: normalize_to_month(recurring_spend, window_days),
        subscription_share_percent: ratio_or_zero(recurring_spend, total_spend) * 100.0,
        total_spend,
        window_days,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    fn charge(id: &str, offset: i64, amount: f64, merchant: &str) -> Transaction {
        Transaction::new(
            id,
            "cc_1",
            start() + Duration::days(offset),
            amount,
            Some(merchant),
            "ENTERTAINMENT",
        )
    }

    #[test]
    fn test_cadence_bands() {
        assert_eq!(Cadence::detect(&[7, 7, 8]), Some(Cadence::Weekly));
        assert_eq!(Cadence::detect(&[14, 13, 15]), Some(Cadence::Biweekly));
        assert_eq!(Cadence::detect(&[30, 31, 28]), Some(Cadence::Monthly));
        assert_eq!(Cadence::detect(&[3, 60]), None);
        assert_eq!(Cadence::detect(&[]), None);
    }

    #[test]
    fn test_cadence_needs_seventy_percent_of_gaps_in_band() {
        // average 30 but only 2 of 4 gaps within 30±7
        assert_eq!(Cadence::detect(&[20, 40, 30, 30]), None);
        // 3 of 4 within band
        assert_eq!(Cadence::detect(&[30, 30, 30, 38]), Some(Cadence::Monthly));
    }

    #[test]
    fn test_three_monthly_merchants_share_of_spend() {
        let mut txs = Vec::new();
        for (merchant, amount) in [("StreamCo", 20.0), ("MusicBox", 30.0), ("GymPass", 45.0)] {
            for i in 0..3 {
                txs.push(charge(&format!("{}_{}", merchant, i), i * 30, amount, merchant));
            }
        }
        // 665 of one-off spend brings the window total to 950
        for (i, amount) in [300.0, 200.0, 165.0].iter().enumerate() {
            txs.push(charge(&format!("misc_{}", i), 5 + i as i64, *amount, &format!("Shop {}", i)));
        }

        let signals = detect_subscriptions(&txs, 90, None);

        assert_eq!(signals.recurring_merchant_count, 3);
        assert_eq!(signals.recurring_merchants, vec!["GymPass", "MusicBox", "StreamCo"]);
        assert!((signals.total_spend - 950.0).abs() < 1e-9);
        let expected_share = (20.0 + 30.0 + 45.0) * 3.0 / 950.0 * 100.0;
        assert!((signals.subscription_share_percent - expected_share).abs() < 1e-9);
        assert!((signals.monthly_recurring_spend - 95.0).abs() < 1e-9);

        println!("✅ Subscription share PASSED");
    }

    #[test]
    fn test_two_occurrences_never_recurring() {
        let txs = vec![charge("a", 0, 15.0, "StreamCo"), charge("b", 30, 15.0, "StreamCo")];
        let signals = detect_subscriptions(&txs, 90, None);

        assert_eq!(signals.recurring_merchant_count, 0);
        assert_eq!(signals.subscription_share_percent, 0.0);
    }

    #[test]
    fn test_lookback_verifies_recurrence_for_short_window() {
        let history = vec![
            charge("a", 0, 15.0, "StreamCo"),
            charge("b", 30, 15.0, "StreamCo"),
            charge("c", 60, 15.0, "StreamCo"),
        ];
        let window = vec![history[2].clone()];

        let without_lookback = detect_subscriptions(&window, 30, None);
        let with_lookback = detect_subscriptions(&window, 30, Some(&history));

        assert_eq!(without_lookback.recurring_merchant_count, 0);
        assert_eq!(with_lookback.recurring_merchant_count, 1);
        // spend counts the window charge only
        assert!((with_lookback.monthly_recurring_spend - 15.0).abs() < 1e-9);
        assert!((with_lookback.subscription_share_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_merchant_must_appear_in_window() {
        let history = vec![
            charge("a", 0, 15.0, "StreamCo"),
            charge("b", 30, 15.0, "StreamCo"),
            charge("c", 60, 15.0, "StreamCo"),
        ];
        let window = vec![charge("d", 70, 12.0, "Grocer")];
        let signals = detect_subscriptions(&window, 30, Some(&history));

        assert_eq!(signals.recurring_merchant_count, 0);
        assert_eq!(signals.total_spend, 12.0);
    }

    #[test]
    fn test_refunds_do_not_count() {
        let mut txs = vec![
            charge("a", 0, 10.0, "StreamCo"),
            charge("b", 30, 10.0, "StreamCo"),
        ];
        txs.push(charge("refund", 45, -10.0, "StreamCo"));
        let signals = detect_subscriptions(&txs, 90, None);

        assert_eq!(signals.recurring_merchant_count, 0);
        assert_eq!(signals.total_spend, 20.0);
        assert!(detect_subscriptions(&[], 30, None).recurring_merchants.is_empty());
    }
}
