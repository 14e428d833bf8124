// 💵 Income Stability - payroll detection, pay cadence, cash-flow buffer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::stats::{avg_monthly_expenses, day_gaps, median, ratio_or_zero, sample_stdev};
use super::to_map;
use crate::entities::{Account, Transaction};

/// Merchant-name fragments that mark a deposit as payroll
pub const PAYROLL_KEYWORDS: [&str; 4] = ["payroll", "direct dep", "salary", "employer"];

/// Any inflow at least this large counts as income
pub const LARGE_DEPOSIT_THRESHOLD: f64 = 500.0;

// ============================================================================
// PAYMENT FREQUENCY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentFrequency {
    Weekly,
    Biweekly,
    Monthly,
    #[serde(rename = "semi-monthly")]
    SemiMonthly,
    Variable,
}

impl PaymentFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentFrequency::Weekly => "weekly",
            PaymentFrequency::Biweekly => "biweekly",
            PaymentFrequency::Monthly => "monthly",
            PaymentFrequency::SemiMonthly => "semi-monthly",
            PaymentFrequency::Variable => "variable",
        }
    }

    /// Bands are tested in this order. Biweekly (12-18) is checked before
    /// semi-monthly (13-17), so semi-monthly never wins.
    pub fn from_median_gap(median_gap_days: f64) -> Option<Self> {
        let bands: [(f64, f64, PaymentFrequency); 4] = [
            (5.0, 10.0, PaymentFrequency::Weekly),
            (12.0, 18.0, PaymentFrequency::Biweekly),
            (25.0, 35.0, PaymentFrequency::Monthly),
            (13.0, 17.0, PaymentFrequency::SemiMonthly),
        ];
        for (low, high, frequency) in bands {
            if low <= median_gap_days && median_gap_days <= high {
                return Some(frequency);
            }
        }
        if median_gap_days > 45.0 {
            return Some(PaymentFrequency::Variable);
        }
        None
    }
}

// ============================================================================
// SIGNALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeSignals {
    pub payroll_detected: bool,
    pub payment_frequency: Option<PaymentFrequency>,
    pub median_pay_gap_days: f64,

    /// Sample stdev of pay gaps (lower = more stable)
    pub payment_variability: f64,
    pub cash_flow_buffer_months: f64,
    pub num_income_deposits: usize,
    pub total_income: f64,
    pub avg_monthly_expenses: f64,
    pub window_days: u32,
}

impl IncomeSignals {
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        to_map(self)
    }
}

/// Inflow whose category says income, whose merchant looks like an employer,
/// or that is simply large. The size rule also catches one-off deposits.
pub fn is_payroll_deposit(transaction: &Transaction) -> bool {
    if !transaction.is_inflow() {
        return false;
    }
    transaction.category_contains("income")
        || PAYROLL_KEYWORDS
            .iter()
            .any(|keyword| transaction.merchant_contains(keyword))
        || transaction.amount.abs() >= LARGE_DEPOSIT_THRESHOLD
}

pub fn calculate_income_stability(
    checking_accounts: &[&Account],
    transactions: &[Transaction],
    window_days: u32,
) -> IncomeSignals {
    let deposits: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| is_payroll_deposit(t))
        .collect();

    let total_income: f64 = deposits.iter().map(|t| t.amount.abs()).sum();

    let mut median_gap = 0.0;
    let mut variability = 0.0;
    let mut frequency = None;

    if deposits.len() >= 2 {
        // Same-day deposits are one payday, not a zero-day cadence
        let gaps: Vec<f64> = day_gaps(&deposits)
            .into_iter()
            .filter(|gap| *gap > 0)
            .map(|gap| gap as f64)
            .collect();

        if !gaps.is_empty() {
            median_gap = median(&gaps);
            variability = sample_stdev(&gaps);
            frequency = PaymentFrequency::from_median_gap(median_gap);
        }
    }

    let checking_balance: f64 = checking_accounts
        .iter()
        .map(|a| a.available_or_current())
        .sum();
    let monthly_expenses = avg_monthly_expenses(transactions, window_days);
    let buffer = ratio_or_zero(checking_balance, monthly_expenses);

    debug!(
        window_days,
        deposits = deposits.len(),
        median_gap,
        buffer,
        "income stability computed"
    );

    IncomeSignals {
        payroll_detected: !deposits.is_empty(),
        payment_frequency: frequency,
        median_pay_gap_days: median_gap,
        payment_variability: variability,
        cash_flow_buffer_months: buffer,
        num_income_deposits: deposits.len(),
        total_income,
        avg_monthly_expenses: monthly_expenses,
        window_days,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::AccountType;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    fn deposit(id: &str, offset: i64, amount: f64, merchant: &str) -> Transaction {
        Transaction::new(
            id,
            "chk_1",
            start() + Duration::days(offset),
            -amount,
            Some(merchant),
            "TRANSFER_IN",
        )
    }

    #[test]
    fn test_payroll_detection_rules() {
        let d = start();
        let by_category = Transaction::new("1", "chk", d, -120.0, None, "INCOME");
        let by_merchant = Transaction::new("2", "chk", d, -120.0, Some("ACME DIRECT DEP"), "TRANSFER_IN");
        let by_size = Transaction::new("3", "chk", d, -500.0, Some("Venmo"), "TRANSFER_IN");
        let small_refund = Transaction::new("4", "chk", d, -40.0, Some("Store"), "GENERAL");
        let big_expense = Transaction::new("5", "chk", d, 900.0, Some("Payroll Services"), "INCOME");

        assert!(is_payroll_deposit(&by_category));
        assert!(is_payroll_deposit(&by_merchant));
        assert!(is_payroll_deposit(&by_size));
        assert!(!is_payroll_deposit(&small_refund));
        assert!(!is_payroll_deposit(&big_expense));
    }

    #[test]
    fn test_biweekly_payroll_over_ninety_days() {
        let txs: Vec<Transaction> = (0..6)
            .map(|i| deposit(&format!("pay_{}", i), i * 14, 2000.0, "ACME Payroll"))
            .collect();

        let signals = calculate_income_stability(&[], &txs, 90);

        assert!(signals.payroll_detected);
        assert_eq!(signals.num_income_deposits, 6);
        assert_eq!(signals.payment_frequency, Some(PaymentFrequency::Biweekly));
        assert!((signals.median_pay_gap_days - 14.0).abs() < 1e-9);
        assert_eq!(signals.payment_variability, 0.0);
        assert_eq!(signals.total_income, 12_000.0);

        println!("✅ Biweekly payroll detection PASSED");
    }

    #[test]
    fn test_same_day_deposits_do_not_create_zero_gaps() {
        let txs = vec![
            deposit("a", 0, 1000.0, "Employer Inc"),
            deposit("b", 0, 1000.0, "Employer Inc"),
            deposit("c", 30, 1000.0, "Employer Inc"),
        ];
        let signals = calculate_income_stability(&[], &txs, 180);

        assert_eq!(signals.median_pay_gap_days, 30.0);
        assert_eq!(signals.payment_variability, 0.0);
        assert_eq!(signals.payment_frequency, Some(PaymentFrequency::Monthly));
    }

    #[test]
    fn test_frequency_bands_in_declared_order() {
        assert_eq!(PaymentFrequency::from_median_gap(7.0), Some(PaymentFrequency::Weekly));
        assert_eq!(PaymentFrequency::from_median_gap(15.0), Some(PaymentFrequency::Biweekly));
        assert_eq!(PaymentFrequency::from_median_gap(13.0), Some(PaymentFrequency::Biweekly));
        assert_eq!(PaymentFrequency::from_median_gap(30.0), Some(PaymentFrequency::Monthly));
        assert_eq!(PaymentFrequency::from_median_gap(11.0), None);
        assert_eq!(PaymentFrequency::from_median_gap(45.0), None);
        assert_eq!(PaymentFrequency::from_median_gap(45.5), Some(PaymentFrequency::Variable));
    }

    #[test]
    fn test_cash_flow_buffer() {
        let checking = Account::new("chk_1", "u1", AccountType::Checking, 1500.0).with_available(1200.0);
        let d = start();
        let txs = vec![
            Transaction::new("rent", "chk_1", d, 1000.0, Some("Landlord"), "RENT"),
            Transaction::new("food", "chk_1", d, 200.0, Some("Grocer"), "FOOD_AND_DRINK"),
        ];

        let signals = calculate_income_stability(&[&checking], &txs, 30);

        assert_eq!(signals.avg_monthly_expenses, 1200.0);
        assert_eq!(signals.cash_flow_buffer_months, 1.0);
        assert!(!signals.payroll_detected);
        assert_eq!(signals.payment_frequency, None);
    }

    #[test]
    fn test_to_map_serializes_frequency_names() {
        let txs = vec![
            deposit("a", 0, 900.0, "X"),
            deposit("b", 60, 900.0, "X"),
        ];
        let map = calculate_income_stability(&[], &txs, 180).to_map();

        assert_eq!(map["payment_frequency"], Value::from("variable"));
        assert_eq!(map["num_income_deposits"], Value::from(2));
        assert_eq!(
            serde_json::to_value(PaymentFrequency::SemiMonthly).unwrap(),
            Value::from("semi-monthly")
        );
    }
}
