// 💰 Savings Behavior - net inflow, growth, emergency-fund coverage

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stats::{avg_monthly_expenses, ratio_or_zero};
use super::to_map;
use crate::entities::{Account, Transaction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsSignals {
    /// Money moved into savings-like accounts during the window (negative amounts there are deposits)
    pub net_inflow: f64,
    pub growth_rate_percent: f64,
    pub emergency_fund_months: f64,
    pub total_savings_balance: f64,
    pub avg_monthly_expenses: f64,
    pub window_days: u32,
}

impl SavingsSignals {
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        to_map(self)
    }
}

pub fn calculate_savings_behavior(
    savings_accounts: &[&Account],
    savings_transactions: &[Transaction],
    all_transactions: &[Transaction],
    window_days: u32,
) -> SavingsSignals {
    let total_savings_balance: f64 = savings_accounts.iter().map(|a| a.balance_current).sum();
    let net_inflow = -savings_transactions.iter().map(|t| t.amount).sum::<f64>();

    // Work back from today's balance to the balance at window start
    let starting_balance = total_savings_balance - net_inflow;
    let growth_rate_percent = if starting_balance > 0.0 {
        net_inflow / starting_balance * 100.0
    } else if net_inflow > 0.0 {
        100.0
    } else {
        0.0
    };

    let monthly_expenses = avg_monthly_expenses(all_transactions, window_days);

    SavingsSignals {
        net_inflow,
        growth_rate_percent,
        emergency_fund_months: ratio_or_zero(total_savings_balance, monthly_expenses),
        total_savings_balance,
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
    use chrono::NaiveDate;

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn test_growth_from_existing_balance() {
        let savings = Account::new("sav_1", "u1", AccountType::Savings, 10_200.0);
        let deposits = vec![
            Transaction::new("s1", "sav_1", d(), -150.0, None, "TRANSFER_IN"),
            Transaction::new("s2", "sav_1", d(), -100.0, None, "TRANSFER_IN"),
            Transaction::new("s3", "sav_1", d(), 50.0, None, "TRANSFER_OUT"),
        ];
        let mut all = deposits.clone();
        all.push(Transaction::new("rent", "chk_1", d(), 2040.0, None, "RENT"));

        let signals = calculate_savings_behavior(&[&savings], &deposits, &all, 30);

        assert_eq!(signals.net_inflow, 200.0);
        assert!((signals.growth_rate_percent - 2.0).abs() < 1e-9);
        // 2040 + 50 of expenses
        assert!((signals.avg_monthly_expenses - 2090.0).abs() < 1e-9);
        assert!((signals.emergency_fund_months - 10_200.0 / 2090.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_from_zero_start() {
        let savings = Account::new("sav_1", "u1", AccountType::Savings, 300.0);
        let deposits = vec![Transaction::new("s1", "sav_1", d(), -300.0, None, "TRANSFER_IN")];

        let signals = calculate_savings_behavior(&[&savings], &deposits, &deposits, 30);

        assert_eq!(signals.growth_rate_percent, 100.0);
        assert_eq!(signals.emergency_fund_months, 0.0);
    }

    #[test]
    fn test_no_savings_accounts() {
        let signals = calculate_savings_behavior(&[], &[], &[], 180);

        assert_eq!(signals.net_inflow, 0.0);
        assert_eq!(signals.growth_rate_percent, 0.0);
        assert_eq!(signals.total_savings_balance, 0.0);
        assert_eq!(signals.to_map()["window_days"], Value::from(180));
    }
}
