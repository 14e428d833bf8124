// 🧮 Signal Bundle Builder - every analyzer, one window, one user
//
// A bundle is a pure function of the snapshot, the window size and the
// reference time. Nothing is cached; callers rebuild per request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::credit::{calculate_credit_utilization, CreditSignals};
use super::income::{calculate_income_stability, IncomeSignals};
use super::lifestyle::{detect_lifestyle_inflation, LifestyleSignals};
use super::loans::{calculate_loan_signals, monthly_income_from, LoanSignals};
use super::savings::{calculate_savings_behavior, SavingsSignals};
use super::subscriptions::{detect_subscriptions, SubscriptionSignals};
use super::window::{
    TimeWindow, SUBSCRIPTION_LOOKBACK_DAYS, WINDOW_LONG_DAYS, WINDOW_SHORT_DAYS,
};
use crate::entities::{Account, AccountType, Liability, Transaction};

// ============================================================================
// USER SNAPSHOT
// ============================================================================

/// Everything the analyzers read for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub liabilities: Vec<Liability>,
}

impl UserSnapshot {
    pub fn new(user_id: &str) -> Self {
        UserSnapshot {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    fn accounts_where(&self, keep: impl Fn(&AccountType) -> bool) -> Vec<&Account> {
        self.accounts
            .iter()
            .filter(|a| keep(&a.account_type))
            .collect()
    }
}

// ============================================================================
// SIGNAL BUNDLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub user_id: String,
    pub window_days: u32,

    /// The reference time the window ends at
    pub calculated_at: DateTime<Utc>,
    pub income: IncomeSignals,
    pub subscriptions: SubscriptionSignals,

    /// Long window only
    pub lifestyle: Option<LifestyleSignals>,
    pub savings: SavingsSignals,
    pub credit: CreditSignals,
    pub loans: LoanSignals,
}

impl SignalBundle {
    /// Dotted keys (`income.payroll_detected`, `credit.utilizations.cc_1`)
    pub fn to_flat_map(&self) -> BTreeMap<String, Value> {
        let mut flat = BTreeMap::new();
        if let Ok(value) = serde_json::to_value(self) {
            flatten_into("", &value, &mut flat);
        }
        flat
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!(
                "Signal Summary for {} ({}d window)",
                self.user_id, self.window_days
            ),
            "=".repeat(70),
            "📊 Subscriptions:".to_string(),
            format!(
                "  - Recurring merchants: {}",
                self.subscriptions.recurring_merchant_count
            ),
            format!(
                "  - Monthly recurring spend: ${:.2}",
                self.subscriptions.monthly_recurring_spend
            ),
            format!(
                "  - Subscription share: {:.1}%",
                self.subscriptions.subscription_share_percent
            ),
            "💰 Savings:".to_string(),
            format!("  - Net inflow: ${:.2}", self.savings.net_inflow),
            format!("  - Growth rate: {:.1}%", self.savings.growth_rate_percent),
            format!(
                "  - Emergency fund: {:.1} months",
                self.savings.emergency_fund_months
            ),
            "💳 Credit:".to_string(),
            format!("  - Cards: {}", self.credit.num_credit_cards),
            format!(
                "  - Max utilization: {:.1}%",
                self.credit.max_utilization_percent
            ),
            format!(
                "  - Flags: 30%={}, 50%={}, 80%={}",
                self.credit.flag_30_percent, self.credit.flag_50_percent, self.credit.flag_80_percent
            ),
            format!("  - Overdue: {}", self.credit.is_overdue),
            "💵 Income:".to_string(),
            format!("  - Payroll detected: {}", self.income.payroll_detected),
            format!(
                "  - Frequency: {}",
                self.income
                    .payment_frequency
                    .map(|f| f.as_str())
                    .unwrap_or("unknown")
            ),
            format!(
                "  - Cash buffer: {:.1} months",
                self.income.cash_flow_buffer_months
            ),
            "🏠 Loans:".to_string(),
            format!(
                "  - Mortgage: {}, Student loan: {}",
                self.loans.has_mortgage, self.loans.has_student_loan
            ),
            format!(
                "  - Payment burden: {:.1}%",
                self.loans.loan_payment_burden_percent
            ),
        ];

        if let Some(lifestyle) = &self.lifestyle {
            lines.push("📈 Lifestyle:".to_string());
            lines.push(format!(
                "  - Income change: {:.1}%",
                lifestyle.income_change_percent
            ));
            lines.push(format!(
                "  - Savings rate change: {:.1}%",
                lifestyle.savings_rate_change_percent
            ));
            lines.push(format!(
                "  - Discretionary trend: {}",
                lifestyle.discretionary_spending_trend.as_str()
            ));
        }

        lines.join("\n")
    }
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(fields) if !fields.is_empty() => {
            for (key, nested) in fields {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&path, nested, out);
            }
        }
        _ => {
            out.insert(prefix.to_string(), value.clone());
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Run every analyzer for one window ending at `as_of`
pub fn build_signal_bundle(
    snapshot: &UserSnapshot,
    window_days: u32,
    as_of: DateTime<Utc>,
) -> SignalBundle {
    let window = TimeWindow::ending_at(window_days, as_of);
    let window_txs = window.filter(&snapshot.transactions);

    let checking = snapshot.accounts_where(|t| *t == AccountType::Checking);
    let savings_accounts = snapshot.accounts_where(AccountType::is_savings_like);
    let cards = snapshot.accounts_where(|t| *t == AccountType::CreditCard);

    let transactions_on = |accounts: &[&Account]| -> Vec<Transaction> {
        window_txs
            .iter()
            .filter(|t| accounts.iter().any(|a| a.account_id == t.account_id))
            .cloned()
            .collect()
    };
    let savings_txs = transactions_on(&savings_accounts);
    let card_txs = transactions_on(&cards);

    let lookback = TimeWindow::ending_at(SUBSCRIPTION_LOOKBACK_DAYS, as_of)
        .filter(&snapshot.transactions);

    let income = calculate_income_stability(&checking, &window_txs, window_days);
    let subscriptions = detect_subscriptions(&window_txs, window_days, Some(&lookback));
    let savings = calculate_savings_behavior(&savings_accounts, &savings_txs, &window_txs, window_days);
    let credit = calculate_credit_utilization(&cards, &snapshot.liabilities, &card_txs, window_days);
    let loans = calculate_loan_signals(
        &snapshot.accounts,
        &snapshot.liabilities,
        monthly_income_from(&income),
    );
    let lifestyle = (window_days >= WINDOW_LONG_DAYS)
        .then(|| detect_lifestyle_inflation(&window_txs, &savings_txs, window_days));

    debug!(
        user_id = %snapshot.user_id,
        window_days,
        transactions = window_txs.len(),
        "signal bundle built"
    );

    SignalBundle {
        user_id: snapshot.user_id.clone(),
        window_days,
        calculated_at: as_of,
        income,
        subscriptions,
        lifestyle,
        savings,
        credit,
        loans,
    }
}

/// Short and long bundles for the same reference time
pub fn build_signal_bundles(
    snapshot: &UserSnapshot,
    as_of: DateTime<Utc>,
) -> (SignalBundle, SignalBundle) {
    (
        build_signal_bundle(snapshot, WINDOW_SHORT_DAYS, as_of),
        build_signal_bundle(snapshot, WINDOW_LONG_DAYS, as_of),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LiabilityType;
    use crate::features::window::date_to_utc;
    use chrono::{Duration, NaiveDate};

    fn as_of() -> DateTime<Utc> {
        date_to_utc(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
    }

    fn days_ago(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap() - Duration::days(n)
    }

    fn snapshot() -> UserSnapshot {
        let mut s = UserSnapshot::new("user_1");
        s.accounts = vec![
            Account::new("chk_1", "user_1", AccountType::Checking, 3000.0),
            Account::new("sav_1", "user_1", AccountType::Savings, 5000.0),
            Account::new("cc_1", "user_1", AccountType::CreditCard, 1000.0).with_credit_limit(5000.0),
        ];
        s.liabilities = vec![Liability::new("l1", "cc_1", LiabilityType::CreditCard).with_minimum_payment(25.0)];

        for i in 0..12 {
            s.transactions.push(Transaction::new(
                &format!("pay_{}", i),
                "chk_1",
                days_ago(i * 14 + 1),
                -2000.0,
                Some("ACME Payroll"),
                "INCOME",
            ));
        }
        for (i, n) in [5, 35, 65, 95].iter().enumerate() {
            s.transactions.push(Transaction::new(
                &format!("stream_{}", i),
                "cc_1",
                days_ago(*n),
                15.0,
                Some("StreamCo"),
                "ENTERTAINMENT",
            ));
        }
        s.transactions.push(Transaction::new("save_1", "sav_1", days_ago(10), -250.0, None, "TRANSFER_IN"));
        s
    }

    #[test]
    fn test_bundle_windows_and_lifestyle_presence() {
        let (short, long) = build_signal_bundles(&snapshot(), as_of());

        assert_eq!(short.window_days, 30);
        assert!(short.lifestyle.is_none());
        assert_eq!(long.window_days, 180);
        assert!(long.lifestyle.is_some());
        assert_eq!(short.calculated_at, as_of());

        // days 1, 15, 29 fall in the short window
        assert_eq!(short.income.num_income_deposits, 3);
        assert_eq!(long.income.num_income_deposits, 12);
        assert_eq!(short.savings.net_inflow, 250.0);
    }

    #[test]
    fn test_short_window_uses_ninety_day_lookback_for_subscriptions() {
        let short = build_signal_bundle(&snapshot(), 30, as_of());

        // one StreamCo charge in the window, three inside 90 days
        assert_eq!(short.subscriptions.recurring_merchant_count, 1);
        assert!((short.subscriptions.monthly_recurring_spend - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_bundles_are_deterministic() {
        let snap = snapshot();
        let first = build_signal_bundles(&snap, as_of());
        let second = build_signal_bundles(&snap, as_of());

        assert_eq!(first, second);
        assert_eq!(first.1.to_flat_map(), second.1.to_flat_map());
    }

    #[test]
    fn test_flat_map_uses_dotted_keys() {
        let bundle = build_signal_bundle(&snapshot(), 30, as_of());
        let flat = bundle.to_flat_map();

        assert_eq!(flat["income.payroll_detected"], Value::Bool(true));
        assert_eq!(flat["credit.utilizations.cc_1"], Value::from(20.0));
        assert_eq!(flat["lifestyle"], Value::Null);
        assert_eq!(flat["window_days"], Value::from(30));
        assert!(flat.contains_key("loans.mortgage.balance"));
        assert!(flat.contains_key("subscriptions.recurring_merchants"));
    }

    #[test]
    fn test_summary_mentions_window() {
        let long = build_signal_bundle(&snapshot(), 180, as_of());
        let text = long.summary();

        assert!(text.contains("user_1 (180d window)"));
        assert!(text.contains("Lifestyle"));
        assert!(text.contains("Frequency: biweekly"));
    }

    #[test]
    fn test_empty_snapshot_is_total() {
        let bundle = build_signal_bundle(&UserSnapshot::new("nobody"), 30, as_of());

        assert!(!bundle.income.payroll_detected);
        assert_eq!(bundle.credit.num_credit_cards, 0);
        assert_eq!(bundle.subscriptions.total_spend, 0.0);
        assert!(!bundle.loans.has_mortgage);
    }
}
