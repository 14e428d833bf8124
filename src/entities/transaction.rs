// 💸 Transaction Entity
//
// Sign convention (load-bearing everywhere downstream):
//   amount < 0  → inflow / credit (paycheck, refund, card payment)
//   amount > 0  → outflow / expense

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub merchant_name: Option<String>,
    pub category_primary: String,
    pub category_detailed: Option<String>,
    pub pending: bool,
}

impl Transaction {
    pub fn new(
        transaction_id: &str,
        account_id: &str,
        date: NaiveDate,
        amount: f64,
        merchant_name: Option<&str>,
        category_primary: &str,
    ) -> Self {
        Transaction {
            transaction_id: transaction_id.to_string(),
            account_id: account_id.to_string(),
            date,
            amount,
            merchant_name: merchant_name.map(|m| m.to_string()),
            category_primary: category_primary.to_string(),
            category_detailed: None,
            pending: false,
        }
    }

    pub fn with_detailed_category(mut self, detailed: &str) -> Self {
        self.category_detailed = Some(detailed.to_string());
        self
    }

    pub fn is_inflow(&self) -> bool {
        self.amount < 0.0
    }

    pub fn is_expense(&self) -> bool {
        self.amount > 0.0
    }

    /// Case-insensitive match against primary OR detailed category
    pub fn category_contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        if self.category_primary.to_lowercase().contains(&needle) {
            return true;
        }
        self.category_detailed
            .as_deref()
            .map(|c| c.to_lowercase().contains(&needle))
            .unwrap_or(false)
    }

    /// Case-insensitive match against the merchant name
    pub fn merchant_contains(&self, needle: &str) -> bool {
        self.merchant_name
            .as_deref()
            .map(|m| m.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Sort key used everywhere transactions are replayed in time order
pub fn chronological(a: &Transaction, b: &Transaction) -> std::cmp::Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.transaction_id.cmp(&b.transaction_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_sign_convention() {
        let paycheck = Transaction::new("t1", "chk", date("2024-06-01"), -2000.0, Some("ACME Payroll"), "INCOME");
        let coffee = Transaction::new("t2", "chk", date("2024-06-02"), 4.5, Some("Cafe"), "FOOD_AND_DRINK");

        assert!(paycheck.is_inflow());
        assert!(!paycheck.is_expense());
        assert!(coffee.is_expense());
    }

    #[test]
    fn test_category_contains_checks_both_fields() {
        let tx = Transaction::new("t1", "chk", date("2024-06-01"), -800.0, None, "TRANSFER_IN")
            .with_detailed_category("INCOME_WAGES");

        assert!(tx.category_contains("income"));
        assert!(tx.category_contains("transfer"));
        assert!(!tx.category_contains("dining"));
    }

    #[test]
    fn test_chronological_order_is_total() {
        let mut txs = vec![
            Transaction::new("b", "chk", date("2024-06-02"), 1.0, None, "X"),
            Transaction::new("a", "chk", date("2024-06-02"), 1.0, None, "X"),
            Transaction::new("c", "chk", date("2024-06-01"), 1.0, None, "X"),
        ];
        txs.sort_by(chronological);
        let ids: Vec<&str> = txs.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
