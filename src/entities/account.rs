// 💳 Account Entity - owned by the storage layer, read by analyzers
//
// Only the fallback repair step ever writes accounts (see personas::fallback).
// Analyzers read balances and limits from whatever snapshot they are handed.

use serde::{Deserialize, Serialize};

// ============================================================================
// ACCOUNT TYPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Checking account (debit card, daily transactions, payroll lands here)
    Checking,

    /// Savings account (interest-bearing)
    Savings,

    /// Money market account
    MoneyMarket,

    /// Health savings account
    Hsa,

    /// Cash management account
    CashManagement,

    /// Credit card (revolving credit line)
    CreditCard,

    /// Mortgage loan
    Mortgage,

    /// Student loan
    StudentLoan,

    /// Anything else the upstream aggregator reports
    Other(String),
}

impl AccountType {
    pub fn as_str(&self) -> &str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::MoneyMarket => "money_market",
            AccountType::Hsa => "hsa",
            AccountType::CashManagement => "cash_management",
            AccountType::CreditCard => "credit_card",
            AccountType::Mortgage => "mortgage",
            AccountType::StudentLoan => "student_loan",
            AccountType::Other(name) => name.as_str(),
        }
    }

    /// Parse the storage representation. Unknown types are kept, not rejected.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "checking" => AccountType::Checking,
            "savings" => AccountType::Savings,
            "money_market" => AccountType::MoneyMarket,
            "hsa" => AccountType::Hsa,
            "cash_management" => AccountType::CashManagement,
            "credit_card" => AccountType::CreditCard,
            "mortgage" => AccountType::Mortgage,
            "student_loan" => AccountType::StudentLoan,
            other => AccountType::Other(other.to_string()),
        }
    }

    /// Savings-like accounts feed the savings analyzer
    pub fn is_savings_like(&self) -> bool {
        matches!(
            self,
            AccountType::Savings
                | AccountType::MoneyMarket
                | AccountType::Hsa
                | AccountType::CashManagement
        )
    }

    pub fn is_loan(&self) -> bool {
        matches!(self, AccountType::Mortgage | AccountType::StudentLoan)
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identity
    pub account_id: String,

    /// Owning user
    pub user_id: String,

    /// Type of account
    pub account_type: AccountType,

    pub subtype: Option<String>,

    /// Current balance (for credit cards and loans: amount owed)
    pub balance_current: f64,

    /// Available balance (nullable upstream)
    pub balance_available: Option<f64>,

    /// Credit limit, credit cards only
    pub credit_limit: Option<f64>,

    /// Currency (ISO 4217 code)
    pub iso_currency_code: String,
}

impl Account {
    pub fn new(
        account_id: &str,
        user_id: &str,
        account_type: AccountType,
        balance_current: f64,
    ) -> Self {
        Account {
            account_id: account_id.to_string(),
            user_id: user_id.to_string(),
            account_type,
            subtype: None,
            balance_current,
            balance_available: None,
            credit_limit: None,
            iso_currency_code: "USD".to_string(),
        }
    }

    pub fn with_available(mut self, available: f64) -> Self {
        self.balance_available = Some(available);
        self
    }

    pub fn with_credit_limit(mut self, limit: f64) -> Self {
        self.credit_limit = Some(limit);
        self
    }

    /// Available balance, falling back to current when the aggregator left it empty
    pub fn available_or_current(&self) -> f64 {
        self.balance_available.unwrap_or(self.balance_current)
    }

    pub fn is_credit_card(&self) -> bool {
        self.account_type == AccountType::CreditCard
    }

    /// Current utilization in percent; None without a positive limit
    pub fn utilization_percent(&self) -> Option<f64> {
        self.utilization_at(self.balance_current)
    }

    /// Utilization of `balance` against this account's limit
    pub fn utilization_at(&self, balance: f64) -> Option<f64> {
        match self.credit_limit {
            Some(limit) if limit > 0.0 => Some(balance / limit * 100.0),
            _ => None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
