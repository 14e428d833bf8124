// 🏠 Loan Signals - mortgage and student-loan balances against income

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stats::{normalize_to_month, ratio_or_zero};
use super::to_map;
use super::income::IncomeSignals;
use crate::entities::{Account, AccountType, Liability};

/// Totals for one loan type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanTypeSummary {
    pub balance: f64,
    pub monthly_payment: f64,
    pub interest_rate: f64,
    pub is_overdue: bool,

    /// balance / annual income
    pub balance_to_income_ratio: f64,

    /// monthly payment / monthly income, in percent
    pub payment_burden_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSignals {
    pub has_mortgage: bool,
    pub has_student_loan: bool,
    pub num_loans: usize,
    pub mortgage: LoanTypeSummary,
    pub student_loan: LoanTypeSummary,
    pub total_loan_balance: f64,
    pub total_monthly_loan_payments: f64,
    pub any_loan_overdue: bool,
    pub monthly_income: f64,
    pub annual_income: f64,

    /// total monthly payments / monthly income
    pub debt_to_income_ratio: f64,
    pub loan_payment_burden_percent: f64,
}

impl LoanSignals {
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        to_map(self)
    }
}

/// Payroll-based income on a 30-day basis; 0 without detected payroll
pub fn monthly_income_from(income: &IncomeSignals) -> f64 {
    if income.payroll_detected && income.total_income > 0.0 {
        normalize_to_month(income.total_income, income.window_days)
    } else {
        0.0
    }
}

fn summarize(
    accounts: &[&Account],
    liabilities: &[Liability],
    monthly_income: f64,
) -> LoanTypeSummary {
    let mut summary = LoanTypeSummary::default();

    for account in accounts {
        summary.balance += account.balance_current;
        for liability in liabilities.iter().filter(|l| l.account_id == account.account_id) {
            if let Some(minimum) = liability.minimum_payment_amount {
                summary.monthly_payment += minimum;
            }
            if let Some(rate) = liability.interest_rate.filter(|r| *r != 0.0) {
                summary.interest_rate = rate;
            }
            summary.is_overdue |= liability.is_overdue;
        }
    }

    summary.balance_to_income_ratio = ratio_or_zero(summary.balance, monthly_income * 12.0);
    summary.payment_burden_percent = ratio_or_zero(summary.monthly_payment, monthly_income) * 100.0;
    summary
}

/// `accounts` may be all of the user's accounts; only loans are read
pub fn calculate_loan_signals(
    accounts: &[Account],
    liabilities: &[Liability],
    monthly_income: f64,
) -> LoanSignals {
    let loans: Vec<&Account> = accounts.iter().filter(|a| a.account_type.is_loan()).collect();
    let num_loans = loans.len();
    let (mortgages, student_loans): (Vec<&Account>, Vec<&Account>) = loans
        .into_iter()
        .partition(|a| a.account_type == AccountType::Mortgage);

    let mortgage = summarize(&mortgages, liabilities, monthly_income);
    let student_loan = summarize(&student_loans, liabilities, monthly_income);

    let total_payments = mortgage.monthly_payment + student_loan.monthly_payment;
    let debt_to_income = ratio_or_zero(total_payments, monthly_income);

    LoanSignals {
        has_mortgage: !mortgages.is_empty(),
        has_student_loan: !student_loans.is_empty(),
        num_loans,
        total_loan_balance: mortgage.balance + student_loan.balance,
        total_monthly_loan_payments: total_payments,
        any_loan_overdue: mortgage.is_overdue || student_loan.is_overdue,
        monthly_income,
        annual_income: monthly_income * 12.0,
        debt_to_income_ratio: debt_to_income,
        loan_payment_burden_percent: debt_to_income * 100.0,
        mortgage,
        student_loan,
    }
}

// ============================================================================
// TESTS
// ============================================================================
