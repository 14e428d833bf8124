// 🎯 Persona Criteria - five independent rule functions
//
// Each rule reads one signal bundle and returns whether it matched, a
// human-readable reasoning line, and the signals it looked at. Thresholds
// here are product behavior and are not configurable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::features::{LoanTypeSummary, SignalBundle, WINDOW_SHORT_DAYS};

pub const VARIABLE_INCOME_MIN_GAP_DAYS: f64 = 45.0;
pub const VARIABLE_INCOME_MAX_BUFFER_MONTHS: f64 = 1.0;
pub const SUBSCRIPTION_MIN_MERCHANTS: usize = 3;
pub const SUBSCRIPTION_MIN_MONTHLY_SPEND: f64 = 50.0;
pub const SUBSCRIPTION_MIN_SHARE_PERCENT: f64 = 10.0;
pub const SAVINGS_MIN_GROWTH_PERCENT: f64 = 2.0;
pub const SAVINGS_MIN_MONTHLY_INFLOW: f64 = 200.0;
pub const MORTGAGE_MAX_BALANCE_TO_INCOME: f64 = 4.0;
pub const STUDENT_LOAN_MAX_BALANCE_TO_INCOME: f64 = 1.5;
pub const MORTGAGE_MAX_BURDEN_PERCENT: f64 = 35.0;
pub const STUDENT_LOAN_MAX_BURDEN_PERCENT: f64 = 25.0;

pub type SignalsUsed = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub matched: bool,
    pub reasoning: String,
    pub signals_used: SignalsUsed,
}

impl RuleOutcome {
    fn new(matched: bool, reasoning: String, signals_used: SignalsUsed) -> Self {
        RuleOutcome {
            matched,
            reasoning,
            signals_used,
        }
    }
}

fn signals<const N: usize>(entries: [(&str, Value); N]) -> SignalsUsed {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

// ============================================================================
// PERSONA 1: HIGH UTILIZATION
// ============================================================================

/// Any of: a card at ≥50%, interest charges, minimum-only payments, overdue
pub fn check_high_utilization(bundle: &SignalBundle) -> RuleOutcome {
    let credit = &bundle.credit;
    let mut reasons = Vec::new();
    let mut used = SignalsUsed::new();

    if credit.flag_50_percent {
        reasons.push(format!(
            "Credit utilization at {:.1}%",
            credit.max_utilization_percent
        ));
        used.insert("max_utilization".into(), json!(credit.max_utilization_percent));
        used.insert("utilization_flag_50".into(), json!(true));
    }
    if credit.interest_charges_present {
        reasons.push("Interest charges detected".to_string());
        used.insert("interest_charges".into(), json!(true));
    }
    if credit.minimum_payment_only {
        reasons.push("Only making minimum payments".to_string());
        used.insert("minimum_payment_only".into(), json!(true));
    }
    if credit.is_overdue {
        reasons.push("Has overdue payments".to_string());
        used.insert("is_overdue".into(), json!(true));
    }

    if reasons.is_empty() {
        RuleOutcome::new(
            false,
            "Does not match High Utilization criteria".to_string(),
            used,
        )
    } else {
        RuleOutcome::new(
            true,
            format!("High Utilization: {}", reasons.join(", ")),
            used,
        )
    }
}

// ============================================================================
// PERSONA 2: VARIABLE INCOME BUDGETER
// ============================================================================

/// Payroll detected AND median gap > 45 days AND buffer < 1 month
pub fn check_variable_income(bundle: &SignalBundle) -> RuleOutcome {
    let income = &bundle.income;

    if !income.payroll_detected {
        return RuleOutcome::new(
            false,
            "Does not match Variable Income Budgeter: No income detected".to_string(),
            SignalsUsed::new(),
        );
    }

    let gap = income.median_pay_gap_days;
    let buffer = income.cash_flow_buffer_months;
    let gap_high = gap > VARIABLE_INCOME_MIN_GAP_DAYS;
    let buffer_low = buffer < VARIABLE_INCOME_MAX_BUFFER_MONTHS;

    let used = signals([
        ("median_pay_gap_days", json!(gap)),
        ("cash_flow_buffer_months", json!(buffer)),
    ]);

    if gap_high && buffer_low {
        return RuleOutcome::new(
            true,
            format!(
                "Variable Income Budgeter: Median pay gap of {:.1} days (>45 days) and cash-flow buffer of {:.2} months (<1 month)",
                gap, buffer
            ),
            used,
        );
    }

    let mut reasoning = "Does not match Variable Income Budgeter criteria".to_string();
    if !gap_high {
        reasoning.push_str(&format!(" (pay gap {:.1} days ≤ 45)", gap));
    }
    if !buffer_low {
        reasoning.push_str(&format!(" (buffer {:.2} months ≥ 1)", buffer));
    }
    RuleOutcome::new(false, reasoning, used)
}

// ============================================================================
// PERSONA 3: SUBSCRIPTION-HEAVY
// ============================================================================

/// ≥3 recurring merchants AND (≥$50/month recurring OR ≥10% of spend)
pub fn check_subscription_heavy(bundle: &SignalBundle) -> RuleOutcome {
    let subs = &bundle.subscriptions;
    let enough_merchants = subs.recurring_merchant_count >= SUBSCRIPTION_MIN_MERCHANTS;
    let spend_high = subs.monthly_recurring_spend >= SUBSCRIPTION_MIN_MONTHLY_SPEND;
    let share_high = subs.subscription_share_percent >= SUBSCRIPTION_MIN_SHARE_PERCENT;

    let used = signals([
        ("recurring_merchant_count", json!(subs.recurring_merchant_count)),
        ("monthly_recurring_spend", json!(subs.monthly_recurring_spend)),
        ("subscription_share_percent", json!(subs.subscription_share_percent)),
    ]);

    if enough_merchants && (spend_high || share_high) {
        let mut reasons = vec![format!("{} recurring merchants", subs.recurring_merchant_count)];
        if spend_high {
            reasons.push(format!(
                "${:.2}/month recurring spend",
                subs.monthly_recurring_spend
            ));
        }
        if share_high {
            reasons.push(format!(
                "{:.1}% of total spend",
                subs.subscription_share_percent
            ));
        }
        return RuleOutcome::new(
            true,
            format!("Subscription-Heavy: {}", reasons.join(", ")),
            used,
        );
    }

    let mut reasoning = "Does not match Subscription-Heavy criteria".to_string();
    if !enough_merchants {
        reasoning.push_str(&format!(
            " ({} merchants < 3)",
            subs.recurring_merchant_count
        ));
    }
    if !(spend_high || share_high) {
        reasoning.push_str(&format!(
            " (spend ${:.2} < $50 and share {:.1}% < 10%)",
            subs.monthly_recurring_spend, subs.subscription_share_percent
        ));
    }
    RuleOutcome::new(false, reasoning, used)
}

// ============================================================================
// PERSONA 4: SAVINGS BUILDER
// ============================================================================

/// Net savings inflow on a 30-day basis
pub fn monthly_savings_inflow(bundle: &SignalBundle) -> f64 {
    if bundle.window_days == WINDOW_SHORT_DAYS || bundle.window_days == 0 {
        bundle.savings.net_inflow
    } else {
        bundle.savings.net_inflow / f64::from(bundle.window_days) * 30.0
    }
}

/// (growth ≥2% OR inflow ≥$200/month) AND every card below 30%
pub fn check_savings_builder(bundle: &SignalBundle) -> RuleOutcome {
    let savings = &bundle.savings;
    let credit = &bundle.credit;

    let inflow_monthly = monthly_savings_inflow(bundle);
    let growth_high = savings.growth_rate_percent >= SAVINGS_MIN_GROWTH_PERCENT;
    let inflow_high = inflow_monthly >= SAVINGS_MIN_MONTHLY_INFLOW;
    let utilization_low = credit.num_credit_cards == 0 || credit.all_cards_below_30();

    let used = signals([
        ("growth_rate_percent", json!(savings.growth_rate_percent)),
        ("net_inflow_monthly", json!(inflow_monthly)),
        ("max_utilization", json!(credit.max_utilization_percent)),
    ]);

    if (growth_high || inflow_high) && utilization_low {
        let mut reasons = Vec::new();
        if growth_high {
            reasons.push(format!(
                "{:.1}% savings growth rate",
                savings.growth_rate_percent
            ));
        }
        if inflow_high {
            reasons.push(format!("${:.2}/month net savings inflow", inflow_monthly));
        }
        reasons.push("All credit cards below 30% utilization".to_string());
        return RuleOutcome::new(
            true,
            format!("Savings Builder: {}", reasons.join(", ")),
            used,
        );
    }

    let mut reasoning = "Does not match Savings Builder criteria".to_string();
    if !(growth_high || inflow_high) {
        reasoning.push_str(&format!(
            " (growth {:.1}% < 2% and inflow ${:.2} < $200)",
            savings.growth_rate_percent, inflow_monthly
        ));
    }
    if !utilization_low {
        reasoning.push_str(&format!(
            " (max utilization {:.1}% ≥ 30%)",
            credit.max_utilization_percent
        ));
    }
    RuleOutcome::new(false, reasoning, used)
}

// ============================================================================
// PERSONA 5: DEBT BURDEN
// ============================================================================

struct LoanLimits {
    label: &'static str,
    max_balance_to_income: f64,
    max_burden_percent: f64,
}

const MORTGAGE_LIMITS: LoanLimits = LoanLimits {
    label: "Mortgage",
    max_balance_to_income: MORTGAGE_MAX_BALANCE_TO_INCOME,
    max_burden_percent: MORTGAGE_MAX_BURDEN_PERCENT,
};

const STUDENT_LOAN_LIMITS: LoanLimits = LoanLimits {
    label: "Student loan",
    max_balance_to_income: STUDENT_LOAN_MAX_BALANCE_TO_INCOME,
    max_burden_percent: STUDENT_LOAN_MAX_BURDEN_PERCENT,
};

/// Reasons one loan type qualifies; empty when it does not
fn loan_reasons(summary: &LoanTypeSummary, limits: &LoanLimits, annual_income: f64) -> Vec<String> {
    let mut reasons = Vec::new();
    if annual_income <= 0.0 {
        if summary.balance > 0.0 {
            reasons.push(format!(
                "{} balance of ${:.2} with no detected income",
                limits.label, summary.balance
            ));
        }
        return reasons;
    }
    if summary.balance_to_income_ratio > limits.max_balance_to_income {
        reasons.push(format!(
            "{} balance is {:.1}x annual income (>{:.1}x)",
            limits.label, summary.balance_to_income_ratio, limits.max_balance_to_income
        ));
    }
    if summary.payment_burden_percent > limits.max_burden_percent {
        reasons.push(format!(
            "{} payments are {:.1}% of monthly income (>{:.0}%)",
            limits.label, summary.payment_burden_percent, limits.max_burden_percent
        ));
    }
    reasons
}

/// Has a mortgage or student loan whose balance-to-income ratio or payment
/// burden exceeds that loan type's limit. Without detected income, any
/// balance on the loan type qualifies.
pub fn check_debt_burden(bundle: &SignalBundle) -> RuleOutcome {
    let loans = &bundle.loans;

    if !loans.has_mortgage && !loans.has_student_loan {
        return RuleOutcome::new(
            false,
            "Does not match Debt Burden: No mortgage or student loan".to_string(),
            SignalsUsed::new(),
        );
    }

    let mut reasons = Vec::new();
    if loans.has_mortgage {
        reasons.extend(loan_reasons(&loans.mortgage, &MORTGAGE_LIMITS, loans.annual_income));
    }
    if loans.has_student_loan {
        reasons.extend(loan_reasons(
            &loans.student_loan,
            &STUDENT_LOAN_LIMITS,
            loans.annual_income,
        ));
    }

    let used = signals([
        ("annual_income", json!(loans.annual_income)),
        ("total_loan_balance", json!(loans.total_loan_balance)),
        ("mortgage_balance", json!(loans.mortgage.balance)),
        ("mortgage_balance_to_income_ratio", json!(loans.mortgage.balance_to_income_ratio)),
        ("mortgage_payment_burden_percent", json!(loans.mortgage.payment_burden_percent)),
        ("student_loan_balance", json!(loans.student_loan.balance)),
        ("student_loan_balance_to_income_ratio", json!(loans.student_loan.balance_to_income_ratio)),
        ("student_loan_payment_burden_percent", json!(loans.student_loan.payment_burden_percent)),
    ]);

    if reasons.is_empty() {
        RuleOutcome::new(
            false,
            "Does not match Debt Burden criteria (loan balances and payments within limits)"
                .to_string(),
            used,
        )
    } else {
        RuleOutcome::new(true, format!("Debt Burden: {}", reasons.join(", ")), used)
    }
}

// ============================================================================
// TESTS
// ============================================================================
