// 💳 Credit Utilization - per-card utilization and payment behavior
//
// On a card, positive amounts are charges (balance up) and negative
// amounts are payments (balance down).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::to_map;
use crate::entities::{chronological, Account, Liability, Transaction};

/// Payments averaging at most this multiple of the minimum count as minimum-only
pub const MINIMUM_PAYMENT_MARGIN: f64 = 1.1;

/// Merchant / detailed-category fragments that mark interest or fees
pub const INTEREST_KEYWORDS: [&str; 3] = ["interest", "finance charge", "late fee"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSignals {
    /// Utilization percent per card id (cards with a positive limit only)
    pub utilizations: BTreeMap<String, f64>,
    pub max_utilization_percent: f64,
    pub flag_30_percent: bool,
    pub flag_50_percent: bool,
    pub flag_80_percent: bool,
    pub minimum_payment_only: bool,
    pub interest_charges_present: bool,
    pub is_overdue: bool,
    pub num_credit_cards: usize,
    pub window_days: u32,
}

impl CreditSignals {
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        to_map(self)
    }

    /// True when every card is below 30%, or there are no cards
    pub fn all_cards_below_30(&self) -> bool {
        !self.flag_30_percent
    }
}

/// Highest balance reached in the window, replayed forward from the balance
/// implied at window start and clamped to `[0, limit]`
pub fn peak_balance_in_window(account: &Account, transactions: &[&Transaction]) -> f64 {
    if transactions.is_empty() {
        return account.balance_current;
    }
    let mut sorted: Vec<&Transaction> = transactions.to_vec();
    sorted.sort_by(|a, b| chronological(a, b));

    let net_change: f64 = sorted.iter().map(|t| t.amount).sum();
    let mut running = account.balance_current - net_change;
    let mut peak = running;
    for tx in &sorted {
        running += tx.amount;
        if running > peak {
            peak = running;
        }
    }

    if let Some(limit) = account.credit_limit {
        peak = peak.min(limit);
    }
    peak.max(0.0)
}

fn detect_minimum_payment_only(liabilities: &[Liability], transactions: &[Transaction]) -> bool {
    for liability in liabilities {
        let minimum = match liability.minimum_payment_amount {
            Some(minimum) if minimum > 0.0 => minimum,
            _ => continue,
        };
        let payments: Vec<f64> = transactions
            .iter()
            .filter(|t| t.is_inflow() && t.account_id == liability.account_id)
            .map(|t| t.amount.abs())
            .collect();
        if payments.is_empty() {
            continue;
        }
        let average = payments.iter().sum::<f64>() / payments.len() as f64;
        if average <= minimum * MINIMUM_PAYMENT_MARGIN {
            return true;
        }
    }
    false
}

fn detect_interest_charges(transactions: &[Transaction]) -> bool {
    transactions.iter().any(|t| {
        INTEREST_KEYWORDS.iter().any(|keyword| {
            t.merchant_contains(keyword)
                || t.category_detailed
                    .as_deref()
                    .map(|c| c.to_lowercase().contains(keyword))
                    .unwrap_or(false)
        })
    })
}

/// `liabilities` may include loan liabilities: any overdue liability sets `is_overdue`
pub fn calculate_credit_utilization(
    credit_accounts: &[&Account],
    liabilities: &[Liability],
    credit_transactions: &[Transaction],
    window_days: u32,
) -> CreditSignals {
    let mut utilizations = BTreeMap::new();

    for account in credit_accounts {
        let card_txs: Vec<&Transaction> = credit_transactions
            .iter()
            .filter(|t| t.account_id == account.account_id)
            .collect();

        let utilization = if card_txs.is_empty() {
            account.utilization_percent()
        } else {
            account.utilization_at(peak_balance_in_window(account, &card_txs))
        };
        // cards without a positive limit are skipped
        if let Some(utilization) = utilization {
            utilizations.insert(account.account_id.clone(), utilization);
        }
    }

    let max_utilization = utilizations.values().copied().fold(0.0, f64::max);
    let any_at_least = |threshold: f64| utilizations.values().any(|u| *u >= threshold);

    let signals = CreditSignals {
        max_utilization_percent: max_utilization,
        flag_30_percent: any_at_least(30.0),
        flag_50_percent: any_at_least(50.0),
        flag_80_percent: any_at_least(80.0),
        minimum_payment_only: !credit_accounts.is_empty()
            && detect_minimum_payment_only(liabilities, credit_transactions),
        interest_charges_present: !credit_accounts.is_empty()
            && detect_interest_charges(credit_transactions),
        is_overdue: !credit_accounts.is_empty() && liabilities.iter().any(|l| l.is_overdue),
        num_credit_cards: credit_accounts.len(),
        window_days,
        utilizations,
    };

    debug!(
        window_days,
        cards = signals.num_credit_cards,
        max_utilization = signals.max_utilization_percent,
        overdue = signals.is_overdue,
        "credit utilization computed"
    );
    signals
}

// ============================================================================
// TESTS
// ============================================================================
