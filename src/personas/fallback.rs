// 🩹 Fallback Repair - make sure an unmatched user still gets a persona
//
// This is the one place classification writes financial records. When no
// rule fires for a window, the orchestrator asks this service to guarantee
// that the user holds a credit card with an overdue liability, which makes
// High Utilization match on re-evaluation.
//
// Writes are upserts keyed by ids derived from the user id, so the repair is
// idempotent and concurrent repairs converge on the same rows.

use std::sync::Arc;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::entities::{Account, AccountType, Liability, LiabilityType};
use crate::error::Result;
use crate::store::{Event, FinancialStore};

pub const SYNTHETIC_CREDIT_LIMIT: f64 = 5000.0;
pub const SYNTHETIC_BALANCE: f64 = 3000.0;
pub const SYNTHETIC_AVAILABLE: f64 = 2000.0;

/// Audit actor for repair events
pub const REPAIR_ACTOR: &str = "persona_fallback";

pub trait FallbackRepair: Send + Sync {
    /// Ok(true) when records were written
    fn ensure_fallback_invariant(&self, user_id: &str) -> Result<bool>;
}

/// Stable id of the synthetic card for a user
pub fn synthetic_card_id(user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("fallback_card|{}", user_id));
    let digest = format!("{:x}", hasher.finalize());
    format!("cc_fallback_{}", &digest[..16])
}

fn liability_id_for(account_id: &str) -> String {
    format!("liab_{}", account_id)
}

// ============================================================================
// STORE-BACKED REPAIR
// ============================================================================

pub struct StoreFallbackRepair {
    store: Arc<dyn FinancialStore>,
}

impl StoreFallbackRepair {
    pub fn new(store: Arc<dyn FinancialStore>) -> Self {
        StoreFallbackRepair { store }
    }

    fn audit(&self, account_id: &str, data: serde_json::Value) -> Result<()> {
        let event = Event::new("fallback_repair", "account", account_id, data, REPAIR_ACTOR);
        self.store.record_event(&event)
    }

    fn flag_existing_card(&self, card: &Account, existing: Option<&Liability>) -> Result<()> {
        let liability = match existing {
            Some(liability) => Liability {
                is_overdue: true,
                ..liability.clone()
            },
            None => Liability::new(
                &liability_id_for(&card.account_id),
                &card.account_id,
                LiabilityType::CreditCard,
            )
            .overdue(),
        };
        self.store.upsert_liability(&liability)?;

        warn!(
            user_id = %card.user_id,
            account_id = %card.account_id,
            liability_id = %liability.liability_id,
            "fallback repair flagged existing credit card overdue"
        );
        self.audit(
            &card.account_id,
            json!({
                "action": "flag_overdue",
                "user_id": card.user_id,
                "liability_id": liability.liability_id,
                "created_liability": existing.is_none(),
            }),
        )
    }

    fn create_synthetic_card(&self, user_id: &str) -> Result<()> {
        let account_id = synthetic_card_id(user_id);
        let card = Account::new(&account_id, user_id, AccountType::CreditCard, SYNTHETIC_BALANCE)
            .with_available(SYNTHETIC_AVAILABLE)
            .with_credit_limit(SYNTHETIC_CREDIT_LIMIT);
        let liability = Liability::new(
            &liability_id_for(&account_id),
            &account_id,
            LiabilityType::CreditCard,
        )
        .overdue();

        self.store.upsert_account(&card)?;
        self.store.upsert_liability(&liability)?;

        warn!(
            user_id,
            account_id = %account_id,
            "fallback repair created synthetic overdue credit card"
        );
        self.audit(
            &account_id,
            json!({
                "action": "create_synthetic_card",
                "user_id": user_id,
                "liability_id": liability.liability_id,
                "credit_limit": SYNTHETIC_CREDIT_LIMIT,
                "balance_current": SYNTHETIC_BALANCE,
            }),
        )
    }
}

impl FallbackRepair for StoreFallbackRepair {
    fn ensure_fallback_invariant(&self, user_id: &str) -> Result<bool> {
        let mut cards: Vec<Account> = self
            .store
            .accounts_for_user(user_id)?
            .into_iter()
            .filter(Account::is_credit_card)
            .collect();
        cards.sort_by(|a, b| a.account_id.cmp(&b.account_id));

        let card_ids: Vec<String> = cards.iter().map(|c| c.account_id.clone()).collect();
        let mut liabilities = self.store.liabilities_for_accounts(&card_ids)?;
        liabilities.sort_by(|a, b| a.liability_id.cmp(&b.liability_id));

        if liabilities.iter().any(|l| l.is_overdue) {
            return Ok(false);
        }

        match cards.iter().find(|c| c.balance_current > 0.0) {
            Some(card) => {
                let existing = liabilities.iter().find(|l| l.account_id == card.account_id);
                self.flag_existing_card(card, existing)?;
            }
            None => self.create_synthetic_card(user_id)?,
        }

        Ok(true)
    }
}

// ============================================================================
// TESTS
// ============================================================================
