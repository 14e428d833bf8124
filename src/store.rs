// 🗄️ Financial Store - persistence contract for accounts, transactions, liabilities
//
// The signal engine only reads through this trait. The single writer is the
// fallback repair step, which goes through the upsert methods so that two
// racing repairs land on the same rows. Every write of that kind is paired
// with an audit Event.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{chronological, Account, Liability, Transaction};
use crate::error::Result;
use crate::features::UserSnapshot;
use crate::personas::history::{HistoryStore, NewHistoryEntry, PersonaHistoryEntry};

// ============================================================================
// AUDIT EVENT
// ============================================================================

/// Every mutation of financial records is an event
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

pub trait FinancialStore: Send + Sync {
    fn accounts_for_user(&self, user_id: &str) -> Result<Vec<Account>>;

    fn transactions_for_accounts(&self, account_ids: &[String]) -> Result<Vec<Transaction>>;

    fn liabilities_for_accounts(&self, account_ids: &[String]) -> Result<Vec<Liability>>;

    /// Insert or replace by account_id
    fn upsert_account(&self, account: &Account) -> Result<()>;

    /// Insert or replace by liability_id
    fn upsert_liability(&self, liability: &Liability) -> Result<()>;

    /// Ok(false) when the id already exists
    fn insert_account(&self, account: &Account) -> Result<bool>;

    /// Ok(false) when the id already exists
    fn insert_transaction(&self, transaction: &Transaction) -> Result<bool>;

    /// Ok(false) when the id already exists
    fn insert_liability(&self, liability: &Liability) -> Result<bool>;

    fn record_event(&self, event: &Event) -> Result<()>;

    /// Newest first
    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>>;
}

/// Everything one user owns, in a stable order
pub fn load_snapshot(store: &dyn FinancialStore, user_id: &str) -> Result<UserSnapshot> {
    let mut accounts = store.accounts_for_user(user_id)?;
    accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));

    let account_ids: Vec<String> = accounts.iter().map(|a| a.account_id.clone()).collect();

    let mut transactions = store.transactions_for_accounts(&account_ids)?;
    transactions.sort_by(chronological);

    let mut liabilities = store.liabilities_for_accounts(&account_ids)?;
    liabilities.sort_by(|a, b| a.liability_id.cmp(&b.liability_id));

    Ok(UserSnapshot {
        user_id: user_id.to_string(),
        accounts,
        transactions,
        liabilities,
    })
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Lock-guarded maps; used by tests and one-shot runs without a database
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<BTreeMap<String, Account>>,
    transactions: RwLock<BTreeMap<String, Transaction>>,
    liabilities: RwLock<BTreeMap<String, Liability>>,
    events: RwLock<Vec<Event>>,
    history: RwLock<Vec<PersonaHistoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with one user's records
    pub fn with_snapshot(snapshot: &UserSnapshot) -> Result<Self> {
        let store = Self::new();
        for account in &snapshot.accounts {
            store.upsert_account(account)?;
        }
        for transaction in &snapshot.transactions {
            store.insert_transaction(transaction)?;
        }
        for liability in &snapshot.liabilities {
            store.upsert_liability(liability)?;
        }
        Ok(store)
    }
}

impl FinancialStore for MemoryStore {
    fn accounts_for_user(&self, user_id: &str) -> Result<Vec<Account>> {
        let accounts = self.accounts.read()?;
        Ok(accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn transactions_for_accounts(&self, account_ids: &[String]) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read()?;
        Ok(transactions
            .values()
            .filter(|t| account_ids.contains(&t.account_id))
            .cloned()
            .collect())
    }

    fn liabilities_for_accounts(&self, account_ids: &[String]) -> Result<Vec<Liability>> {
        let liabilities = self.liabilities.read()?;
        Ok(liabilities
            .values()
            .filter(|l| account_ids.contains(&l.account_id))
            .cloned()
            .collect())
    }

    fn upsert_account(&self, account: &Account) -> Result<()> {
        self.accounts
            .write()?
            .insert(account.account_id.clone(), account.clone());
        Ok(())
    }

    fn upsert_liability(&self, liability: &Liability) -> Result<()> {
        self.liabilities
            .write()?
            .insert(liability.liability_id.clone(), liability.clone());
        Ok(())
    }

    fn insert_account(&self, account: &Account) -> Result<bool> {
        let mut accounts = self.accounts.write()?;
        if accounts.contains_key(&account.account_id) {
            return Ok(false);
        }
        accounts.insert(account.account_id.clone(), account.clone());
        Ok(true)
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<bool> {
        let mut transactions = self.transactions.write()?;
        if transactions.contains_key(&transaction.transaction_id) {
            return Ok(false);
        }
        transactions.insert(transaction.transaction_id.clone(), transaction.clone());
        Ok(true)
    }

    fn insert_liability(&self, liability: &Liability) -> Result<bool> {
        let mut liabilities = self.liabilities.write()?;
        if liabilities.contains_key(&liability.liability_id) {
            return Ok(false);
        }
        liabilities.insert(liability.liability_id.clone(), liability.clone());
        Ok(true)
    }

    fn record_event(&self, event: &Event) -> Result<()> {
        self.events.write()?.push(event.clone());
        Ok(())
    }

    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        let events = self.events.read()?;
        let mut matching: Vec<Event> = events
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect();
        // equal timestamps: later push first
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching)
    }
}

impl HistoryStore for MemoryStore {
    fn latest_entry(&self, user_id: &str, window_days: u32) -> Result<Option<PersonaHistoryEntry>> {
        let history = self.history.read()?;
        Ok(history
            .iter()
            .filter(|e| e.user_id == user_id && e.window_days == window_days)
            .max_by_key(|e| e.id)
            .cloned())
    }

    fn append_entry(&self, entry: NewHistoryEntry) -> Result<PersonaHistoryEntry> {
        let mut history = self.history.write()?;
        let id = history.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let stored = entry.with_id(id);
        history.push(stored.clone());
        Ok(stored)
    }

    fn list_entries(
        &self,
        user_id: &str,
        window_days: Option<u32>,
        limit: Option<usize>,
    ) -> Result<Vec<PersonaHistoryEntry>> {
        let history = self.history.read()?;
        let mut rows: Vec<PersonaHistoryEntry> = history
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| window_days.map_or(true, |w| e.window_days == w))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.assigned_at, b.id).cmp(&(a.assigned_at, a.id)));
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

// ============================================================================
// TESTS
// ============================================================================
