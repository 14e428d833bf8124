// 🎯 Persona Assignment - orchestrates signals, rules, fallback and history
//
// For each standard window (30 then 180 days):
//   1. Build the signal bundle from the user's current records
//   2. Evaluate every rule and resolve by priority
//   3. If nothing matched, run the fallback repair, reload and re-evaluate
//   4. Optionally append to the persona history log
//
// Step 3 WRITES financial records (a synthetic or flagged credit card).
// Assignments for one user are serialized so two callers cannot both repair.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::criteria::SignalsUsed;
use super::fallback::{FallbackRepair, StoreFallbackRepair};
use super::history::{persona_label, save_persona_history, HistoryStore};
use super::rules::{PersonaId, PersonaMatch, PersonaRegistry, NO_PERSONA_NAME};
use crate::error::Result;
use crate::features::{build_signal_bundle, to_map, SignalBundle, UserSnapshot, STANDARD_WINDOWS};
use crate::store::{load_snapshot, FinancialStore};

// ============================================================================
// ASSIGNMENT RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaAssignment {
    pub user_id: String,
    pub persona_id: Option<PersonaId>,
    pub persona_name: String,
    pub window_days: u32,
    pub reasoning: String,
    pub signals_used: SignalsUsed,

    /// The reference time the assignment was computed for
    pub assigned_at: DateTime<Utc>,

    /// Every rule that fired, in priority order
    pub matching_personas: Vec<PersonaMatch>,

    /// True when this window triggered a repair of the user's records
    pub fallback_applied: bool,
}

impl PersonaAssignment {
    /// Resolve a bundle against a registry; no side effects
    pub fn evaluate(registry: &PersonaRegistry, bundle: &SignalBundle) -> Self {
        let matching_personas = registry.evaluate_all(bundle);
        let resolution = registry.resolve(&matching_personas);

        let persona_name = match resolution.persona {
            Some(id) => registry.display_name(id),
            None => NO_PERSONA_NAME,
        };

        PersonaAssignment {
            user_id: bundle.user_id.clone(),
            persona_id: resolution.persona,
            persona_name: persona_name.to_string(),
            window_days: bundle.window_days,
            reasoning: resolution.reasoning,
            signals_used: resolution.signals_used,
            assigned_at: bundle.calculated_at,
            matching_personas,
            fallback_applied: false,
        }
    }

    /// Dictionary form; matching personas are listed without their signals
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = to_map(self);
        let matches: Vec<Value> = self
            .matching_personas
            .iter()
            .map(|m| {
                json!({
                    "persona_id": m.persona,
                    "persona_name": m.persona_name,
                    "reasoning": m.reasoning,
                })
            })
            .collect();
        map.insert("matching_personas".to_string(), Value::Array(matches));
        map
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct PersonaAssigner {
    store: Arc<dyn FinancialStore>,
    history: Arc<dyn HistoryStore>,
    repair: Arc<dyn FallbackRepair>,
    registry: PersonaRegistry,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PersonaAssigner {
    pub fn new(
        store: Arc<dyn FinancialStore>,
        history: Arc<dyn HistoryStore>,
        repair: Arc<dyn FallbackRepair>,
    ) -> Self {
        PersonaAssigner {
            store,
            history,
            repair,
            registry: PersonaRegistry::standard(),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// One backend for records and history, repaired through the same store
    pub fn over_store<S>(store: Arc<S>) -> Self
    where
        S: FinancialStore + HistoryStore + 'static,
    {
        let financial: Arc<dyn FinancialStore> = store.clone();
        let history: Arc<dyn HistoryStore> = store;
        let repair = Arc::new(StoreFallbackRepair::new(financial.clone()));
        PersonaAssigner::new(financial, history, repair)
    }

    pub fn with_registry(mut self, registry: PersonaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    fn user_lock(&self, user_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.user_locks.lock()?;
        Ok(locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Current records of one user
    pub fn snapshot(&self, user_id: &str) -> Result<UserSnapshot> {
        load_snapshot(self.store.as_ref(), user_id)
    }

    /// Assign both windows; writes history rows when `save_history` is set
    pub fn assign_personas(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
        save_history: bool,
    ) -> Result<Vec<PersonaAssignment>> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock()?;

        let mut snapshot = self.snapshot(user_id)?;
        let mut assignments = Vec::with_capacity(STANDARD_WINDOWS.len());

        for window_days in STANDARD_WINDOWS {
            let bundle = build_signal_bundle(&snapshot, window_days, as_of);
            let mut assignment = PersonaAssignment::evaluate(&self.registry, &bundle);

            if assignment.persona_id.is_none() {
                let repaired = self.repair.ensure_fallback_invariant(user_id)?;
                if repaired {
                    snapshot = self.snapshot(user_id)?;
                    let bundle = build_signal_bundle(&snapshot, window_days, as_of);
                    assignment = PersonaAssignment::evaluate(&self.registry, &bundle);
                    assignment.fallback_applied = true;
                }
            }

            info!(
                user_id,
                window_days,
                persona = persona_label(assignment.persona_id),
                matched = assignment.matching_personas.len(),
                fallback_applied = assignment.fallback_applied,
                "persona assigned"
            );

            if save_history {
                save_persona_history(self.history.as_ref(), &assignment)?;
            }

            assignments.push(assignment);
        }

        Ok(assignments)
    }
}

// ============================================================================
// TESTS
// ============================================================================
