// 📜 Persona History - append-only log of assignments
//
// A new row is written only when the resolved persona differs from the most
// recent row for the same (user, window). Re-running an assignment with
// unchanged inputs therefore leaves the log untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::assignment::PersonaAssignment;
use super::criteria::SignalsUsed;
use super::rules::PersonaId;
use crate::error::{CoreError, Result};

/// Stored in place of a persona id when nothing matched
pub const NO_PERSONA_LABEL: &str = "none";

pub fn persona_label(persona: Option<PersonaId>) -> &'static str {
    persona.map(|p| p.as_str()).unwrap_or(NO_PERSONA_LABEL)
}

/// Inverse of `persona_label`; unknown ids are malformed rows
pub fn parse_persona_label(label: &str) -> Result<Option<PersonaId>> {
    if label == NO_PERSONA_LABEL {
        return Ok(None);
    }
    PersonaId::parse(label)
        .map(Some)
        .ok_or_else(|| CoreError::malformed("persona_history", format!("unknown persona '{}'", label)))
}

// ============================================================================
// HISTORY ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaHistoryEntry {
    pub id: i64,
    pub user_id: String,
    pub persona: Option<PersonaId>,
    pub window_days: u32,
    pub assigned_at: DateTime<Utc>,

    /// signals_used of the assignment that produced this row
    pub signals: SignalsUsed,
}

impl PersonaHistoryEntry {
    pub fn persona_label(&self) -> &'static str {
        persona_label(self.persona)
    }
}

/// Row to append; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub user_id: String,
    pub persona: Option<PersonaId>,
    pub window_days: u32,
    pub assigned_at: DateTime<Utc>,
    pub signals: SignalsUsed,
}

impl NewHistoryEntry {
    pub fn from_assignment(assignment: &PersonaAssignment) -> Self {
        NewHistoryEntry {
            user_id: assignment.user_id.clone(),
            persona: assignment.persona_id,
            window_days: assignment.window_days,
            assigned_at: assignment.assigned_at,
            signals: assignment.signals_used.clone(),
        }
    }

    pub fn with_id(self, id: i64) -> PersonaHistoryEntry {
        PersonaHistoryEntry {
            id,
            user_id: self.user_id,
            persona: self.persona,
            window_days: self.window_days,
            assigned_at: self.assigned_at,
            signals: self.signals,
        }
    }
}

/// A transition between consecutive history rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaChange {
    pub from_persona: String,
    pub to_persona: String,
    pub changed_at: DateTime<Utc>,
    pub signals: SignalsUsed,
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

/// Persistence behind the history log
pub trait HistoryStore: Send + Sync {
    /// Last row written for (user, window), by insertion order
    fn latest_entry(&self, user_id: &str, window_days: u32) -> Result<Option<PersonaHistoryEntry>>;

    fn append_entry(&self, entry: NewHistoryEntry) -> Result<PersonaHistoryEntry>;

    /// Newest first; ties on assignment time put the later insert first
    fn list_entries(
        &self,
        user_id: &str,
        window_days: Option<u32>,
        limit: Option<usize>,
    ) -> Result<Vec<PersonaHistoryEntry>>;
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Append unless the last row written for this (user, window) already has this
/// persona. Backdated runs compare against that row, not the newest `assigned_at`.
pub fn save_persona_history(
    store: &dyn HistoryStore,
    assignment: &PersonaAssignment,
) -> Result<PersonaHistoryEntry> {
    if let Some(latest) = store.latest_entry(&assignment.user_id, assignment.window_days)? {
        if latest.persona == assignment.persona_id {
            debug!(
                user_id = %assignment.user_id,
                window_days = assignment.window_days,
                persona = latest.persona_label(),
                "persona unchanged, history not written"
            );
            return Ok(latest);
        }
    }

    let entry = store.append_entry(NewHistoryEntry::from_assignment(assignment))?;
    debug!(
        user_id = %entry.user_id,
        window_days = entry.window_days,
        persona = entry.persona_label(),
        id = entry.id,
        "persona history appended"
    );
    Ok(entry)
}

pub fn get_persona_history(
    store: &dyn HistoryStore,
    user_id: &str,
    window_days: Option<u32>,
    limit: Option<usize>,
) -> Result<Vec<PersonaHistoryEntry>> {
    store.list_entries(user_id, window_days, limit)
}

/// Row with the newest assignment time
pub fn get_latest_persona(
    store: &dyn HistoryStore,
    user_id: &str,
    window_days: u32,
) -> Result<Option<PersonaHistoryEntry>> {
    let mut rows = store.list_entries(user_id, Some(window_days), Some(1))?;
    Ok(rows.pop())
}

/// Persona transitions, oldest first
pub fn get_persona_changes(
    store: &dyn HistoryStore,
    user_id: &str,
    window_days: u32,
) -> Result<Vec<PersonaChange>> {
    let history = store.list_entries(user_id, Some(window_days), None)?;

    let mut changes = Vec::new();
    let mut previous: Option<Option<PersonaId>> = None;

    for entry in history.iter().rev() {
        match previous {
            Some(prior) if prior != entry.persona => {
                changes.push(PersonaChange {
                    from_persona: persona_label(prior).to_string(),
                    to_persona: entry.persona_label().to_string(),
                    changed_at: entry.assigned_at,
                    signals: entry.signals.clone(),
                });
            }
            _ => {}
        }
        previous = Some(entry.persona);
    }

    Ok(changes)
}

// ============================================================================
// TESTS
// ============================================================================
