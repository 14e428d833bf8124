// 🧑‍🤝‍🧑 Personas - rule evaluation, priority resolution, assignment, history

pub mod assignment;
pub mod criteria;
pub mod fallback;
pub mod history;
pub mod rules;

pub use assignment::{PersonaAssigner, PersonaAssignment};
pub use criteria::{RuleOutcome, SignalsUsed};
pub use fallback::{FallbackRepair, StoreFallbackRepair};
pub use history::{
    get_latest_persona, get_persona_changes, get_persona_history, save_persona_history,
    HistoryStore, NewHistoryEntry, PersonaChange, PersonaHistoryEntry,
};
pub use rules::{PersonaId, PersonaMatch, PersonaRegistry, PersonaRule, Resolution};
