// Spend Persona - Core Library
// Behavioral signals over financial records, persona rules on top of them.
// Exposes all modules for use in the CLI and tests.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod features;
pub mod ingest;
pub mod logging;
pub mod personas;
pub mod store;

// Re-export commonly used types
pub use db::{setup_database, SqliteStore};
pub use entities::{Account, AccountType, Liability, LiabilityType, Transaction};
pub use error::{CoreError, Result};
pub use features::{
    build_signal_bundle, build_signal_bundles, SignalBundle, TimeWindow, UserSnapshot,
    WINDOW_LONG_DAYS, WINDOW_SHORT_DAYS,
};
pub use ingest::{import_records, ImportCounts, ImportSummary};
pub use personas::{
    get_latest_persona, get_persona_changes, get_persona_history, save_persona_history,
    FallbackRepair, HistoryStore, PersonaAssigner, PersonaAssignment, PersonaChange,
    PersonaHistoryEntry, PersonaId, PersonaRegistry, StoreFallbackRepair,
};
pub use store::{load_snapshot, Event, FinancialStore, MemoryStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
