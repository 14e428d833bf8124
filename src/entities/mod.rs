// Entity Models - the read-only inputs of the signal engine
//
// Accounts, transactions and liabilities are owned by the storage layer.
// The engine never mutates them, except for the fallback repair step.

pub mod account;
pub mod liability;
pub mod transaction;

pub use account::{Account, AccountType};
pub use liability::{Liability, LiabilityType};
pub use transaction::{chronological, Transaction};
