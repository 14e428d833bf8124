// 🔬 Feature Analyzers - windowed behavioral signals
//
// Each analyzer takes already-filtered transactions plus the window size and
// returns a typed record with a `to_map()` dictionary form. All of them are
// total: thin data degrades to zeros and None, never to an error.

pub mod credit;
pub mod income;
pub mod lifestyle;
pub mod loans;
pub mod savings;
pub mod signals;
pub mod stats;
pub mod subscriptions;
pub mod window;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

pub use credit::CreditSignals;
pub use income::{IncomeSignals, PaymentFrequency};
pub use lifestyle::{LifestyleSignals, LifestyleTrend};
pub use loans::{LoanSignals, LoanTypeSummary};
pub use savings::SavingsSignals;
pub use signals::{build_signal_bundle, build_signal_bundles, SignalBundle, UserSnapshot};
pub use subscriptions::{Cadence, SubscriptionSignals};
pub use window::{TimeWindow, STANDARD_WINDOWS, WINDOW_LONG_DAYS, WINDOW_SHORT_DAYS};

/// Top-level fields of a signal record as a sorted map
pub(crate) fn to_map<T: Serialize>(record: &T) -> BTreeMap<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}
