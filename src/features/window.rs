// ⏰ Time Windows - trailing spans signals are computed over
//
// A window is [reference - days, reference], inclusive on both ends.
// Transaction dates carry no time of day; they are compared as midnight UTC,
// so with a reference of 14:00 the date exactly `days` ago falls outside.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Transaction;

/// Short window (primary persona)
pub const WINDOW_SHORT_DAYS: u32 = 30;

/// Long window (trend / history persona)
pub const WINDOW_LONG_DAYS: u32 = 180;

/// Subscription recurrence is always checked over this lookback
pub const SUBSCRIPTION_LOOKBACK_DAYS: u32 = 90;

/// Both windows, in evaluation order
pub const STANDARD_WINDOWS: [u32; 2] = [WINDOW_SHORT_DAYS, WINDOW_LONG_DAYS];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub days: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of `days` ending at `reference`
    pub fn ending_at(days: u32, reference: DateTime<Utc>) -> Self {
        TimeWindow {
            days,
            start: reference - Duration::days(i64::from(days)),
            end: reference,
        }
    }

    /// Window of `days` ending now
    pub fn trailing(days: u32) -> Self {
        Self::ending_at(days, Utc::now())
    }

    /// Inclusive on both bounds
    pub fn contains(&self, date: NaiveDate) -> bool {
        let at = date_to_utc(date);
        self.start <= at && at <= self.end
    }

    /// Transactions dated inside the window, input order preserved
    pub fn filter(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        transactions
            .iter()
            .filter(|t| self.contains(t.date))
            .cloned()
            .collect()
    }

    pub fn label(&self) -> String {
        window_label(self.days)
    }
}

/// (start, end) for a window; `reference` defaults to now
pub fn get_date_range(
    days: u32,
    reference: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let window = TimeWindow::ending_at(days, reference.unwrap_or_else(Utc::now));
    (window.start, window.end)
}

/// Filter transactions to a window; `reference` defaults to now
pub fn filter_transactions_by_window(
    transactions: &[Transaction],
    days: u32,
    reference: Option<DateTime<Utc>>,
) -> Vec<Transaction> {
    TimeWindow::ending_at(days, reference.unwrap_or_else(Utc::now)).filter(transactions)
}

pub fn window_label(days: u32) -> String {
    format!("{}d", days)
}

/// Midnight UTC of a calendar date
pub fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

// ============================================================================
// TESTS
// ============================================================================
