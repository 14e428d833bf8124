// 📥 Ingest - CSV files into the financial store
//
// Headers match entity field names. Each row goes through a raw Record type
// and a TryFrom conversion; the first bad row aborts the import with its
// line number. Rows whose id already exists are counted as duplicates.

use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entities::{Account, AccountType, Liability, LiabilityType, Transaction};
use crate::error::{CoreError, Result};
use crate::store::FinancialStore;

// ============================================================================
// RAW RECORDS
// ============================================================================

/// true/false, 1/0, yes/no in any case; an empty cell is false
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim).map(str::to_lowercase).as_deref() {
        None | Some("") => Ok(false),
        Some("true" | "1" | "yes" | "y") => Ok(true),
        Some("false" | "0" | "no" | "n") => Ok(false),
        Some(other) => Err(de::Error::custom(format!("invalid boolean '{}'", other))),
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountRecord {
    pub account_id: String,
    pub user_id: String,
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub balance_current: f64,
    #[serde(default)]
    pub balance_available: Option<f64>,
    #[serde(default)]
    pub credit_limit: Option<f64>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub account_id: String,
    pub date: String,
    pub amount: f64,
    #[serde(default)]
    pub merchant_name: Option<String>,
    pub category_primary: String,
    #[serde(default)]
    pub category_detailed: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub pending: bool,
}

#[derive(Debug, Deserialize)]
pub struct LiabilityRecord {
    pub liability_id: String,
    pub account_id: String,
    pub liability_type: String,
    #[serde(default)]
    pub apr_percentage: Option<f64>,
    #[serde(default)]
    pub minimum_payment_amount: Option<f64>,
    #[serde(default)]
    pub last_payment_amount: Option<f64>,
    #[serde(default, deserialize_with = "flag")]
    pub is_overdue: bool,
    #[serde(default)]
    pub interest_rate: Option<f64>,
}

fn require_id(record: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoreError::malformed(record, format!("empty {}", field)));
    }
    Ok(())
}

fn require_finite(record: &str, field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(CoreError::malformed(
            record,
            format!("non-finite {} '{}'", field, v),
        )),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<AccountRecord> for Account {
    type Error = CoreError;

    fn try_from(raw: AccountRecord) -> Result<Self> {
        let record = format!("account {}", raw.account_id);
        require_id(&record, "account_id", &raw.account_id)?;
        require_id(&record, "user_id", &raw.user_id)?;
        require_id(&record, "account_type", &raw.account_type)?;
        require_finite(&record, "balance_current", Some(raw.balance_current))?;
        require_finite(&record, "balance_available", raw.balance_available)?;
        require_finite(&record, "credit_limit", raw.credit_limit)?;

        let mut account = Account::new(
            &raw.account_id,
            &raw.user_id,
            AccountType::parse(&raw.account_type),
            raw.balance_current,
        );
        account.subtype = non_empty(raw.subtype);
        account.balance_available = raw.balance_available;
        account.credit_limit = raw.credit_limit;
        if let Some(code) = non_empty(raw.iso_currency_code) {
            account.iso_currency_code = code;
        }
        Ok(account)
    }
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = CoreError;

    fn try_from(raw: TransactionRecord) -> Result<Self> {
        let record = format!("transaction {}", raw.transaction_id);
        require_id(&record, "transaction_id", &raw.transaction_id)?;
        require_id(&record, "account_id", &raw.account_id)?;
        require_finite(&record, "amount", Some(raw.amount))?;

        let date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d").map_err(|e| {
            CoreError::malformed(&record, format!("unparsable date '{}': {}", raw.date, e))
        })?;

        Ok(Transaction {
            transaction_id: raw.transaction_id,
            account_id: raw.account_id,
            date,
            amount: raw.amount,
            merchant_name: non_empty(raw.merchant_name),
            category_primary: raw.category_primary,
            category_detailed: non_empty(raw.category_detailed),
            pending: raw.pending,
        })
    }
}

impl TryFrom<LiabilityRecord> for Liability {
    type Error = CoreError;

    fn try_from(raw: LiabilityRecord) -> Result<Self> {
        let record = format!("liability {}", raw.liability_id);
        require_id(&record, "liability_id", &raw.liability_id)?;
        require_id(&record, "account_id", &raw.account_id)?;
        require_finite(&record, "apr_percentage", raw.apr_percentage)?;
        require_finite(&record, "minimum_payment_amount", raw.minimum_payment_amount)?;
        require_finite(&record, "last_payment_amount", raw.last_payment_amount)?;
        require_finite(&record, "interest_rate", raw.interest_rate)?;

        Ok(Liability {
            liability_id: raw.liability_id,
            account_id: raw.account_id,
            liability_type: LiabilityType::parse(&raw.liability_type),
            apr_percentage: raw.apr_percentage,
            minimum_payment_amount: raw.minimum_payment_amount,
            last_payment_amount: raw.last_payment_amount,
            is_overdue: raw.is_overdue,
            interest_rate: raw.interest_rate,
        })
    }
}

// ============================================================================
// CSV READING
// ============================================================================

/// Parse every row of `source` into entities, failing on the first bad row
pub fn read_records<R, T, E>(source: R, kind: &str) -> Result<Vec<E>>
where
    R: io::Read,
    T: DeserializeOwned,
    E: TryFrom<T, Error = CoreError>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers = reader
        .headers()
        .map_err(|e| CoreError::malformed(format!("{} header", kind), e))?
        .clone();

    let mut entities = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| CoreError::malformed(kind, e))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let label = format!("{} line {}", kind, line);

        let raw: T = row
            .deserialize(Some(&headers))
            .map_err(|e| CoreError::malformed(&label, e))?;
        let entity = E::try_from(raw).map_err(|e| match e {
            CoreError::MalformedRecord { record, reason } => {
                CoreError::malformed(format!("{} ({})", label, record), reason)
            }
            other => other,
        })?;
        entities.push(entity);
    }

    Ok(entities)
}

pub fn load_csv<T, E>(path: &Path, kind: &str) -> anyhow::Result<Vec<E>>
where
    T: DeserializeOwned,
    E: TryFrom<T, Error = CoreError>,
{
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
    let entities = read_records::<_, T, E>(file, kind)
        .with_context(|| format!("Failed to read {} rows from {}", kind, path.display()))?;
    Ok(entities)
}

pub fn load_accounts(path: &Path) -> anyhow::Result<Vec<Account>> {
    load_csv::<AccountRecord, Account>(path, "account")
}

pub fn load_transactions(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    load_csv::<TransactionRecord, Transaction>(path, "transaction")
}

pub fn load_liabilities(path: &Path) -> anyhow::Result<Vec<Liability>> {
    load_csv::<LiabilityRecord, Liability>(path, "liability")
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub inserted: usize,
    pub duplicates: usize,
}

impl ImportCounts {
    fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.duplicates += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub accounts: ImportCounts,
    pub transactions: ImportCounts,
    pub liabilities: ImportCounts,
}

/// Insert everything, skipping ids that already exist
pub fn import_records(
    store: &dyn FinancialStore,
    accounts: &[Account],
    transactions: &[Transaction],
    liabilities: &[Liability],
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for account in accounts {
        summary.accounts.record(store.insert_account(account)?);
    }
    for transaction in transactions {
        summary.transactions.record(store.insert_transaction(transaction)?);
    }
    for liability in liabilities {
        summary.liabilities.record(store.insert_liability(liability)?);
    }

    info!(
        accounts_inserted = summary.accounts.inserted,
        accounts_duplicates = summary.accounts.duplicates,
        transactions_inserted = summary.transactions.inserted,
        transactions_duplicates = summary.transactions.duplicates,
        liabilities_inserted = summary.liabilities.inserted,
        liabilities_duplicates = summary.liabilities.duplicates,
        "import finished"
    );

    Ok(summary)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{load_snapshot, MemoryStore};
    use std::io::Write;

    const ACCOUNTS: &str = "\
account_id,user_id,account_type,subtype,balance_current,balance_available,credit_limit,iso_currency_code
chk_1,user_1,checking,,2500.00,2400.00,,USD
cc_1,user_1,credit_card,,600.00,,1000.00,
";

    const TRANSACTIONS: &str = "\
transaction_id,account_id,date,amount,merchant_name,category_primary,category_detailed,pending
t1,chk_1,2024-06-14,-2000.00,ACME Payroll,INCOME,INCOME_WAGES,false
t2,cc_1,2024-06-10,45.50,,GENERAL_MERCHANDISE,,false
";

    const LIABILITIES: &str = "\
liability_id,account_id,liability_type,apr_percentage,minimum_payment_amount,last_payment_amount,is_overdue,interest_rate
l1,cc_1,credit_card,24.99,25.00,,true,
";

    #[test]
    fn test_read_all_kinds() {
        let accounts: Vec<Account> =
            read_records::<_, AccountRecord, _>(ACCOUNTS.as_bytes(), "account").unwrap();
        let transactions: Vec<Transaction> =
            read_records::<_, TransactionRecord, _>(TRANSACTIONS.as_bytes(), "transaction").unwrap();
        let liabilities: Vec<Liability> =
            read_records::<_, LiabilityRecord, _>(LIABILITIES.as_bytes(), "liability").unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].balance_available, Some(2400.0));
        assert_eq!(accounts[1].account_type, AccountType::CreditCard);
        assert_eq!(accounts[1].iso_currency_code, "USD");
        assert_eq!(accounts[1].subtype, None);

        assert_eq!(transactions[0].date, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
        assert_eq!(transactions[0].category_detailed.as_deref(), Some("INCOME_WAGES"));
        assert_eq!(transactions[1].merchant_name, None);

        assert!(liabilities[0].is_overdue);
        assert_eq!(liabilities[0].apr_percentage, Some(24.99));
        assert_eq!(liabilities[0].last_payment_amount, None);
    }

    #[test]
    fn test_bad_date_fails_with_line_number() {
        let csv = "\
transaction_id,account_id,date,amount,merchant_name,category_primary,category_detailed,pending
t1,chk_1,2024-06-14,-2000.00,,INCOME,,false
t2,chk_1,06/15/2024,10.00,,FOOD_AND_DRINK,,false
";
        let err = read_records::<_, TransactionRecord, Transaction>(csv.as_bytes(), "transaction")
            .unwrap_err();

        assert!(err.is_malformed());
        let message = err.to_string();
        assert!(message.contains("transaction line 3"));
        assert!(message.contains("transaction t2"));
        assert!(message.contains("06/15/2024"));

        println!("✅ Fail-fast malformed row PASSED");
    }

    #[test]
    fn test_non_numeric_amount_is_malformed() {
        let csv = "\
transaction_id,account_id,date,amount,merchant_name,category_primary,category_detailed,pending
t1,chk_1,2024-06-14,abc,,INCOME,,false
";
        let err = read_records::<_, TransactionRecord, Transaction>(csv.as_bytes(), "transaction")
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_boolean_spellings() {
        let csv = "\
transaction_id,account_id,date,amount,merchant_name,category_primary,category_detailed,pending
t1,chk_1,2024-06-14,1.00,,FOOD_AND_DRINK,,True
t2,chk_1,2024-06-14,1.00,,FOOD_AND_DRINK,,1
t3,chk_1,2024-06-14,1.00,,FOOD_AND_DRINK,,
t4,chk_1,2024-06-14,1.00,,FOOD_AND_DRINK,,FALSE
t5,chk_1,2024-06-14,1.00,,FOOD_AND_DRINK,,no
";
        let transactions: Vec<Transaction> =
            read_records::<_, TransactionRecord, _>(csv.as_bytes(), "transaction").unwrap();
        let pending: Vec<bool> = transactions.iter().map(|t| t.pending).collect();
        assert_eq!(pending, vec![true, true, false, false, false]);

        let liabilities = "\
liability_id,account_id,liability_type,is_overdue
l1,cc_1,credit_card,Yes
";
        let liabilities: Vec<Liability> =
            read_records::<_, LiabilityRecord, _>(liabilities.as_bytes(), "liability").unwrap();
        assert!(liabilities[0].is_overdue);

        let bad = "\
transaction_id,account_id,date,amount,merchant_name,category_primary,category_detailed,pending
t1,chk_1,2024-06-14,1.00,,FOOD_AND_DRINK,,maybe
";
        let err = read_records::<_, TransactionRecord, Transaction>(bad.as_bytes(), "transaction")
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("line 2"));

        println!("✅ Boolean spellings PASSED");
    }

    #[test]
    fn test_empty_id_is_malformed() {
        let csv = "\
account_id,user_id,account_type,balance_current
,user_1,checking,10.0
";
        let err = read_records::<_, AccountRecord, Account>(csv.as_bytes(), "account").unwrap_err();
        assert!(err.to_string().contains("empty account_id"));
    }

    #[test]
    fn test_import_counts_duplicates() {
        let store = MemoryStore::new();
        let accounts: Vec<Account> =
            read_records::<_, AccountRecord, _>(ACCOUNTS.as_bytes(), "account").unwrap();
        let transactions: Vec<Transaction> =
            read_records::<_, TransactionRecord, _>(TRANSACTIONS.as_bytes(), "transaction").unwrap();
        let liabilities: Vec<Liability> =
            read_records::<_, LiabilityRecord, _>(LIABILITIES.as_bytes(), "liability").unwrap();

        let first = import_records(&store, &accounts, &transactions, &liabilities).unwrap();
        let second = import_records(&store, &accounts, &transactions, &liabilities).unwrap();

        assert_eq!(first.transactions, ImportCounts { inserted: 2, duplicates: 0 });
        assert_eq!(second.transactions, ImportCounts { inserted: 0, duplicates: 2 });
        assert_eq!(second.accounts.duplicates, 2);
        assert_eq!(second.liabilities.duplicates, 1);
        assert_eq!(load_snapshot(&store, "user_1").unwrap().transactions.len(), 2);

        println!("✅ Idempotent import PASSED");
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ACCOUNTS.as_bytes()).unwrap();

        let accounts = load_accounts(file.path()).unwrap();
        assert_eq!(accounts.len(), 2);

        let missing = load_transactions(Path::new("/nonexistent/transactions.csv")).unwrap_err();
        assert!(missing.to_string().contains("Failed to open CSV file"));
    }
}
