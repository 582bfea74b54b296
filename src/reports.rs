use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::accumulator::accumulate;
use crate::error::{AgingError, Result};
use crate::importer::load_entries;
use crate::models::{AgingRecord, BucketAnnotation, YearMonth, OLDER_KEY};
use crate::resolver::annotate_anomalies;
use crate::snapshot::load_records;

// ---------------------------------------------------------------------------
// Aging summary
// ---------------------------------------------------------------------------

pub struct AgingReport {
    /// Bucket keys in column order: `older`, then the four months oldest first.
    pub columns: Vec<String>,
    pub records: Vec<AgingRecord>,
    pub column_totals: Vec<Decimal>,
    pub total_balance: Decimal,
}

/// Sum across accounts; `None` when the total leaves the decimal range.
pub fn checked_total(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

pub fn get_aging(conn: &Connection) -> Result<AgingReport> {
    let records = load_records(conn)?;

    let mut columns = vec![OLDER_KEY.to_string()];
    if let Some(first) = records.first() {
        columns.extend(first.monthly_balances.months().iter().map(|m| m.to_string()));
    }

    let column_totals = columns
        .iter()
        .map(|key| {
            checked_total(records.iter().filter_map(|r| r.monthly_balances.get(key)))
                .ok_or_else(|| AgingError::Other(format!("column total for {key} overflowed")))
        })
        .collect::<Result<Vec<_>>>()?;
    let total_balance = checked_total(records.iter().map(|r| r.current_balance))
        .ok_or_else(|| AgingError::Other("total balance overflowed".to_string()))?;

    Ok(AgingReport {
        columns,
        records,
        column_totals,
        total_balance,
    })
}

// ---------------------------------------------------------------------------
// Month detail for one account
// ---------------------------------------------------------------------------

pub struct MonthRow {
    pub year_month: YearMonth,
    pub debit_total: Decimal,
    pub credit_total: Decimal,
    pub transaction_count: u32,
    pub documents: Vec<i64>,
    pub annotation: Option<BucketAnnotation>,
}

pub struct AccountMonths {
    pub account_id: String,
    pub account_name: String,
    pub months: Vec<MonthRow>,
}

/// Month buckets for one account, recomputed from the stored ledger with
/// the anomaly annotations applied.
pub fn get_account_months(conn: &Connection, account_id: &str) -> Result<AccountMonths> {
    let entries = load_entries(conn)?;
    let mut ledger = accumulate(&entries);
    let account = ledger
        .accounts
        .get_mut(account_id)
        .ok_or_else(|| AgingError::Other(format!("Unknown account: {account_id}")))?;
    annotate_anomalies(account, &ledger.document_credits);

    let months = account
        .months
        .iter()
        .map(|(ym, bucket)| {
            let mut documents = bucket.document_numbers.clone();
            documents.dedup();
            MonthRow {
                year_month: *ym,
                debit_total: bucket.debit_total,
                credit_total: bucket.credit_total,
                transaction_count: bucket.transaction_count,
                documents,
                annotation: bucket.annotation,
            }
        })
        .collect();

    Ok(AccountMonths {
        account_id: account_id.to_string(),
        account_name: account.meta.account_name().to_string(),
        months,
    })
}
