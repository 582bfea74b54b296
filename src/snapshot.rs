use rusqlite::types::Type;
use rusqlite::Connection;

use crate::db::get_decimal;
use crate::error::Result;
use crate::models::{AgingRecord, MonthlyBalances};
use crate::resolver::{AccountFailure, Resolution};

pub struct RunSummary {
    pub id: i64,
    pub reference_date: String,
    pub run_at: String,
    pub record_count: i64,
    pub omitted_count: i64,
    pub failed_count: i64,
    pub failures: Vec<AccountFailure>,
}

/// Replace the persisted aging records with a freshly computed set. The run
/// log, the delete and the inserts share one transaction, so readers see
/// either the previous snapshot or the new one, never a mix.
pub fn replace_records(conn: &Connection, resolution: &Resolution) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO aging_runs (reference_date, record_count, omitted_count, failed_count) \
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            resolution.reference.date().to_string(),
            resolution.records.len() as i64,
            resolution.omitted.len() as i64,
            resolution.failures.len() as i64,
        ],
    )?;
    let run_id = tx.last_insert_rowid();

    for failure in &resolution.failures {
        tx.execute(
            "INSERT INTO aging_run_failures (run_id, account_id, reason) VALUES (?1, ?2, ?3)",
            rusqlite::params![run_id, failure.account_id, failure.reason],
        )?;
    }

    tx.execute("DELETE FROM aging_records", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO aging_records (account_id, account_name, iban, payment_term, \
             current_balance, monthly_balances, run_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for record in &resolution.records {
            stmt.execute(rusqlite::params![
                record.account_id,
                record.account_name,
                record.iban,
                record.payment_term,
                record.current_balance.to_string(),
                serde_json::to_string(&record.monthly_balances)?,
                run_id,
            ])?;
        }
    }

    tx.commit()?;
    Ok(run_id)
}

pub fn load_records(conn: &Connection) -> Result<Vec<AgingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, account_name, iban, payment_term, current_balance, monthly_balances \
         FROM aging_records ORDER BY account_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let raw_balances: String = row.get(5)?;
        let monthly_balances: MonthlyBalances = serde_json::from_str(&raw_balances)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
        Ok(AgingRecord {
            account_id: row.get(0)?,
            account_name: row.get(1)?,
            iban: row.get(2)?,
            payment_term: row.get(3)?,
            current_balance: get_decimal(row, 4)?,
            monthly_balances,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

fn run_failures(conn: &Connection, run_id: i64) -> Result<Vec<AccountFailure>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, reason FROM aging_run_failures WHERE run_id = ?1 ORDER BY account_id",
    )?;
    let rows = stmt.query_map([run_id], |row| {
        Ok(AccountFailure {
            account_id: row.get(0)?,
            reason: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Most recent runs first.
pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<RunSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, reference_date, run_at, record_count, omitted_count, failed_count \
         FROM aging_runs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok(RunSummary {
            id: row.get(0)?,
            reference_date: row.get(1)?,
            run_at: row.get(2)?,
            record_count: row.get(3)?,
            omitted_count: row.get(4)?,
            failed_count: row.get(5)?,
            failures: Vec::new(),
        })
    })?;
    let mut runs = rows.collect::<std::result::Result<Vec<_>, _>>()?;
    for run in &mut runs {
        run.failures = run_failures(conn, run.id)?;
    }
    Ok(runs)
}

pub fn last_run(conn: &Connection) -> Result<Option<RunSummary>> {
    Ok(recent_runs(conn, 1)?.into_iter().next())
}
