use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::money;
use crate::reports;
use crate::settings::get_db_path;
use crate::snapshot;

fn balance_cell(val: Decimal) -> String {
    if val.is_zero() {
        money(val).dimmed().to_string()
    } else if val < Decimal::ZERO {
        money(val).red().to_string()
    } else {
        money(val).green().to_string()
    }
}

pub fn aging() -> Result<()> {
    let conn = get_connection(&get_db_path())?;
    let report = reports::get_aging(&conn)?;

    if report.records.is_empty() {
        println!("No aging records. Run `ledger-aging resolve` first.");
        return Ok(());
    }

    let mut header = vec!["Account".to_string(), "Name".to_string()];
    header.extend(report.columns.iter().cloned());
    header.push("Balance".to_string());

    let mut table = Table::new();
    table.set_header(header);
    for r in &report.records {
        let mut row = vec![Cell::new(&r.account_id), Cell::new(&r.account_name)];
        for key in &report.columns {
            let val = r.monthly_balances.get(key).unwrap_or(Decimal::ZERO);
            row.push(Cell::new(balance_cell(val)));
        }
        row.push(Cell::new(money(r.current_balance).bold()));
        table.add_row(row);
    }

    let mut totals = vec![Cell::new("Total".bold()), Cell::new("")];
    for val in &report.column_totals {
        totals.push(Cell::new(money(*val)));
    }
    totals.push(Cell::new(money(report.total_balance).bold()));
    table.add_row(totals);

    println!("Supplier Aging ({} accounts)\n{table}", report.records.len());
    Ok(())
}

pub fn months(account: &str) -> Result<()> {
    let conn = get_connection(&get_db_path())?;
    let detail = reports::get_account_months(&conn, account)?;

    let mut table = Table::new();
    table.set_header(vec!["Month", "Debit", "Credit", "Txns", "Documents", "Annotation"]);
    for m in &detail.months {
        let docs: Vec<String> = m.documents.iter().map(|d| d.to_string()).collect();
        let note = match &m.annotation {
            Some(a) => format!("{} {}", a.label(), money(a.monthly_balance())),
            None => String::new(),
        };
        table.add_row(vec![
            Cell::new(m.year_month),
            Cell::new(money(m.debit_total)),
            Cell::new(money(m.credit_total)),
            Cell::new(m.transaction_count),
            Cell::new(docs.join(", ")),
            Cell::new(note.dimmed()),
        ]);
    }
    println!("{} {}\n{table}", detail.account_id.bold(), detail.account_name);
    Ok(())
}

pub fn runs(limit: usize) -> Result<()> {
    let conn = get_connection(&get_db_path())?;
    let runs = snapshot::recent_runs(&conn, limit)?;

    if runs.is_empty() {
        println!("No resolve runs yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Run", "As of", "Ran at", "Records", "Zero", "Failed"]);
    for r in &runs {
        let failed = if r.failed_count > 0 {
            r.failed_count.to_string().yellow().to_string()
        } else {
            r.failed_count.to_string()
        };
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.reference_date),
            Cell::new(&r.run_at),
            Cell::new(r.record_count),
            Cell::new(r.omitted_count),
            Cell::new(failed),
        ]);
    }
    println!("Resolve Runs\n{table}");

    for r in runs.iter().filter(|r| !r.failures.is_empty()) {
        println!("\nRun #{} failures:", r.id);
        for f in &r.failures {
            println!("  {} {}", f.account_id.yellow(), f.reason);
        }
    }
    Ok(())
}
