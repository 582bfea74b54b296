use std::time::{Duration, Instant};

use colored::Colorize;

use crate::db::{get_connection, init_db};
use crate::error::{AgingError, Result};
use crate::fmt::money;
use crate::importer::{load_entries, parse_date};
use crate::reports::checked_total;
use crate::resolver::{resolve_all, ProcessingReference, Resolution};
use crate::settings::{get_db_path, load_settings};
use crate::snapshot::replace_records;

fn parse_reference(as_of: Option<&str>) -> Result<ProcessingReference> {
    match as_of {
        Some(raw) => parse_date(raw)
            .map(ProcessingReference::new)
            .ok_or_else(|| AgingError::InvalidDate(raw.to_string())),
        None => Ok(ProcessingReference::today()),
    }
}

/// Fails when the computation overran the budget; nothing is persisted then.
fn check_budget(elapsed: Duration, budget_secs: Option<u64>) -> Result<()> {
    match budget_secs {
        Some(budget) if elapsed > Duration::from_secs(budget) => Err(AgingError::BudgetExceeded {
            elapsed_secs: elapsed.as_secs_f64(),
            budget_secs: budget,
        }),
        _ => Ok(()),
    }
}

pub fn run(as_of: Option<&str>) -> Result<()> {
    let reference = parse_reference(as_of)?;
    let settings = load_settings();
    let conn = get_connection(&get_db_path())?;
    init_db(&conn)?;

    let started = Instant::now();
    let entries = load_entries(&conn)?;
    let resolution = resolve_all(&entries, reference)?;
    check_budget(started.elapsed(), settings.resolve_budget_secs)?;

    let run_id = replace_records(&conn, &resolution)?;
    print_summary(run_id, &resolution);
    Ok(())
}

fn outstanding(resolution: &Resolution) -> String {
    match checked_total(resolution.records.iter().map(|r| r.current_balance)) {
        Some(total) => money(total),
        None => {
            log::warn!("Outstanding total across accounts overflowed");
            "overflowed".to_string()
        }
    }
}

fn print_summary(run_id: i64, resolution: &Resolution) {
    println!(
        "Run #{run_id} as of {}: {} records, {} accounts at zero, outstanding {}",
        resolution.reference.date(),
        resolution.records.len(),
        resolution.omitted.len(),
        outstanding(resolution)
    );
    if !resolution.failures.is_empty() {
        println!(
            "{}",
            format!("{} accounts skipped:", resolution.failures.len()).yellow().bold()
        );
        for failure in &resolution.failures {
            println!("  {} {}", failure.account_id.yellow(), failure.reason);
        }
    }
}
