use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;
use crate::snapshot::last_run;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Data dir:        {}", data_dir.display());
    println!("Database:        {}", db_path.display());
    println!("Processing year: {}", settings.effective_processing_year());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `ledger-aging init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:         {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    let entries: i64 = conn.query_row("SELECT count(*) FROM ledger_entries", [], |r| r.get(0))?;
    let historical: i64 = conn.query_row(
        "SELECT count(*) FROM ledger_entries WHERE is_historical = 1",
        [],
        |r| r.get(0),
    )?;
    let accounts: i64 = conn.query_row(
        "SELECT count(DISTINCT account_id) FROM ledger_entries",
        [],
        |r| r.get(0),
    )?;
    let records: i64 = conn.query_row("SELECT count(*) FROM aging_records", [], |r| r.get(0))?;

    println!();
    println!("Accounts:        {accounts}");
    println!("Ledger entries:  {entries} ({historical} historical)");
    println!("Aging records:   {records}");

    match last_run(&conn)? {
        Some(run) => println!(
            "Last resolve:    #{} as of {} at {} ({} failed)",
            run.id, run.reference_date, run.run_at, run.failed_count
        ),
        None => println!("Last resolve:    never"),
    }
    Ok(())
}
