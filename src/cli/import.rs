use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::importer::import_file;
use crate::settings::{get_db_path, load_settings};

pub fn run(file: &str, year: Option<i32>) -> Result<()> {
    let file_path = PathBuf::from(file);
    let processing_year = year.unwrap_or_else(|| load_settings().effective_processing_year());
    let conn = get_connection(&get_db_path())?;
    init_db(&conn)?;

    let result = import_file(&conn, &file_path, processing_year)?;

    if result.duplicate_file {
        println!("This file has already been imported for {processing_year} (duplicate checksum).");
        return Ok(());
    }

    println!(
        "{} current-year entries ({} replaced), {} historical added, {} historical already stored",
        result.current, result.replaced, result.historical_added, result.historical_skipped
    );
    if result.invalid > 0 {
        println!("{} rows skipped (invalid)", result.invalid);
    }
    println!("Run `ledger-aging resolve` to refresh aging records.");
    Ok(())
}
