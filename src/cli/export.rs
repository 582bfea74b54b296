use std::io::Write;
use std::path::PathBuf;

use crate::cli::ExportFormat;
use crate::db::get_connection;
use crate::error::Result;
use crate::models::{AgingRecord, OLDER_KEY};
use crate::settings::get_db_path;
use crate::snapshot::load_records;

pub fn write_csv<W: Write>(w: W, records: &[AgingRecord]) -> Result<()> {
    let mut wrt = csv::Writer::from_writer(w);

    let months: Vec<String> = records
        .first()
        .map(|r| r.monthly_balances.months().iter().map(|m| m.to_string()).collect())
        .unwrap_or_default();

    let mut header = vec!["account_id", "account_name", "iban", "payment_term", OLDER_KEY];
    header.extend(months.iter().map(String::as_str));
    header.push("current_balance");
    wrt.write_record(&header)?;

    for r in records {
        let mut row = vec![
            r.account_id.clone(),
            r.account_name.clone(),
            r.iban.clone().unwrap_or_default(),
            r.payment_term.clone().unwrap_or_default(),
            r.monthly_balances.older.to_string(),
        ];
        row.extend(r.monthly_balances.recent.iter().map(|(_, v)| v.to_string()));
        row.push(r.current_balance.to_string());
        wrt.write_record(&row)?;
    }
    wrt.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(mut w: W, records: &[AgingRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut w, records)?;
    writeln!(w)?;
    Ok(())
}

pub fn run(format: ExportFormat, output: Option<String>) -> Result<()> {
    let conn = get_connection(&get_db_path())?;
    let records = load_records(&conn)?;

    let writer: Box<dyn Write> = match &output {
        Some(path) => {
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Box::new(std::fs::File::create(path)?)
        }
        None => Box::new(std::io::stdout()),
    };

    match format {
        ExportFormat::Csv => write_csv(writer, &records)?,
        ExportFormat::Json => write_json(writer, &records)?,
    }

    if let Some(path) = output {
        eprintln!("Wrote {} records to {path}", records.len());
    }
    Ok(())
}
