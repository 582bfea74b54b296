use std::collections::HashMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::db::get_decimal;
use crate::error::{AgingError, Result};
use crate::models::LedgerEntry;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an ERP amount. Accepts `1,234.56`, `1.234,56`, `1234,56` and
/// quoted values; blank is zero. Negative amounts are rejected since debit
/// and credit are carried in separate columns.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let s: String = raw
        .trim()
        .trim_matches('"')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if s.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let invalid = || AgingError::InvalidAmount(raw.trim().to_string());

    let normalized = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(comma)) if s.len() - comma - 1 <= 2 && s.matches(',').count() == 1 => {
            s.replace(',', ".")
        }
        (None, Some(_)) => s.replace(',', ""),
        _ => s,
    };

    let value: Decimal = normalized.parse().map_err(|_| invalid())?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid());
    }
    Ok(value.round_dp(2))
}

/// `YYYY-MM-DD` or the ERP's `DD.MM.YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
        .ok()
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

// ---------------------------------------------------------------------------
// CSV export parser
// ---------------------------------------------------------------------------

const REQUIRED_COLUMNS: &[&str] = &["account_id", "document_number", "document_date", "debit", "credit"];

pub struct ParsedExport {
    pub entries: Vec<LedgerEntry>,
    /// Rows skipped because a field failed validation.
    pub invalid: usize,
}

/// Read an ERP ledger export. Columns are matched by header name, case
/// insensitive; `account_name`, `iban` and `payment_term` are optional.
/// Entries dated outside `processing_year` are marked historical.
pub fn parse_export(file_path: &Path, processing_year: i32) -> Result<ParsedExport> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));

    let columns: HashMap<String, usize> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();
    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(*required) {
            return Err(AgingError::MissingColumn(required.to_string()));
        }
    }
    let columns = Columns(columns);

    let mut entries = Vec::new();
    let mut invalid = 0usize;

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        match parse_row(&columns, &record, processing_year) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(e) => {
                log::warn!("{}: skipping row {}: {e}", file_path.display(), line + 2);
                invalid += 1;
            }
        }
    }

    Ok(ParsedExport { entries, invalid })
}

/// Header name to column index.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> &'r str {
        self.0
            .get(name)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
            .trim()
    }
}

fn parse_row(
    columns: &Columns,
    record: &csv::StringRecord,
    processing_year: i32,
) -> Result<Option<LedgerEntry>> {
    let field = |name: &str| columns.get(record, name);

    let account_id = field("account_id");
    if account_id.is_empty() {
        // Blank lines and footer rows.
        if REQUIRED_COLUMNS[1..].iter().all(|c| field(c).is_empty()) {
            return Ok(None);
        }
        return Err(AgingError::Other("missing account_id".to_string()));
    }

    let raw_doc = field("document_number");
    let document_number: i64 = raw_doc
        .parse()
        .map_err(|_| AgingError::Other(format!("invalid document_number: {raw_doc}")))?;

    let raw_date = field("document_date");
    let document_date = parse_date(raw_date).ok_or_else(|| AgingError::InvalidDate(raw_date.to_string()))?;

    Ok(Some(LedgerEntry {
        account_id: account_id.to_string(),
        account_name: field("account_name").to_string(),
        document_number,
        document_date,
        debit: parse_amount(field("debit"))?,
        credit: parse_amount(field("credit"))?,
        iban: non_empty(field("iban")),
        payment_term: non_empty(field("payment_term")),
        is_historical: document_date.year() != processing_year,
    }))
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ImportResult {
    pub current: usize,
    /// Current-year entries deleted before the reinsert.
    pub replaced: usize,
    pub historical_added: usize,
    pub historical_skipped: usize,
    pub invalid: usize,
    pub duplicate_file: bool,
}

/// Matches only rows stored by earlier imports, so repeated identical lines
/// within one file are all kept.
fn historical_exists(conn: &Connection, entry: &LedgerEntry, import_id: i64) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM ledger_entries WHERE is_historical = 1 AND account_id = ?1 \
         AND document_number = ?2 AND document_date = ?3 AND debit = ?4 AND credit = ?5 \
         AND (import_id IS NULL OR import_id != ?6)",
    )?;
    Ok(stmt.exists(rusqlite::params![
        entry.account_id,
        entry.document_number,
        entry.document_date.to_string(),
        entry.debit.to_string(),
        entry.credit.to_string(),
        import_id,
    ])?)
}

fn insert_entry(conn: &Connection, entry: &LedgerEntry, import_id: i64) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO ledger_entries (account_id, account_name, document_number, document_date, \
         debit, credit, iban, payment_term, is_historical, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    stmt.execute(rusqlite::params![
        entry.account_id,
        entry.account_name,
        entry.document_number,
        entry.document_date.to_string(),
        entry.debit.to_string(),
        entry.credit.to_string(),
        entry.iban,
        entry.payment_term,
        entry.is_historical as i32,
        import_id,
    ])?;
    Ok(())
}

/// Sync an ERP export into the ledger. Current-year entries are fully
/// replaced; historical entries are appended unless an earlier import already
/// stored them. Re-importing the latest file is a no-op. The whole sync is
/// one transaction.
pub fn import_file(conn: &Connection, file_path: &Path, processing_year: i32) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    // Only the latest import counts: going back to an earlier export must
    // still replace the current-year rows.
    let latest = conn
        .query_row(
            "SELECT checksum FROM imports WHERE processing_year = ?1 ORDER BY id DESC LIMIT 1",
            [processing_year],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    if latest.as_deref() == Some(checksum.as_str()) {
        return Ok(ImportResult {
            duplicate_file: true,
            ..Default::default()
        });
    }

    let parsed = parse_export(file_path, processing_year)?;
    if parsed.entries.is_empty() {
        return Err(AgingError::Other(format!(
            "No ledger rows found in {}; existing entries left untouched",
            file_path.display()
        )));
    }

    let min_date = parsed.entries.iter().map(|e| e.document_date).min();
    let max_date = parsed.entries.iter().map(|e| e.document_date).max();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO imports (filename, processing_year, record_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            processing_year,
            parsed.entries.len() as i64,
            min_date.map(|d| d.to_string()),
            max_date.map(|d| d.to_string()),
            checksum,
        ],
    )?;
    let import_id = tx.last_insert_rowid();

    let mut result = ImportResult {
        invalid: parsed.invalid,
        ..Default::default()
    };
    result.replaced = tx.execute("DELETE FROM ledger_entries WHERE is_historical = 0", [])?;

    for entry in &parsed.entries {
        if entry.is_historical {
            if historical_exists(&tx, entry, import_id)? {
                result.historical_skipped += 1;
                continue;
            }
            result.historical_added += 1;
        } else {
            result.current += 1;
        }
        insert_entry(&tx, entry, import_id)?;
    }
    tx.commit()?;

    log::info!(
        "Imported {}: {} current ({} replaced), {} historical added, {} historical skipped, {} invalid",
        file_path.display(),
        result.current,
        result.replaced,
        result.historical_added,
        result.historical_skipped,
        result.invalid
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

const ENTRY_COLUMNS: &str = "account_id, account_name, document_number, document_date, debit, credit, \
                             iban, payment_term, is_historical";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let raw_date: String = row.get(3)?;
    let document_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(LedgerEntry {
        account_id: row.get(0)?,
        account_name: row.get(1)?,
        document_number: row.get(2)?,
        document_date,
        debit: get_decimal(row, 4)?,
        credit: get_decimal(row, 5)?,
        iban: row.get(6)?,
        payment_term: row.get(7)?,
        is_historical: row.get::<_, i32>(8)? != 0,
    })
}

/// Full ledger snapshot, historical and current entries alike.
pub fn load_entries(conn: &Connection) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_entry)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use rust_decimal_macros::dec;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    const HEADER: &str = "account_id,account_name,document_number,document_date,debit,credit,iban,payment_term";

    fn write_export(dir: &Path, name: &str, rows: &[&str]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut content = format!("{HEADER}\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount("1.234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount("1234,5").unwrap(), dec!(1234.5));
        assert_eq!(parse_amount("1,234,567").unwrap(), dec!(1234567));
        assert_eq!(parse_amount("\"2 000.00\"").unwrap(), dec!(2000.00));
        assert_eq!(parse_amount("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("10.005").unwrap(), dec!(10.00));
    }

    #[test]
    fn test_parse_amount_rejects_negative_and_garbage() {
        assert!(parse_amount("-5.00").is_err());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-15"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("15.03.2024"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("03/15/2024"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn test_parse_export_marks_historical_and_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(dir.path(), "ledger.csv", &[
            "320.01,Acme Tekstil,100,2024-01-10,\"1,000.00\",,TR12 0001,30",
            "320.01,Acme Tekstil,101,15.12.2023,,250.00,,",
            "320.01,Acme Tekstil,102,not-a-date,5.00,,,",
            ",,,,,,,",
        ]);
        let parsed = parse_export(&path, 2024).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.invalid, 1);

        let first = &parsed.entries[0];
        assert_eq!(first.account_id, "320.01");
        assert_eq!(first.debit, dec!(1000.00));
        assert_eq!(first.credit, Decimal::ZERO);
        assert_eq!(first.iban.as_deref(), Some("TR12 0001"));
        assert!(!first.is_historical);

        let second = &parsed.entries[1];
        assert!(second.is_historical);
        assert_eq!(second.credit, dec!(250.00));
        assert_eq!(second.iban, None);
    }

    #[test]
    fn test_parse_export_requires_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "account_id,document_date,debit,credit\nA,2024-01-01,1,0\n").unwrap();
        let err = parse_export(&path, 2024).err().unwrap();
        assert!(matches!(err, AgingError::MissingColumn(c) if c == "document_number"));
    }

    #[test]
    fn test_import_replaces_current_year_entries() {
        let (dir, conn) = test_db();
        let first = write_export(dir.path(), "first.csv", &[
            "A1,Acme,1,2024-01-10,1000.00,,,",
            "A1,Acme,2,2024-02-10,,400.00,,",
        ]);
        let r1 = import_file(&conn, &first, 2024).unwrap();
        assert_eq!(r1.current, 2);
        assert_eq!(r1.replaced, 0);

        let second = write_export(dir.path(), "second.csv", &[
            "A1,Acme,1,2024-01-10,1000.00,,,",
            "A1,Acme,2,2024-02-10,,400.00,,",
            "A1,Acme,3,2024-03-10,,800.00,,",
        ]);
        let r2 = import_file(&conn, &second, 2024).unwrap();
        assert_eq!(r2.current, 3);
        assert_eq!(r2.replaced, 2);

        let entries = load_entries(&conn).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].credit, dec!(800.00));
    }

    #[test]
    fn test_import_keeps_historical_entries_across_cycles() {
        let (dir, conn) = test_db();
        let first = write_export(dir.path(), "first.csv", &[
            "A1,Acme,7,2023-11-10,,90.00,,",
            "A1,Acme,8,2024-01-10,10.00,,,",
        ]);
        import_file(&conn, &first, 2024).unwrap();

        let second = write_export(dir.path(), "second.csv", &[
            "A1,Acme,7,2023-11-10,,90.00,,",
            "A1,Acme,9,2024-02-10,20.00,,,",
        ]);
        let r2 = import_file(&conn, &second, 2024).unwrap();
        assert_eq!(r2.historical_skipped, 1);
        assert_eq!(r2.historical_added, 0);

        let entries = load_entries(&conn).unwrap();
        let docs: Vec<i64> = entries.iter().map(|e| e.document_number).collect();
        assert_eq!(docs, vec![7, 9]);
        assert!(entries[0].is_historical);
    }

    #[test]
    fn test_import_detects_duplicate_file() {
        let (dir, conn) = test_db();
        let path = write_export(dir.path(), "ledger.csv", &["A1,Acme,1,2024-01-10,5.00,,,"]);
        import_file(&conn, &path, 2024).unwrap();
        let again = import_file(&conn, &path, 2024).unwrap();
        assert!(again.duplicate_file);
        let count: i64 = conn.query_row("SELECT count(*) FROM imports", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_import_keeps_repeated_historical_lines_in_one_file() {
        let (dir, conn) = test_db();
        let path = write_export(dir.path(), "ledger.csv", &[
            "A1,Acme,7,2023-11-10,,100.00,,",
            "A1,Acme,7,2023-11-10,,100.00,,",
            "A1,Acme,8,2024-01-10,5.00,,,",
        ]);
        let r = import_file(&conn, &path, 2024).unwrap();
        assert_eq!(r.historical_added, 2);
        assert_eq!(r.historical_skipped, 0);

        let credit: Decimal = load_entries(&conn)
            .unwrap()
            .iter()
            .filter(|e| e.is_historical)
            .map(|e| e.credit)
            .sum();
        assert_eq!(credit, dec!(200.00));

        // A later export carrying the same two lines adds nothing.
        let next = write_export(dir.path(), "next.csv", &[
            "A1,Acme,7,2023-11-10,,100.00,,",
            "A1,Acme,7,2023-11-10,,100.00,,",
            "A1,Acme,9,2024-02-10,6.00,,,",
        ]);
        let r = import_file(&conn, &next, 2024).unwrap();
        assert_eq!(r.historical_added, 0);
        assert_eq!(r.historical_skipped, 2);
        assert_eq!(load_entries(&conn).unwrap().len(), 3);
    }

    #[test]
    fn test_reimport_of_earlier_export_replaces_current_year() {
        let (dir, conn) = test_db();
        let a = write_export(dir.path(), "a.csv", &["A1,Acme,1,2024-01-10,5.00,,,"]);
        let b = write_export(dir.path(), "b.csv", &[
            "A1,Acme,1,2024-01-10,5.00,,,",
            "A1,Acme,2,2024-02-10,,3.00,,",
        ]);
        import_file(&conn, &a, 2024).unwrap();
        import_file(&conn, &b, 2024).unwrap();

        let again = import_file(&conn, &a, 2024).unwrap();
        assert!(!again.duplicate_file);
        assert_eq!(again.replaced, 2);
        let entries = load_entries(&conn).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document_number, 1);
    }

    #[test]
    fn test_import_of_empty_file_leaves_ledger_untouched() {
        let (dir, conn) = test_db();
        let good = write_export(dir.path(), "good.csv", &["A1,Acme,1,2024-01-10,5.00,,,"]);
        import_file(&conn, &good, 2024).unwrap();
        let empty = write_export(dir.path(), "empty.csv", &[]);
        assert!(import_file(&conn, &empty, 2024).is_err());
        assert_eq!(load_entries(&conn).unwrap().len(), 1);
    }
}
