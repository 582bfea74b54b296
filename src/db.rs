use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::error::Result;

pub const DB_FILE: &str = "aging.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    processing_year INTEGER NOT NULL,
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS ledger_entries (
    id INTEGER PRIMARY KEY,
    account_id TEXT NOT NULL,
    account_name TEXT NOT NULL DEFAULT '',
    document_number INTEGER NOT NULL,
    document_date TEXT NOT NULL,
    debit TEXT NOT NULL,
    credit TEXT NOT NULL,
    iban TEXT,
    payment_term TEXT,
    is_historical INTEGER NOT NULL DEFAULT 0,
    import_id INTEGER,
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_ledger_entries_account ON ledger_entries(account_id);

CREATE TABLE IF NOT EXISTS aging_runs (
    id INTEGER PRIMARY KEY,
    reference_date TEXT NOT NULL,
    run_at TEXT DEFAULT (datetime('now')),
    record_count INTEGER NOT NULL,
    omitted_count INTEGER NOT NULL,
    failed_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS aging_run_failures (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    account_id TEXT NOT NULL,
    reason TEXT NOT NULL,
    FOREIGN KEY (run_id) REFERENCES aging_runs(id)
);

CREATE TABLE IF NOT EXISTS aging_records (
    account_id TEXT PRIMARY KEY,
    account_name TEXT NOT NULL,
    iban TEXT,
    payment_term TEXT,
    current_balance TEXT NOT NULL,
    monthly_balances TEXT NOT NULL,
    run_id INTEGER NOT NULL,
    FOREIGN KEY (run_id) REFERENCES aging_runs(id)
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Decimals are stored as TEXT to keep exact cents.
pub fn get_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    raw.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["imports", "ledger_entries", "aging_runs", "aging_run_failures", "aging_records"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_get_decimal_keeps_exact_cents() {
        let (_dir, conn) = test_db();
        let value: Decimal = conn
            .query_row("SELECT '1234.05'", [], |r| get_decimal(r, 0))
            .unwrap();
        assert_eq!(value, dec!(1234.05));
        assert!(conn.query_row("SELECT 'abc'", [], |r| get_decimal(r, 0)).is_err());
    }
}
