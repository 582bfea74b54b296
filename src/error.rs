use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgingError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid month (expected YYYY-MM): {0}")]
    InvalidMonth(String),

    #[error("Missing column in import file: {0}")]
    MissingColumn(String),

    #[error("Ledger snapshot is empty; refusing to replace aging records")]
    EmptySnapshot,

    #[error("Decimal overflow for account {account_id} ({context})")]
    Overflow { account_id: String, context: String },

    #[error("Resolve took {elapsed_secs:.1}s, over the {budget_secs}s budget; previous snapshot kept")]
    BudgetExceeded { elapsed_secs: f64, budget_secs: u64 },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AgingError>;
