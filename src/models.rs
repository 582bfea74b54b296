use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AgingError;

/// Calendar month key. Ordering is chronological and matches the
/// lexicographic order of the `YYYY-MM` rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        ((1..=12).contains(&month) && (0..=9999).contains(&year)).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = AgingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AgingError::InvalidMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = AgingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One line of a supplier ledger as exported by the ERP.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub account_id: String,
    pub account_name: String,
    pub document_number: i64,
    pub document_date: NaiveDate,
    pub debit: Decimal,
    /// Stored positive; applied as a negative adjustment to the balance.
    pub credit: Decimal,
    pub iban: Option<String>,
    pub payment_term: Option<String>,
    /// Entry from a year other than the processing year; kept across refreshes.
    pub is_historical: bool,
}

/// Advisory marker left on a month bucket by the anomaly pre-pass.
/// Never read by the balance computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketAnnotation {
    /// Month with a single transaction from a single document; carries that
    /// document's system-wide credit, negated.
    SingleDocument {
        document_number: i64,
        monthly_balance: Decimal,
    },
    /// Month with both debit and credit movement, folded into one net value.
    /// In this view the debit and credit components read as zero.
    Consolidated { monthly_balance: Decimal },
}

impl BucketAnnotation {
    pub fn monthly_balance(&self) -> Decimal {
        match self {
            Self::SingleDocument { monthly_balance, .. } => *monthly_balance,
            Self::Consolidated { monthly_balance } => *monthly_balance,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleDocument { .. } => "single document",
            Self::Consolidated { .. } => "consolidated",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthBucket {
    pub debit_total: Decimal,
    /// Sum of credits, negated (always <= 0 for well-formed input).
    pub credit_total: Decimal,
    pub transaction_count: u32,
    pub document_numbers: Vec<i64>,
    pub annotation: Option<BucketAnnotation>,
}

impl MonthBucket {
    /// The only document seen this month, if exactly one distinct number appeared.
    pub fn single_document(&self) -> Option<i64> {
        let first = *self.document_numbers.first()?;
        self.document_numbers
            .iter()
            .all(|&n| n == first)
            .then_some(first)
    }
}

/// The five aging buckets of a record: `older` plus the four months ending
/// at the processing month, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, Decimal>", try_from = "BTreeMap<String, Decimal>")]
pub struct MonthlyBalances {
    pub older: Decimal,
    pub recent: [(YearMonth, Decimal); 4],
}

pub const OLDER_KEY: &str = "older";

impl MonthlyBalances {
    /// Zeroed buckets for the window ending at `current`.
    pub fn window(current: YearMonth) -> Self {
        let m3 = current;
        let m2 = m3.prev();
        let m1 = m2.prev();
        let m0 = m1.prev();
        Self {
            older: Decimal::ZERO,
            recent: [
                (m0, Decimal::ZERO),
                (m1, Decimal::ZERO),
                (m2, Decimal::ZERO),
                (m3, Decimal::ZERO),
            ],
        }
    }

    pub fn months(&self) -> [YearMonth; 4] {
        self.recent.map(|(ym, _)| ym)
    }

    pub fn get(&self, key: &str) -> Option<Decimal> {
        if key == OLDER_KEY {
            return Some(self.older);
        }
        self.recent
            .iter()
            .find(|(ym, _)| ym.to_string() == key)
            .map(|(_, v)| *v)
    }

    /// Adds `amount` to the bucket for `ym`, or to `older` when `ym` falls
    /// outside the window. Returns `None` on decimal overflow.
    pub fn allocate(&mut self, ym: YearMonth, amount: Decimal) -> Option<()> {
        let slot = match self.recent.iter_mut().find(|(k, _)| *k == ym) {
            Some((_, v)) => v,
            None => &mut self.older,
        };
        *slot = slot.checked_add(amount)?;
        Some(())
    }

    /// `older` plus the four recent buckets. `None` on overflow.
    pub fn total(&self) -> Option<Decimal> {
        self.recent
            .iter()
            .try_fold(self.older, |acc, (_, v)| acc.checked_add(*v))
    }
}

impl From<MonthlyBalances> for BTreeMap<String, Decimal> {
    fn from(b: MonthlyBalances) -> Self {
        let mut map: BTreeMap<String, Decimal> =
            b.recent.iter().map(|(ym, v)| (ym.to_string(), *v)).collect();
        map.insert(OLDER_KEY.to_string(), b.older);
        map
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for MonthlyBalances {
    type Error = AgingError;

    fn try_from(mut map: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        let older = map
            .remove(OLDER_KEY)
            .ok_or_else(|| AgingError::Other("monthly balances missing 'older'".to_string()))?;
        if map.len() != 4 {
            return Err(AgingError::Other(format!(
                "monthly balances need 4 month keys, found {}",
                map.len()
            )));
        }
        // BTreeMap iterates keys in YYYY-MM order, which is chronological.
        let mut recent = Vec::with_capacity(4);
        for (k, v) in map {
            recent.push((k.parse::<YearMonth>()?, v));
        }
        let recent: [(YearMonth, Decimal); 4] = recent
            .try_into()
            .map_err(|_| AgingError::Other("monthly balances need 4 month keys".to_string()))?;
        Ok(Self { older, recent })
    }
}

/// Per-account aging result ("closing invoice").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingRecord {
    pub account_id: String,
    pub account_name: String,
    pub iban: Option<String>,
    pub payment_term: Option<String>,
    pub current_balance: Decimal,
    pub monthly_balances: MonthlyBalances,
}
