use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{LedgerEntry, MonthBucket, YearMonth};

/// Ordering key for "most recent entry": document date, then document number.
type EntryKey = (NaiveDate, i64);

#[derive(Debug, Clone, PartialEq)]
struct Stamped {
    key: EntryKey,
    value: String,
}

/// Display metadata for an account. Each field keeps the value from the most
/// recent entry that carried a non-empty one; exact ties go to the last seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountMeta {
    name: Option<Stamped>,
    iban: Option<Stamped>,
    payment_term: Option<Stamped>,
}

fn offer(slot: &mut Option<Stamped>, key: EntryKey, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    if slot.as_ref().map_or(true, |s| key >= s.key) {
        *slot = Some(Stamped {
            key,
            value: value.to_string(),
        });
    }
}

impl AccountMeta {
    fn observe(&mut self, entry: &LedgerEntry) {
        let key = (entry.document_date, entry.document_number);
        offer(&mut self.name, key, Some(&entry.account_name));
        offer(&mut self.iban, key, entry.iban.as_deref());
        offer(&mut self.payment_term, key, entry.payment_term.as_deref());
    }

    pub fn account_name(&self) -> &str {
        self.name.as_ref().map_or("", |s| s.value.as_str())
    }

    pub fn iban(&self) -> Option<&str> {
        self.iban.as_ref().map(|s| s.value.as_str())
    }

    pub fn payment_term(&self) -> Option<&str> {
        self.payment_term.as_ref().map(|s| s.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountLedger {
    pub months: BTreeMap<YearMonth, MonthBucket>,
    pub meta: AccountMeta,
    /// Set when a running total overflowed; the resolver reports the account
    /// as failed instead of emitting a record.
    pub fault: Option<String>,
}

/// Accumulated view of a ledger snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    pub accounts: BTreeMap<String, AccountLedger>,
    /// Total credit per document number across every line of every account.
    /// `None` once the total overflowed; such documents are never annotated.
    pub document_credits: HashMap<i64, Option<Decimal>>,
}

/// Group entries by account and calendar month. Totals are plain sums, so the
/// result does not depend on input order.
pub fn accumulate(entries: &[LedgerEntry]) -> Ledger {
    let mut ledger = Ledger::default();

    for entry in entries {
        let account = ledger.accounts.entry(entry.account_id.clone()).or_default();
        account.meta.observe(entry);

        let year_month = YearMonth::of(entry.document_date);
        let bucket = account.months.entry(year_month).or_default();
        match (
            bucket.debit_total.checked_add(entry.debit),
            bucket.credit_total.checked_sub(entry.credit),
        ) {
            (Some(debit), Some(credit)) => {
                bucket.debit_total = debit;
                bucket.credit_total = credit;
            }
            _ => {
                account
                    .fault
                    .get_or_insert_with(|| format!("running total overflowed in {year_month}"));
            }
        }
        bucket.transaction_count += 1;
        bucket.document_numbers.push(entry.document_number);

        let doc_credit = ledger
            .document_credits
            .entry(entry.document_number)
            .or_insert(Some(Decimal::ZERO));
        *doc_credit = doc_credit.and_then(|c| c.checked_add(entry.credit));
    }

    ledger
}
