use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::accumulator::{accumulate, AccountLedger, Ledger};
use crate::error::{AgingError, Result};
use crate::models::{AgingRecord, BucketAnnotation, LedgerEntry, MonthlyBalances, YearMonth};

/// The "now" a run is evaluated against. Its month is the newest of the four
/// recent aging buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingReference(NaiveDate);

impl ProcessingReference {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        Self(chrono::Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    pub account_id: String,
    pub reason: String,
}

/// Outcome of a batch run. `records` and `omitted` are ordered by account id.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub reference: ProcessingReference,
    pub records: Vec<AgingRecord>,
    /// Accounts dropped because their balance came out at exactly zero.
    pub omitted: Vec<String>,
    pub failures: Vec<AccountFailure>,
}

// ---------------------------------------------------------------------------
// Anomaly pre-pass
// ---------------------------------------------------------------------------

/// Annotate single-document and mixed debit/credit months. Balances are not
/// touched; the annotations only feed reporting.
pub fn annotate_anomalies(
    account: &mut AccountLedger,
    document_credits: &HashMap<i64, Option<Decimal>>,
) {
    for (year_month, bucket) in account.months.iter_mut() {
        bucket.annotation = None;

        if bucket.transaction_count == 1 {
            if let Some(document_number) = bucket.single_document() {
                let credit = document_credits
                    .get(&document_number)
                    .copied()
                    .unwrap_or(Some(Decimal::ZERO));
                match credit {
                    Some(credit) if !credit.is_zero() => {
                        bucket.annotation = Some(BucketAnnotation::SingleDocument {
                            document_number,
                            monthly_balance: -credit,
                        });
                    }
                    Some(_) => {}
                    None => log::debug!("{year_month}: document {document_number} credit overflowed"),
                }
            }
        }

        if !bucket.debit_total.is_zero() && !bucket.credit_total.is_zero() {
            // Supersedes the single-document override.
            if let Some(monthly_balance) = bucket.debit_total.checked_add(bucket.credit_total) {
                bucket.annotation = Some(BucketAnnotation::Consolidated { monthly_balance });
            }
        }

        if let Some(annotation) = &bucket.annotation {
            log::debug!(
                "{year_month}: {} annotation, monthly balance {}",
                annotation.label(),
                annotation.monthly_balance()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Per-account resolution
// ---------------------------------------------------------------------------

fn overflow(account_id: &str, context: &str) -> AgingError {
    AgingError::Overflow {
        account_id: account_id.to_string(),
        context: context.to_string(),
    }
}

/// FIFO-match the account's credits against its pooled debt and bucket the
/// unmatched remainder. `Ok(None)` means the balance is zero and no record is
/// emitted.
pub fn resolve_account(
    account_id: &str,
    account: &AccountLedger,
    reference: ProcessingReference,
) -> Result<Option<AgingRecord>> {
    if let Some(fault) = &account.fault {
        return Err(overflow(account_id, fault));
    }

    let total_debt = account
        .months
        .values()
        .try_fold(Decimal::ZERO, |acc, b| acc.checked_add(b.debit_total))
        .ok_or_else(|| overflow(account_id, "total debt"))?;

    let mut balances = MonthlyBalances::window(reference.month());
    let mut remaining_debt = total_debt;

    // BTreeMap iteration is chronological.
    for (year_month, bucket) in &account.months {
        if bucket.credit_total >= Decimal::ZERO {
            continue;
        }
        let credit_amount = bucket.credit_total.abs();
        if remaining_debt >= credit_amount {
            remaining_debt -= credit_amount;
            continue;
        }
        let unmatched = credit_amount
            .checked_sub(remaining_debt)
            .ok_or_else(|| overflow(account_id, "unmatched credit"))?;
        remaining_debt = Decimal::ZERO;
        balances
            .allocate(*year_month, -unmatched)
            .ok_or_else(|| overflow(account_id, "older bucket"))?;
    }

    let current_balance = balances
        .total()
        .ok_or_else(|| overflow(account_id, "current balance"))?;
    if current_balance.is_zero() {
        return Ok(None);
    }

    Ok(Some(AgingRecord {
        account_id: account_id.to_string(),
        account_name: account.meta.account_name().to_string(),
        iban: account.meta.iban().map(str::to_string),
        payment_term: account.meta.payment_term().map(str::to_string),
        current_balance,
        monthly_balances: balances,
    }))
}

// ---------------------------------------------------------------------------
// Batch entry points
// ---------------------------------------------------------------------------

/// Run the anomaly pre-pass and resolve every account of an accumulated
/// ledger. Per-account failures are logged and collected; they never abort
/// the batch.
pub fn resolve_ledger(ledger: &mut Ledger, reference: ProcessingReference) -> Resolution {
    let Ledger {
        accounts,
        document_credits,
    } = ledger;

    let mut resolution = Resolution {
        reference,
        records: Vec::new(),
        omitted: Vec::new(),
        failures: Vec::new(),
    };

    for (account_id, account) in accounts.iter_mut() {
        annotate_anomalies(account, document_credits);
        match resolve_account(account_id, account, reference) {
            Ok(Some(record)) => resolution.records.push(record),
            Ok(None) => resolution.omitted.push(account_id.clone()),
            Err(e) => {
                log::warn!("Skipping account {account_id}: {e}");
                resolution.failures.push(AccountFailure {
                    account_id: account_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Resolved {} accounts ({} entries) as of {}: {} records, {} at zero, {} failed",
        accounts.len(),
        accounts
            .values()
            .flat_map(|a| a.months.values())
            .map(|b| u64::from(b.transaction_count))
            .sum::<u64>(),
        reference.date(),
        resolution.records.len(),
        resolution.omitted.len(),
        resolution.failures.len()
    );
    resolution
}

/// Recompute every aging record from a full ledger snapshot.
///
/// An empty snapshot is treated as a failed source feed and rejected, so the
/// caller never swaps in an empty record set by accident.
pub fn resolve_all(entries: &[LedgerEntry], reference: ProcessingReference) -> Result<Resolution> {
    if entries.is_empty() {
        return Err(AgingError::EmptySnapshot);
    }
    let mut ledger = accumulate(entries);
    Ok(resolve_ledger(&mut ledger, reference))
}
