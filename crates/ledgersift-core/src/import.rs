//! Generic transaction-CSV snapshot loader
//!
//! Expected header: `date,description,merchant,amount,currency,type,account`.
//! `merchant` and `type` may be empty; an empty type is inferred from the
//! amount's sign. Each row gets a SHA-256 import hash over its identifying
//! fields so re-importing the same snapshot cannot duplicate rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Read;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Transaction, TransactionStatus, TransactionType};
use crate::money::Money;

/// Outcome of a snapshot load
#[derive(Debug)]
pub struct ImportedSnapshot {
    pub transactions: Vec<Transaction>,
    /// Rows dropped because their import hash was already seen
    pub skipped_duplicates: usize,
}

/// Hash over the fields that identify a row across re-imports
fn import_hash(date: &str, description: &str, amount: &str, account: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.as_bytes());
    hasher.update(b"|");
    hasher.update(description.as_bytes());
    hasher.update(b"|");
    hasher.update(amount.as_bytes());
    hasher.update(b"|");
    hasher.update(account.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accepts a bare date or a full timestamp
fn parse_date(raw: &str, row: usize) -> Result<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| {
            d.and_hms_opt(0, 0, 0)
                .unwrap_or_default()
                .and_utc()
        })
        .map_err(|_| Error::InvalidData(format!("row {row}: unparseable date '{raw}'")))
}

/// Load a transaction snapshot from CSV.
pub fn load_csv<R: Read>(reader: R) -> Result<ImportedSnapshot> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let index_of = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidData(format!("missing column '{name}'")))
    };

    let date_col = index_of("date")?;
    let description_col = index_of("description")?;
    let merchant_col = index_of("merchant")?;
    let amount_col = index_of("amount")?;
    let currency_col = index_of("currency")?;
    let type_col = index_of("type")?;
    let account_col = index_of("account")?;

    let mut seen_hashes: HashSet<String> = HashSet::new();
    let mut transactions = Vec::new();
    let mut skipped_duplicates = 0;

    for (row_index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = row_index + 2; // header is row 1

        let field = |col: usize| record.get(col).unwrap_or("").to_string();
        let raw_date = field(date_col);
        let description = field(description_col);
        let raw_amount = field(amount_col);
        let account = field(account_col);

        let hash = import_hash(&raw_date, &description, &raw_amount, &account);
        if !seen_hashes.insert(hash.clone()) {
            debug!(row, "Skipping exact re-import duplicate");
            skipped_duplicates += 1;
            continue;
        }

        let date = parse_date(&raw_date, row)?;
        let amount = Decimal::from_str(&raw_amount)
            .map_err(|_| Error::InvalidData(format!("row {row}: unparseable amount '{raw_amount}'")))?;

        let currency = field(currency_col);
        if currency.is_empty() {
            return Err(Error::InvalidData(format!("row {row}: missing currency")));
        }

        let transaction_type = match field(type_col).to_lowercase().as_str() {
            "debit" => TransactionType::Debit,
            "credit" => TransactionType::Credit,
            "" => {
                if amount.is_sign_negative() {
                    TransactionType::Debit
                } else {
                    TransactionType::Credit
                }
            }
            other => {
                return Err(Error::InvalidData(format!(
                    "row {row}: unknown transaction type '{other}'"
                )))
            }
        };

        let merchant = field(merchant_col);
        transactions.push(Transaction {
            id: hash[..16].to_string(),
            account_id: account,
            amount: Money::new(amount.abs(), &currency),
            transaction_type,
            description,
            merchant_name: (!merchant.is_empty()).then_some(merchant),
            category_id: None,
            date,
            tags: Default::default(),
            status: TransactionStatus::Posted,
        });
    }

    info!(
        imported = transactions.len(),
        skipped_duplicates, "Snapshot loaded"
    );
    Ok(ImportedSnapshot {
        transactions,
        skipped_duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = "\
date,description,merchant,amount,currency,type,account
2024-03-01,NETFLIX.COM,NETFLIX.COM,-56.00,SAR,debit,acct-1
2024-03-02 09:15:00,Salary,,8500.00,SAR,credit,acct-1
2024-03-03,Panda Hypermarket Riyadh,PANDA,-230.50,SAR,,acct-1
";

    #[test]
    fn loads_rows_and_infers_type_from_sign() {
        let snapshot = load_csv(SNAPSHOT.as_bytes()).unwrap();
        assert_eq!(snapshot.transactions.len(), 3);
        assert_eq!(snapshot.skipped_duplicates, 0);

        let netflix = &snapshot.transactions[0];
        assert_eq!(netflix.transaction_type, TransactionType::Debit);
        assert_eq!(netflix.amount, Money::from_minor(5600, "SAR"));
        assert_eq!(netflix.merchant_name.as_deref(), Some("NETFLIX.COM"));

        let salary = &snapshot.transactions[1];
        assert_eq!(salary.transaction_type, TransactionType::Credit);
        assert!(salary.merchant_name.is_none());
        assert_eq!(salary.date.format("%H:%M").to_string(), "09:15");

        // Empty type column, negative amount
        let panda = &snapshot.transactions[2];
        assert_eq!(panda.transaction_type, TransactionType::Debit);
    }

    #[test]
    fn exact_reimport_rows_are_dropped() {
        let doubled = format!(
            "date,description,merchant,amount,currency,type,account\n{row}\n{row}\n",
            row = "2024-03-01,NETFLIX.COM,NETFLIX.COM,-56.00,SAR,debit,acct-1"
        );
        let snapshot = load_csv(doubled.as_bytes()).unwrap();
        assert_eq!(snapshot.transactions.len(), 1);
        assert_eq!(snapshot.skipped_duplicates, 1);
    }

    #[test]
    fn bad_amount_is_a_hard_error() {
        let bad = "date,description,merchant,amount,currency,type,account\n\
                   2024-03-01,X,,abc,SAR,debit,acct-1\n";
        assert!(matches!(
            load_csv(bad.as_bytes()),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let bad = "date,description,amount\n2024-03-01,X,1.00\n";
        assert!(matches!(
            load_csv(bad.as_bytes()),
            Err(Error::InvalidData(_))
        ));
    }
}
