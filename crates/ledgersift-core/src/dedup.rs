//! Duplicate transaction identification and consolidation
//!
//! Two consumers share this module: the anomaly detector flags adjacent
//! near-identical pairs, and the manual merge workflow consolidates a
//! duplicate group into one record. The merge itself is pure — the caller
//! owns deleting the source transactions once the merged record is durable.

use chrono::Duration;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::merchant::normalize;
use crate::models::Transaction;

/// Default grouping window for the manual duplicate scan
pub const DEFAULT_GROUP_WINDOW_MINUTES: i64 = 5;

/// How to pick the surviving record when merging duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Prefer the member with a merchant name and the longest description
    KeepMostDetailed,
    KeepEarliest,
    KeepLatest,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepMostDetailed => "keep_most_detailed",
            Self::KeepEarliest => "keep_earliest",
            Self::KeepLatest => "keep_latest",
        }
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep_most_detailed" | "most_detailed" => Ok(Self::KeepMostDetailed),
            "keep_earliest" | "earliest" => Ok(Self::KeepEarliest),
            "keep_latest" | "latest" => Ok(Self::KeepLatest),
            _ => Err(format!("Unknown merge strategy: {}", s)),
        }
    }
}

/// A group of transactions that look like the same real-world charge
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub merchant_key: String,
    pub transactions: Vec<Transaction>,
}

/// Result of a merge operation.
///
/// `source_ids` lists the members superseded by the merged record; when
/// `originals_kept` is false the caller deletes them after persisting the
/// merged record.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub merged: Transaction,
    pub source_ids: Vec<String>,
    pub originals_kept: bool,
}

/// Group candidate duplicates: same currency-aware amount, normalized
/// merchant and category, timestamps within `window` of their neighbor.
/// Only groups with ≥2 members are returned.
pub fn find_duplicate_groups(transactions: &[Transaction], window: Duration) -> Vec<DuplicateGroup> {
    // Bucket by everything except time
    let mut buckets: HashMap<(String, String, String, String), Vec<&Transaction>> = HashMap::new();
    for tx in transactions {
        // normalize() strips trailing zeros so 56 and 56.00 bucket together
        let key = (
            tx.amount.currency.clone(),
            tx.amount.amount.normalize().to_string(),
            normalize(tx.merchant_or_description()),
            tx.category_id.clone().unwrap_or_default(),
        );
        buckets.entry(key).or_default().push(tx);
    }

    let mut groups = Vec::new();
    for ((_, _, merchant_key, _), mut bucket) in buckets {
        if bucket.len() < 2 {
            continue;
        }
        bucket.sort_by_key(|tx| tx.date);

        // Split the bucket into time clusters
        let mut cluster: Vec<&Transaction> = vec![bucket[0]];
        let mut last_date = bucket[0].date;
        for tx in bucket.into_iter().skip(1) {
            let gap = tx.date - last_date;
            last_date = tx.date;
            if gap <= window {
                cluster.push(tx);
            } else {
                if cluster.len() >= 2 {
                    groups.push(DuplicateGroup {
                        merchant_key: merchant_key.clone(),
                        transactions: cluster.iter().map(|t| (*t).clone()).collect(),
                    });
                }
                cluster = vec![tx];
            }
        }
        if cluster.len() >= 2 {
            groups.push(DuplicateGroup {
                merchant_key: merchant_key.clone(),
                transactions: cluster.iter().map(|t| (*t).clone()).collect(),
            });
        }
    }

    debug!(groups = groups.len(), "Duplicate group scan complete");
    groups
}

/// Adjacent near-identical pairs for the anomaly detector: equal amount and
/// currency, same normalized merchant and category, time gap within
/// `max_gap`. Returns (earlier, later) pairs from the time-sorted input.
pub fn adjacent_duplicate_pairs<'a>(
    transactions: &'a [Transaction],
    max_gap: Duration,
) -> Vec<(&'a Transaction, &'a Transaction)> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|tx| tx.date);

    let mut pairs = Vec::new();
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.amount.currency != b.amount.currency || a.amount.amount != b.amount.amount {
            continue;
        }
        if normalize(a.merchant_or_description()) != normalize(b.merchant_or_description()) {
            continue;
        }
        if a.category_id != b.category_id {
            continue;
        }
        if b.date - a.date <= max_gap {
            pairs.push((a, b));
        }
    }
    pairs
}

/// Consolidate a duplicate group into one transaction.
///
/// Preconditions checked before any effect: at least two members, one
/// currency, one account. Merged tags are the union of all members'; the
/// merged description is the most detailed text, or a concatenation when
/// the inputs are written in different scripts.
pub fn merge(
    transactions: &[Transaction],
    strategy: MergeStrategy,
    keep_originals: bool,
) -> Result<MergeOutcome> {
    if transactions.len() < 2 {
        return Err(Error::Validation(format!(
            "merge requires at least 2 transactions, got {}",
            transactions.len()
        )));
    }

    let first = &transactions[0];
    for tx in &transactions[1..] {
        if tx.amount.currency != first.amount.currency {
            return Err(Error::CurrencyMismatch {
                left: first.amount.currency.clone(),
                right: tx.amount.currency.clone(),
            });
        }
        if tx.account_id != first.account_id {
            return Err(Error::Validation(format!(
                "merge requires one account, got '{}' and '{}'",
                first.account_id, tx.account_id
            )));
        }
    }

    let base = match strategy {
        MergeStrategy::KeepEarliest => transactions.iter().min_by_key(|tx| tx.date),
        MergeStrategy::KeepLatest => transactions.iter().max_by_key(|tx| tx.date),
        MergeStrategy::KeepMostDetailed => transactions.iter().max_by_key(|tx| detail_score(tx)),
    }
    .unwrap_or(first);

    let mut merged = base.clone();

    // Tags: union across all members
    for tx in transactions {
        merged.tags.extend(tx.tags.iter().cloned());
    }

    // Description: most detailed, plus any description in a different
    // script (keep a native-script and a transliterated form together
    // instead of discarding one)
    let richest = transactions
        .iter()
        .map(|tx| tx.description.trim())
        .max_by_key(|d| d.chars().count())
        .unwrap_or_default()
        .to_string();
    let mut description = richest.clone();
    for tx in transactions {
        let candidate = tx.description.trim();
        if candidate.is_empty() || candidate == description {
            continue;
        }
        if is_non_latin(candidate) != is_non_latin(&richest)
            && !description.contains(candidate)
        {
            description = format!("{} / {}", description, candidate);
        }
    }
    merged.description = description;

    if merged.merchant_name.is_none() {
        merged.merchant_name = transactions
            .iter()
            .find_map(|tx| tx.merchant_name.clone());
    }

    let source_ids = transactions
        .iter()
        .filter(|tx| tx.id != merged.id)
        .map(|tx| tx.id.clone())
        .collect();

    Ok(MergeOutcome {
        merged,
        source_ids,
        originals_kept: keep_originals,
    })
}

/// Rough information content of a transaction for KeepMostDetailed
fn detail_score(tx: &Transaction) -> (bool, usize, usize) {
    (
        tx.merchant_name.is_some(),
        tx.description.trim().chars().count(),
        tx.tags.len(),
    )
}

/// Whether the text is predominantly non-Latin script (e.g. Arabic)
fn is_non_latin(text: &str) -> bool {
    let alphabetic: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alphabetic.is_empty() {
        return false;
    }
    let non_ascii = alphabetic.iter().filter(|c| !c.is_ascii()).count();
    non_ascii * 2 > alphabetic.len()
}
