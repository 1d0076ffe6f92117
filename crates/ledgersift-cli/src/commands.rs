//! Command implementations

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use ledgersift_core::{
    dedup, load_csv, AnalysisEngine, CategorizationRule, Category, CategoryIndex, CategoryMatcher,
    MemoryCategorySource, MemoryTransactionSource, Severity, SubscriptionDetector, Transaction,
};

/// Category file layout: `{"categories": [...], "rules": [...]}`
#[derive(Deserialize)]
struct CategoryFile {
    categories: Vec<Category>,
    #[serde(default)]
    rules: Vec<CategorizationRule>,
}

fn load_snapshot(file: &Path) -> Result<Vec<Transaction>> {
    let reader = File::open(file)
        .with_context(|| format!("Cannot open snapshot {}", file.display()))?;
    let snapshot = load_csv(reader)
        .with_context(|| format!("Cannot parse snapshot {}", file.display()))?;
    if snapshot.skipped_duplicates > 0 {
        println!(
            "⚠️  Skipped {} exact re-import duplicate row(s)",
            snapshot.skipped_duplicates
        );
    }
    if snapshot.transactions.is_empty() {
        bail!("Snapshot {} contains no transactions", file.display());
    }
    Ok(snapshot.transactions)
}

fn latest_day(transactions: &[Transaction]) -> NaiveDate {
    transactions
        .iter()
        .map(|tx| tx.day())
        .max()
        .unwrap_or_default()
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴",
        Severity::Medium => "🟡",
        Severity::Low => "🟢",
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

pub fn cmd_analyze(file: &Path, history_months: u32, json: bool) -> Result<()> {
    let transactions = load_snapshot(file)?;

    // The most recent 30 days form the period; earlier transactions up to
    // the history cutoff form the baseline.
    let as_of = latest_day(&transactions);
    let period_start = as_of - Duration::days(29);
    let history_cutoff = period_start - Duration::days(30 * history_months as i64);
    let kept: Vec<Transaction> = transactions
        .into_iter()
        .filter(|tx| tx.day() >= history_cutoff)
        .collect();

    let source = MemoryTransactionSource::new(kept);
    let categories = MemoryCategorySource::new(vec![], vec![]);
    let report = AnalysisEngine::new()
        .run_as_of(&source, &categories, period_start, as_of, as_of)
        .context("Analysis failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "🔎 Anomalies for {} → {} ({} period / {} history transactions)",
        report.period_start, report.period_end, report.period_transactions, report.history_transactions
    );
    println!("   ─────────────────────────────────────────────────────────────");
    if report.anomalies.is_empty() {
        println!("   Nothing unusual found.");
    }
    for anomaly in &report.anomalies {
        println!(
            "   {} {:24} │ {:4.0}% │ {}",
            severity_icon(anomaly.severity),
            anomaly.anomaly_type.as_str(),
            anomaly.confidence * 100.0,
            truncate(&anomaly.description, 70)
        );
    }

    if !report.renewal_reminders.is_empty() {
        println!();
        println!("📅 Upcoming renewals");
        for reminder in &report.renewal_reminders {
            println!(
                "   {:20} │ {} in {} day(s)",
                truncate(&reminder.service_name, 20),
                reminder.amount,
                reminder.days_until_renewal
            );
        }
    }

    Ok(())
}

pub fn cmd_subscriptions(file: &Path, json: bool) -> Result<()> {
    let transactions = load_snapshot(file)?;
    // Anchor on the snapshot's own last day so old exports still show
    // which subscriptions were live at the time.
    let as_of = latest_day(&transactions);
    let subscriptions = SubscriptionDetector::new().detect_as_of(&transactions, as_of);

    if json {
        println!("{}", serde_json::to_string_pretty(&subscriptions)?);
        return Ok(());
    }

    if subscriptions.is_empty() {
        println!("No subscriptions detected.");
        return Ok(());
    }

    println!();
    println!("📋 Detected subscriptions (as of {as_of})");
    println!("   ─────────────────────────────────────────────────────────────");
    for sub in &subscriptions {
        let icon = if sub.is_active() { "✅" } else { "❌" };
        let variable = if sub.has_variable_amount { "~" } else { "" };
        println!(
            "   {} {:20} │ {}{:>10}/mo │ {:9} │ next {}",
            icon,
            truncate(&sub.service_name, 20),
            variable,
            sub.monthly_amount.to_string(),
            sub.frequency.as_str(),
            sub.next_renewal_date
        );
    }

    Ok(())
}

pub fn cmd_duplicates(file: &Path, window_minutes: i64, json: bool) -> Result<()> {
    let transactions = load_snapshot(file)?;
    let groups =
        dedup::find_duplicate_groups(&transactions, Duration::minutes(window_minutes));

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No duplicate groups found.");
        return Ok(());
    }

    println!();
    println!("👯 Duplicate groups (window {window_minutes} min)");
    for group in &groups {
        println!("   ─────────────────────────────────────────────────────────────");
        println!("   merchant: {}", group.merchant_key);
        for tx in &group.transactions {
            println!(
                "     {} │ {} │ {}",
                tx.date.format("%Y-%m-%d %H:%M"),
                tx.amount,
                truncate(&tx.description, 50)
            );
        }
    }

    Ok(())
}

pub fn cmd_categorize(file: &Path, categories_file: &Path, json: bool) -> Result<()> {
    let transactions = load_snapshot(file)?;
    let category_file: CategoryFile = serde_json::from_reader(
        File::open(categories_file)
            .with_context(|| format!("Cannot open categories {}", categories_file.display()))?,
    )
    .with_context(|| format!("Cannot parse categories {}", categories_file.display()))?;

    let index = CategoryIndex::new(category_file.categories);
    let matcher = CategoryMatcher::new();

    let mut results = Vec::new();
    for tx in transactions.iter().filter(|tx| tx.category_id.is_none()) {
        let matched = match ledgersift_core::rules::best_rule(&category_file.rules, tx) {
            Some(rule) => Some(ledgersift_core::CategoryMatch {
                category_id: rule.category_id.clone(),
                confidence: rule.confidence,
                match_reasons: vec![format!("rule {}", rule.id)],
            }),
            None => matcher.best_match(tx, &index).context("Scoring failed")?,
        };
        if let Some(matched) = matched {
            results.push((tx, matched));
        }
    }

    if json {
        let payload: Vec<_> = results
            .iter()
            .map(|(tx, m)| {
                serde_json::json!({
                    "transaction_id": tx.id,
                    "description": tx.description,
                    "category_id": m.category_id,
                    "confidence": m.confidence,
                    "match_reasons": m.match_reasons,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No transactions could be categorized.");
        return Ok(());
    }

    println!();
    println!("🏷️  Proposed categories");
    println!("   ─────────────────────────────────────────────────────────────");
    for (tx, matched) in &results {
        println!(
            "   {:30} │ {:16} │ {:3}%",
            truncate(tx.merchant_or_description(), 30),
            truncate(&matched.category_id, 16),
            matched.confidence
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long merchant name", 10), "a very lo…");
        assert_eq!(truncate("بنده هايبرماركت", 6), "بنده …");
    }
}
