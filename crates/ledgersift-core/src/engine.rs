//! Analysis engine — runs the full pipeline over one snapshot
//!
//! Enrichment first (category matching for uncategorized transactions),
//! then the detectors. Soft outcomes inside the detectors are absorbed
//! where they occur; a failing collaborator or a currency violation is a
//! hard error and fails the run.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::categories::CategoryIndex;
use crate::dedup::{self, DuplicateGroup, DEFAULT_GROUP_WINDOW_MINUTES};
use crate::error::Result;
use crate::models::{
    CategoryMatch, DetectedAnomaly, RenewalReminder, Subscription, Transaction,
};
use crate::repo::{CategorySource, TransactionSource};
use crate::rules::{best_rule, CategoryMatcher};
use crate::subscriptions::{upcoming_renewals, SubscriptionDetector};
use crate::anomaly::AnomalyDetector;

/// Days ahead to surface renewal reminders
const RENEWAL_LOOKAHEAD_DAYS: i64 = 7;

/// A category assignment proposed for one transaction
#[derive(Debug, Clone, Serialize)]
pub struct CategorizedTransaction {
    pub transaction_id: String,
    #[serde(flatten)]
    pub category_match: CategoryMatch,
}

/// Everything one analysis run produces
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub period_transactions: usize,
    pub history_transactions: usize,
    pub category_matches: Vec<CategorizedTransaction>,
    pub anomalies: Vec<DetectedAnomaly>,
    pub subscriptions: Vec<Subscription>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub renewal_reminders: Vec<RenewalReminder>,
}

#[derive(Debug, Default)]
pub struct AnalysisEngine {
    matcher: CategoryMatcher,
    anomaly: AnomalyDetector,
    subscriptions: SubscriptionDetector,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detectors(anomaly: AnomalyDetector, subscriptions: SubscriptionDetector) -> Self {
        Self {
            matcher: CategoryMatcher::new(),
            anomaly,
            subscriptions,
        }
    }

    /// Analyze the period `[period_start, period_end]`; everything before
    /// the period in the source serves as baseline history. Activity cuts
    /// (subscription staleness, renewal windows) anchor on today.
    pub fn run(
        &self,
        transactions: &dyn TransactionSource,
        categories: &dyn CategorySource,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<AnalysisReport> {
        self.run_as_of(
            transactions,
            categories,
            period_start,
            period_end,
            Utc::now().date_naive(),
        )
    }

    pub fn run_as_of(
        &self,
        transactions: &dyn TransactionSource,
        categories: &dyn CategorySource,
        period_start: NaiveDate,
        period_end: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<AnalysisReport> {
        let all = transactions.all_transactions()?;
        let index = CategoryIndex::new(categories.categories()?);
        let rules = categories.categorization_rules()?;

        // Enrichment: fill in categories before the detectors group by them.
        let mut enriched = all;
        let mut category_matches = Vec::new();
        for tx in enriched.iter_mut().filter(|tx| tx.category_id.is_none()) {
            // A firing user rule beats heuristic scoring outright.
            if let Some(rule) = best_rule(&rules, tx) {
                tx.category_id = Some(rule.category_id.clone());
                category_matches.push(CategorizedTransaction {
                    transaction_id: tx.id.clone(),
                    category_match: CategoryMatch {
                        category_id: rule.category_id.clone(),
                        confidence: rule.confidence,
                        match_reasons: vec![format!("rule {}", rule.id)],
                    },
                });
                continue;
            }
            if let Some(matched) = self.matcher.best_match(tx, &index)? {
                debug!(transaction = %tx.id, category = %matched.category_id, confidence = matched.confidence, "Categorized");
                tx.category_id = Some(matched.category_id.clone());
                category_matches.push(CategorizedTransaction {
                    transaction_id: tx.id.clone(),
                    category_match: matched,
                });
            }
        }

        let (period, history): (Vec<Transaction>, Vec<Transaction>) = enriched
            .iter()
            .cloned()
            .partition(|tx| {
                let day = tx.day();
                day >= period_start && day <= period_end
            });
        let history: Vec<Transaction> = history
            .into_iter()
            .filter(|tx| tx.day() < period_start)
            .collect();

        let anomalies = self.anomaly.detect(&period, &history);
        let subscriptions = self.subscriptions.detect_as_of(&enriched, as_of);
        let renewal_reminders =
            upcoming_renewals(&subscriptions, as_of, RENEWAL_LOOKAHEAD_DAYS);
        let duplicate_groups = dedup::find_duplicate_groups(
            &period,
            chrono::Duration::minutes(DEFAULT_GROUP_WINDOW_MINUTES),
        );

        info!(
            period = period.len(),
            history = history.len(),
            anomalies = anomalies.len(),
            subscriptions = subscriptions.len(),
            "Analysis run complete"
        );

        Ok(AnalysisReport {
            period_start,
            period_end,
            period_transactions: period.len(),
            history_transactions: history.len(),
            category_matches,
            anomalies,
            subscriptions,
            duplicate_groups,
            renewal_reminders,
        })
    }
}
