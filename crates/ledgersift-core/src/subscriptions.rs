//! Recurring-payment (subscription) detection
//!
//! Groups debits by normalized merchant, splits each group into amount
//! clusters, then checks whether the payment cadence fits one of the
//! standard frequency buckets. Irregular repeat purchases at the same
//! merchant are rejected on interval variance.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::merchant::normalize;
use crate::models::{
    Frequency, RenewalReminder, Subscription, SubscriptionStatus, Transaction, TransactionType,
};
use crate::money::Money;
use crate::stats;

/// Standard recurrence buckets, in days
const FREQUENCY_BUCKETS: [u32; 7] = [1, 7, 14, 30, 90, 180, 365];

/// Days in an average month, scaled by 100 (30.44)
const DAYS_PER_MONTH_X100: i64 = 3044;

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Payments required before a group can become a subscription
    pub min_payments: usize,
    /// Relative interval tolerance around a bucket
    pub interval_tolerance_pct: f64,
    /// Absolute interval tolerance floor, days
    pub interval_tolerance_days: f64,
    /// Relative amount drift kept inside one subscription (tax/promo)
    pub amount_tolerance_pct: f64,
    /// Multiples of the inferred interval after which a subscription
    /// with no new payment is considered cancelled
    pub inactivity_multiple: f64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            min_payments: 3,
            interval_tolerance_pct: 0.15,
            interval_tolerance_days: 3.0,
            amount_tolerance_pct: 0.10,
            inactivity_multiple: 2.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionDetector {
    config: SubscriptionConfig,
}

impl SubscriptionDetector {
    pub fn new() -> Self {
        Self {
            config: SubscriptionConfig::default(),
        }
    }

    pub fn with_config(config: SubscriptionConfig) -> Self {
        Self { config }
    }

    /// Detect subscriptions across the full transaction history, judging
    /// activity against today's date.
    pub fn detect(&self, transactions: &[Transaction]) -> Vec<Subscription> {
        self.detect_as_of(transactions, Utc::now().date_naive())
    }

    /// Deterministic variant: `as_of` anchors the active/cancelled cut.
    pub fn detect_as_of(&self, transactions: &[Transaction], as_of: NaiveDate) -> Vec<Subscription> {
        // Merchants are compared by normalized key; currencies never mix
        // inside one group.
        let mut groups: HashMap<(String, String), Vec<&Transaction>> = HashMap::new();
        for tx in transactions {
            if tx.transaction_type != TransactionType::Debit {
                continue;
            }
            let key = normalize(tx.merchant_or_description());
            if key.is_empty() {
                continue;
            }
            groups
                .entry((key, tx.amount.currency.clone()))
                .or_default()
                .push(tx);
        }

        let mut subscriptions = Vec::new();
        for ((merchant_key, _), mut txs) in groups {
            if txs.len() < self.config.min_payments {
                continue;
            }
            txs.sort_by_key(|tx| tx.date);

            for (index, cluster) in self.amount_clusters(&txs).into_iter().enumerate() {
                if cluster.len() < self.config.min_payments {
                    debug!(merchant = %merchant_key, payments = cluster.len(), "Amount cluster below payment floor");
                    continue;
                }
                if let Some(sub) = self.build_subscription(&merchant_key, index, &cluster, as_of) {
                    subscriptions.push(sub);
                }
            }
        }

        subscriptions.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        info!(
            transactions = transactions.len(),
            subscriptions = subscriptions.len(),
            "Subscription detection complete"
        );
        subscriptions
    }

    /// Split a merchant group into clusters of near-equal amounts. Drift
    /// within the tolerance (tax, promo pricing) stays in one cluster;
    /// larger gaps split — a 9.99 plan and a 99.99 plan at one merchant
    /// are two subscriptions.
    fn amount_clusters<'t>(&self, txs: &[&'t Transaction]) -> Vec<Vec<&'t Transaction>> {
        let mut clusters: Vec<(f64, Vec<&Transaction>)> = Vec::new();
        for tx in txs {
            let amount = tx.amount.to_f64().abs();
            match clusters.iter_mut().find(|(anchor, _)| {
                (amount - anchor).abs() <= self.config.amount_tolerance_pct * anchor
            }) {
                Some((_, members)) => members.push(tx),
                None => clusters.push((amount, vec![tx])),
            }
        }
        clusters.into_iter().map(|(_, members)| members).collect()
    }

    fn build_subscription(
        &self,
        merchant_key: &str,
        cluster_index: usize,
        txs: &[&Transaction],
        as_of: NaiveDate,
    ) -> Option<Subscription> {
        let intervals: Vec<f64> = txs
            .windows(2)
            .map(|pair| (pair[1].day() - pair[0].day()).num_days() as f64)
            .collect();
        let mean_interval = stats::mean(&intervals);

        let bucket = self.match_bucket(mean_interval)?;
        let tolerance = self.tolerance(bucket);
        if stats::std_dev(&intervals) > tolerance {
            debug!(merchant = %merchant_key, mean_interval, "Interval spread too wide for a subscription");
            return None;
        }

        let first = txs[0];
        let last = txs[txs.len() - 1];
        let last_day = last.day();

        let amounts: Vec<Decimal> = txs.iter().map(|tx| tx.amount.amount.abs()).collect();
        let has_variable_amount = amounts.windows(2).any(|pair| pair[0] != pair[1]);

        let actual_amount = last.amount.abs();
        let monthly_amount = monthly_equivalent(&actual_amount, bucket);

        let days_since_last = (as_of - last_day).num_days() as f64;
        let status = if days_since_last > self.config.inactivity_multiple * bucket as f64 {
            SubscriptionStatus::Cancelled
        } else {
            SubscriptionStatus::Active
        };

        let slug = merchant_key.replace(' ', "-");
        let id = if cluster_index == 0 {
            format!("sub-{slug}")
        } else {
            format!("sub-{slug}-{}", cluster_index + 1)
        };

        Some(Subscription {
            id,
            service_name: derive_service_name(merchant_key),
            merchant_name: merchant_key.to_string(),
            category_id: last.category_id.clone(),
            frequency: bucket_frequency(bucket),
            monthly_amount,
            actual_amount,
            status,
            start_date: first.day(),
            next_renewal_date: last_day + Duration::days(bucket as i64),
            last_payment_date: Some(last_day),
            renewal_count: txs.len() as u32,
            has_variable_amount,
            transaction_history: txs.iter().map(|tx| tx.id.clone()).collect(),
        })
    }

    /// Nearest bucket whose distance to the observed mean interval is
    /// inside the tolerance band, or None when no cadence fits.
    fn match_bucket(&self, mean_interval: f64) -> Option<u32> {
        FREQUENCY_BUCKETS
            .into_iter()
            .filter(|&b| (mean_interval - b as f64).abs() <= self.tolerance(b))
            .min_by(|a, b| {
                let da = (mean_interval - *a as f64).abs();
                let db = (mean_interval - *b as f64).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn tolerance(&self, bucket: u32) -> f64 {
        (self.config.interval_tolerance_pct * bucket as f64)
            .max(self.config.interval_tolerance_days)
    }
}

/// Reminders for active subscriptions renewing within `within_days` of
/// `as_of`, soonest first.
pub fn upcoming_renewals(
    subscriptions: &[Subscription],
    as_of: NaiveDate,
    within_days: i64,
) -> Vec<RenewalReminder> {
    let mut reminders: Vec<RenewalReminder> = subscriptions
        .iter()
        .filter(|s| s.is_active())
        .filter_map(|s| {
            let days = (s.next_renewal_date - as_of).num_days();
            (0..=within_days).contains(&days).then(|| RenewalReminder {
                subscription_id: s.id.clone(),
                service_name: s.service_name.clone(),
                renewal_date: s.next_renewal_date,
                amount: s.actual_amount.clone(),
                days_until_renewal: days,
            })
        })
        .collect();
    reminders.sort_by_key(|r| r.days_until_renewal);
    reminders
}

/// Frequency label for a bucket. The 14- and 180-day cadences map to the
/// nearest named frequency; monthly normalization still uses the bucket.
fn bucket_frequency(bucket: u32) -> Frequency {
    match bucket {
        1 => Frequency::Daily,
        7 | 14 => Frequency::Weekly,
        30 => Frequency::Monthly,
        90 | 180 => Frequency::Quarterly,
        _ => Frequency::Yearly,
    }
}

/// Latest charge scaled to a per-month figure. A 30-day cadence maps 1:1
/// so a 56.00 monthly charge stays 56.00.
fn monthly_equivalent(actual: &Money, bucket: u32) -> Money {
    let days = match bucket {
        30 => Decimal::new(DAYS_PER_MONTH_X100, 2),
        90 => Decimal::new(9131, 2),
        180 => Decimal::new(18262, 2),
        365 => Decimal::new(36525, 2),
        other => Decimal::from(other),
    };
    let monthly = actual.amount * Decimal::new(DAYS_PER_MONTH_X100, 2) / days;
    Money::new(monthly, &actual.currency)
}

/// Human service name from a normalized merchant key: drop web-domain
/// tokens and title-case the rest ("netflix com" → "Netflix").
fn derive_service_name(merchant_key: &str) -> String {
    let words: Vec<String> = merchant_key
        .split_whitespace()
        .filter(|token| !matches!(*token, "www" | "com" | "net" | "org" | "io" | "app"))
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        merchant_key.to_string()
    } else {
        words.join(" ")
    }
}
