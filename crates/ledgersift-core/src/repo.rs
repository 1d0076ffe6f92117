//! Collaborator contracts for the data the engine consumes and the
//! results it hands back.
//!
//! The engine owns no storage. Transactions, categories and persisted
//! subscriptions come from these traits; a failing source maps to
//! [`Error::External`] and fails the whole operation — the detectors never
//! analyze partial data silently. In-memory implementations back the CLI
//! and the integration tests.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    CategorizationRule, Category, RenewalReminder, Subscription, Transaction,
};

/// Supplies transaction snapshots. Input may arrive unsorted; detectors
/// sort internally where order matters.
pub trait TransactionSource: Send + Sync {
    fn transactions_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>>;

    fn all_transactions(&self) -> Result<Vec<Transaction>>;
}

/// Supplies the category tree and user-defined categorization rules.
pub trait CategorySource: Send + Sync {
    fn categories(&self) -> Result<Vec<Category>>;

    fn categorization_rules(&self) -> Result<Vec<CategorizationRule>>;
}

/// Persists inferred subscriptions and renewal alerts.
pub trait SubscriptionStore: Send + Sync {
    fn all_active(&self) -> Result<Vec<Subscription>>;

    fn by_category(&self, category_id: &str) -> Result<Vec<Subscription>>;

    fn create(&self, subscription: &Subscription) -> Result<()>;

    fn update(&self, subscription: &Subscription) -> Result<()>;

    fn create_alert(&self, reminder: &RenewalReminder) -> Result<()>;
}

/// Transaction source over an owned in-memory snapshot.
#[derive(Debug, Default)]
pub struct MemoryTransactionSource {
    transactions: Vec<Transaction>,
}

impl MemoryTransactionSource {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }
}

impl TransactionSource for MemoryTransactionSource {
    fn transactions_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| {
                let day = tx.day();
                day >= start && day <= end
            })
            .cloned()
            .collect())
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }
}

/// Category source over owned category and rule lists.
#[derive(Debug, Default)]
pub struct MemoryCategorySource {
    categories: Vec<Category>,
    rules: Vec<CategorizationRule>,
}

impl MemoryCategorySource {
    pub fn new(categories: Vec<Category>, rules: Vec<CategorizationRule>) -> Self {
        Self { categories, rules }
    }
}

impl CategorySource for MemoryCategorySource {
    fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.clone())
    }

    fn categorization_rules(&self) -> Result<Vec<CategorizationRule>> {
        Ok(self.rules.clone())
    }
}

/// Subscription store keyed by subscription id.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<HashMap<String, Subscription>>,
    alerts: Mutex<Vec<RenewalReminder>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<RenewalReminder> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

impl SubscriptionStore for MemorySubscriptionStore {
    fn all_active(&self) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .subscriptions
            .lock()
            .map_err(|_| Error::External("subscription store lock poisoned".to_string()))?;
        Ok(subscriptions
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect())
    }

    fn by_category(&self, category_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .subscriptions
            .lock()
            .map_err(|_| Error::External("subscription store lock poisoned".to_string()))?;
        Ok(subscriptions
            .values()
            .filter(|s| s.category_id.as_deref() == Some(category_id))
            .cloned()
            .collect())
    }

    fn create(&self, subscription: &Subscription) -> Result<()> {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .map_err(|_| Error::External("subscription store lock poisoned".to_string()))?;
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    fn update(&self, subscription: &Subscription) -> Result<()> {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .map_err(|_| Error::External("subscription store lock poisoned".to_string()))?;
        if !subscriptions.contains_key(&subscription.id) {
            return Err(Error::NotFound(format!(
                "subscription {}",
                subscription.id
            )));
        }
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    fn create_alert(&self, reminder: &RenewalReminder) -> Result<()> {
        let mut alerts = self
            .alerts
            .lock()
            .map_err(|_| Error::External("subscription store lock poisoned".to_string()))?;
        alerts.push(reminder.clone());
        Ok(())
    }
}
