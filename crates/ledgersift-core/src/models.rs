//! Domain models for LedgerSift

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::money::Money;

/// Transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money leaving the account
    Debit,
    /// Money entering the account
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Posted,
    Pending,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Pending => "pending",
            Self::Reversed => "reversed",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "posted" => Ok(Self::Posted),
            "pending" => Ok(Self::Pending),
            "reversed" => Ok(Self::Reversed),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

/// An immutable bank transaction snapshot.
///
/// Sourced from the banking collaborator. The engine never mutates a
/// transaction; detectors produce derived results referencing its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub description: String,
    pub merchant_name: Option<String>,
    pub category_id: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub status: TransactionStatus,
}

impl Transaction {
    /// Merchant name if present, falling back to the raw description.
    pub fn merchant_or_description(&self) -> &str {
        self.merchant_name.as_deref().unwrap_or(&self.description)
    }

    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

// ========== Categories & Rules ==========

/// Category semantic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Income,
    Expense,
    Transfer,
    Savings,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
            Self::Savings => "savings",
        }
    }
}

impl std::str::FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            "savings" => Ok(Self::Savings),
            _ => Err(format!("Unknown category type: {}", s)),
        }
    }
}

/// A spending category.
///
/// Categories form a tree via `parent_id`; root categories have no parent.
/// System categories are seeded read-only defaults, user categories are
/// managed by the repository collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub category_type: CategoryType,
    /// Depth in the tree (0 = root). Kept denormalized for tie-breaking;
    /// `CategoryIndex::depth` recomputes it from parent links.
    pub level: u32,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub merchant_patterns: Vec<String>,
    #[serde(default)]
    pub rules: Vec<CategorizationRule>,
    pub monthly_limit: Option<Money>,
}

/// Field of a transaction a rule condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Description,
    MerchantName,
    Amount,
    AccountId,
}

impl RuleField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::MerchantName => "merchant_name",
            Self::Amount => "amount",
            Self::AccountId => "account_id",
        }
    }
}

impl std::str::FromStr for RuleField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "description" => Ok(Self::Description),
            "merchant_name" => Ok(Self::MerchantName),
            "amount" => Ok(Self::Amount),
            "account_id" => Ok(Self::AccountId),
            _ => Err(format!("Unknown rule field: {}", s)),
        }
    }
}

/// Closed operator set for rule conditions. One pure evaluation arm per
/// tag — no runtime reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    Regex,
    GreaterThan,
    LessThan,
    NotEquals,
    NotContains,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Regex => "regex",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::NotEquals => "not_equals",
            Self::NotContains => "not_contains",
        }
    }
}

impl std::str::FromStr for ConditionOperator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "equals" => Ok(Self::Equals),
            "starts_with" => Ok(Self::StartsWith),
            "ends_with" => Ok(Self::EndsWith),
            "regex" => Ok(Self::Regex),
            "greater_than" => Ok(Self::GreaterThan),
            "less_than" => Ok(Self::LessThan),
            "not_equals" => Ok(Self::NotEquals),
            "not_contains" => Ok(Self::NotContains),
            _ => Err(format!("Unknown condition operator: {}", s)),
        }
    }
}

/// A single condition within a categorization rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: RuleField,
    pub operator: ConditionOperator,
    pub value: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// A user- or system-defined categorization rule.
///
/// Matches a transaction only when **all** conditions evaluate true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub id: String,
    pub category_id: String,
    pub conditions: Vec<RuleCondition>,
    /// Higher priority rules win when multiple rules fire
    pub priority: i32,
    /// Confidence assigned to a match, 0..=100
    pub confidence: u8,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Result of scoring a transaction against categories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub category_id: String,
    /// Heuristic confidence score, 0..=100
    pub confidence: u8,
    /// Human-readable reasons the match fired (matched keywords, patterns)
    pub match_reasons: Vec<String>,
}

// ========== Merchant Mappings ==========

/// How a merchant mapping was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    /// Inferred by the engine
    AutoDetected,
    /// Confirmed or corrected by the user
    UserConfirmed,
}

impl MappingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoDetected => "auto_detected",
            Self::UserConfirmed => "user_confirmed",
        }
    }
}

/// A learned merchant-name → category association.
///
/// Confidence drifts up with confirmations and down with corrections;
/// counters feed the similarity search ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantMapping {
    /// Raw merchant name as first observed
    pub merchant_name: String,
    /// Canonical normalized key (see `merchant::normalize`)
    pub normalized_name: String,
    pub category_id: String,
    /// 0.0..=1.0
    pub confidence: f64,
    pub source: MappingSource,
    pub successful_mappings: u32,
    pub failed_mappings: u32,
    pub last_used_at: DateTime<Utc>,
}

// ========== Anomalies ==========

/// Kinds of spending anomalies the detector emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// Single transaction far above the category baseline
    UnusuallyHighAmount,
    /// Whole-period category spend far above monthly history
    HighCategorySpending,
    /// Burst of transactions at one merchant within minutes
    FrequentMerchant,
    /// Activity during historically quiet hours or odd weekday/weekend skew
    UnusualTimePattern,
    /// Two near-identical transactions minutes apart
    PotentialDuplicate,
    /// Large charge at a merchant never seen in history
    NewMerchant,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnusuallyHighAmount => "unusually_high_amount",
            Self::HighCategorySpending => "high_category_spending",
            Self::FrequentMerchant => "frequent_merchant",
            Self::UnusualTimePattern => "unusual_time_pattern",
            Self::PotentialDuplicate => "potential_duplicate",
            Self::NewMerchant => "new_merchant",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UnusuallyHighAmount => "Unusually High Amount",
            Self::HighCategorySpending => "High Category Spending",
            Self::FrequentMerchant => "Frequent Merchant Activity",
            Self::UnusualTimePattern => "Unusual Time Pattern",
            Self::PotentialDuplicate => "Potential Duplicate",
            Self::NewMerchant => "New Merchant",
        }
    }
}

/// Anomaly severity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Numeric priority for sorting (highest first)
    pub fn priority(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finding produced by one anomaly detection run.
///
/// Produced fresh each run; the engine never persists these itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedAnomaly {
    /// Referenced transaction; None for category-level findings
    pub transaction_id: Option<String>,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub description: String,
    /// 0.0..=1.0 heuristic confidence
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

// ========== Subscriptions ==========

/// Inferred payment cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Nominal interval length in days
    pub fn interval_days(&self) -> f64 {
        match self {
            Self::Daily => 1.0,
            Self::Weekly => 7.0,
            Self::Monthly => 30.44,
            Self::Quarterly => 91.31,
            Self::Yearly => 365.25,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trial,
    Paused,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "trial" => Ok(Self::Trial),
            "paused" => Ok(Self::Paused),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown subscription status: {}", s)),
        }
    }
}

/// A recurring payment inferred from transaction history.
///
/// Created once ≥3 recurring payments to the same normalized merchant are
/// observed; flips to `Cancelled` when the gap since the last payment
/// exceeds ~2× the inferred interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    /// Display name derived from the merchant ("NETFLIX.COM" → "Netflix")
    pub service_name: String,
    /// Normalized merchant key the group was built from
    pub merchant_name: String,
    pub category_id: Option<String>,
    pub frequency: Frequency,
    /// Latest amount normalized to a monthly equivalent
    pub monthly_amount: Money,
    /// Latest observed charge amount
    pub actual_amount: Money,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub next_renewal_date: NaiveDate,
    pub last_payment_date: Option<NaiveDate>,
    pub renewal_count: u32,
    pub has_variable_amount: bool,
    /// Ids of the transactions that formed this subscription
    pub transaction_history: Vec<String>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trial
        )
    }
}

/// A renewal reminder handed to the notification collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalReminder {
    pub subscription_id: String,
    pub service_name: String,
    pub renewal_date: NaiveDate,
    pub amount: Money,
    pub days_until_renewal: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enum_round_trips() {
        assert_eq!(
            TransactionType::from_str("DEBIT").unwrap(),
            TransactionType::Debit
        );
        assert_eq!(
            ConditionOperator::from_str("starts_with").unwrap(),
            ConditionOperator::StartsWith
        );
        assert_eq!(Frequency::from_str("monthly").unwrap(), Frequency::Monthly);
        assert_eq!(Frequency::Monthly.as_str(), "monthly");
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::High.priority() > Severity::Medium.priority());
        assert!(Severity::Medium.priority() > Severity::Low.priority());
    }
}
