//! LedgerSift Core Library
//!
//! Transaction intelligence for personal-finance data:
//! - Exact-decimal money values with currency safety
//! - Rule evaluation and heuristic category matching
//! - Merchant name normalization with a learned mapping store
//! - Statistical spending-anomaly detection
//! - Recurring-payment (subscription) inference
//! - Duplicate identification and merge resolution
//! - CSV snapshot import with re-import deduplication
//!
//! All detectors are pure, synchronous batch computations over immutable
//! snapshots; the merchant mapping store is the single mutable component.

pub mod anomaly;
pub mod categories;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod import;
pub mod merchant;
pub mod models;
pub mod money;
pub mod repo;
pub mod rules;
pub mod stats;
pub mod subscriptions;

pub use anomaly::{AnomalyConfig, AnomalyDetector};
pub use categories::CategoryIndex;
pub use dedup::{DuplicateGroup, MergeOutcome, MergeStrategy};
pub use engine::{AnalysisEngine, AnalysisReport, CategorizedTransaction};
pub use error::{Error, Result};
pub use import::{load_csv, ImportedSnapshot};
pub use merchant::{
    normalize, similarity, FeedbackOutcome, MappingFeedback, MappingStore, MemoryMappingStore,
    MerchantMapper,
};
pub use models::{
    AnomalyType, CategorizationRule, Category, CategoryMatch, CategoryType, ConditionOperator,
    DetectedAnomaly, Frequency, MappingSource, MerchantMapping, RenewalReminder, RuleCondition,
    RuleField, Severity, Subscription, SubscriptionStatus, Transaction, TransactionStatus,
    TransactionType,
};
pub use money::Money;
pub use repo::{
    CategorySource, MemoryCategorySource, MemorySubscriptionStore, MemoryTransactionSource,
    SubscriptionStore, TransactionSource,
};
pub use rules::CategoryMatcher;
pub use subscriptions::{upcoming_renewals, SubscriptionConfig, SubscriptionDetector};
