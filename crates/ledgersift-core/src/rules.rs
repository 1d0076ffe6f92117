//! Rule evaluation and category matching
//!
//! Two independent paths assign categories:
//!
//! - Rule matching is strict: a `CategorizationRule` fires only when every
//!   condition evaluates true (logical AND). Competing rules resolve by
//!   priority, then confidence.
//! - Category scoring is heuristic: additive capped signals (keywords,
//!   merchant patterns, amount plausibility, type consistency) produce a
//!   0..=100 confidence, and callers pick the best-scoring category.
//!
//! An unparseable regex in a condition is a non-match, not an error.

use regex::RegexBuilder;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::categories::CategoryIndex;
use crate::error::Result;
use crate::models::{
    CategorizationRule, Category, CategoryMatch, CategoryType, ConditionOperator, RuleCondition,
    RuleField, Transaction, TransactionType,
};

const KEYWORD_POINTS: u32 = 10;
const KEYWORD_CAP: u32 = 40;
const PATTERN_POINTS: u32 = 15;
const PATTERN_CAP: u32 = 30;
const WITHIN_LIMIT_POINTS: u32 = 20;
const NEAR_LIMIT_POINTS: u32 = 10;
const TYPE_CONSISTENCY_POINTS: u32 = 10;

/// Evaluate one rule condition against a transaction.
///
/// Numeric operators compare the decimal amount when the field is `Amount`;
/// on any other field they fall back to lexicographic comparison of the
/// string form.
pub fn evaluate_condition(condition: &RuleCondition, transaction: &Transaction) -> bool {
    let field_value = match condition.field {
        RuleField::Description => transaction.description.clone(),
        RuleField::MerchantName => transaction.merchant_name.clone().unwrap_or_default(),
        RuleField::Amount => transaction.amount.amount.to_string(),
        RuleField::AccountId => transaction.account_id.clone(),
    };

    // Numeric comparison path for the amount field
    if condition.field == RuleField::Amount
        && matches!(
            condition.operator,
            ConditionOperator::GreaterThan | ConditionOperator::LessThan
        )
    {
        let Ok(threshold) = condition.value.parse::<Decimal>() else {
            debug!(
                value = %condition.value,
                "Non-numeric threshold in amount condition, treating as non-match"
            );
            return false;
        };
        return match condition.operator {
            ConditionOperator::GreaterThan => transaction.amount.amount > threshold,
            ConditionOperator::LessThan => transaction.amount.amount < threshold,
            _ => unreachable!(),
        };
    }

    let (haystack, needle) = if condition.case_sensitive {
        (field_value, condition.value.clone())
    } else {
        (field_value.to_lowercase(), condition.value.to_lowercase())
    };

    match condition.operator {
        ConditionOperator::Contains => haystack.contains(&needle),
        ConditionOperator::NotContains => !haystack.contains(&needle),
        ConditionOperator::Equals => haystack == needle,
        ConditionOperator::NotEquals => haystack != needle,
        ConditionOperator::StartsWith => haystack.starts_with(&needle),
        ConditionOperator::EndsWith => haystack.ends_with(&needle),
        ConditionOperator::GreaterThan => haystack.as_str() > needle.as_str(),
        ConditionOperator::LessThan => haystack.as_str() < needle.as_str(),
        ConditionOperator::Regex => {
            match RegexBuilder::new(&condition.value)
                .case_insensitive(!condition.case_sensitive)
                .build()
            {
                Ok(re) => re.is_match(&haystack),
                Err(e) => {
                    // Graceful degradation: a bad pattern must not abort a batch run
                    warn!(pattern = %condition.value, error = %e, "Invalid regex in rule condition");
                    false
                }
            }
        }
    }
}

impl CategorizationRule {
    /// A rule fires only when it is active, has at least one condition, and
    /// every condition evaluates true.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if !self.active || self.conditions.is_empty() {
            return false;
        }
        self.conditions
            .iter()
            .all(|c| evaluate_condition(c, transaction))
    }
}

/// Pick the winning rule among all that fire: highest priority, then
/// highest confidence.
pub fn best_rule<'a>(
    rules: &'a [CategorizationRule],
    transaction: &Transaction,
) -> Option<&'a CategorizationRule> {
    rules
        .iter()
        .filter(|r| r.matches(transaction))
        .max_by_key(|r| (r.priority, r.confidence))
}

/// Heuristic category scorer
#[derive(Debug, Default)]
pub struct CategoryMatcher;

impl CategoryMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Score a transaction against one category, 0..=100.
    ///
    /// Fails only on a currency mismatch between the transaction amount and
    /// the category's monthly limit; everything else degrades to a lower
    /// score.
    pub fn score(&self, transaction: &Transaction, category: &Category) -> Result<CategoryMatch> {
        let mut confidence: u32 = 0;
        let mut reasons = Vec::new();

        let description = transaction.description.to_lowercase();
        let merchant = transaction
            .merchant_name
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        // Keyword overlap, +10 each capped at 40
        let mut keyword_points = 0;
        for keyword in &category.keywords {
            let kw = keyword.to_lowercase();
            if kw.is_empty() {
                continue;
            }
            if description.contains(&kw) || merchant.contains(&kw) {
                keyword_points += KEYWORD_POINTS;
                reasons.push(format!("keyword '{}'", keyword));
            }
        }
        confidence += keyword_points.min(KEYWORD_CAP);

        // Merchant-pattern overlap, +15 each capped at 30
        let mut pattern_points = 0;
        for pattern in &category.merchant_patterns {
            let pat = pattern.to_lowercase();
            if pat.is_empty() {
                continue;
            }
            if merchant.contains(&pat) || (merchant.is_empty() && description.contains(&pat)) {
                pattern_points += PATTERN_POINTS;
                reasons.push(format!("merchant pattern '{}'", pattern));
            }
        }
        confidence += pattern_points.min(PATTERN_CAP);

        // Amount plausibility against the category's monthly limit
        if let Some(limit) = &category.monthly_limit {
            let amount = transaction.amount.abs();
            let double_limit = crate::money::Money::new(
                limit.amount * Decimal::from(2),
                limit.currency.clone(),
            );
            if amount.checked_cmp(limit)? != std::cmp::Ordering::Greater {
                confidence += WITHIN_LIMIT_POINTS;
                reasons.push("amount within monthly limit".to_string());
            } else if amount.checked_cmp(&double_limit)? != std::cmp::Ordering::Greater {
                confidence += NEAR_LIMIT_POINTS;
                reasons.push("amount near monthly limit".to_string());
            }
        }

        // Category-type consistency with the transaction direction
        if type_is_consistent(category.category_type, transaction) {
            confidence += TYPE_CONSISTENCY_POINTS;
            reasons.push(format!(
                "transaction type consistent with {} category",
                category.category_type.as_str()
            ));
        }

        Ok(CategoryMatch {
            category_id: category.id.clone(),
            confidence: confidence.min(100) as u8,
            match_reasons: reasons,
        })
    }

    /// Score the transaction against every category and pick the winner.
    ///
    /// Ties break by the category's strongest rule priority, then by the
    /// deepest (most specific) category, then by category id so a full tie
    /// resolves the same way on every run. Zero-confidence scores never
    /// win.
    pub fn best_match(
        &self,
        transaction: &Transaction,
        index: &CategoryIndex,
    ) -> Result<Option<CategoryMatch>> {
        let mut best: Option<(CategoryMatch, i32, u32)> = None;

        for category in index.iter() {
            let candidate = self.score(transaction, category)?;
            if candidate.confidence == 0 {
                continue;
            }

            let rule_priority = category
                .rules
                .iter()
                .map(|r| r.priority)
                .max()
                .unwrap_or(0);
            let depth = index.depth(&category.id);

            let replace = match &best {
                None => true,
                Some((current, cur_priority, cur_depth)) => {
                    // Reverse on the id: the lexicographically first
                    // category wins a full tie, independent of map order
                    (
                        candidate.confidence,
                        rule_priority,
                        depth,
                        std::cmp::Reverse(category.id.as_str()),
                    ) > (
                        current.confidence,
                        *cur_priority,
                        *cur_depth,
                        std::cmp::Reverse(current.category_id.as_str()),
                    )
                }
            };
            if replace {
                best = Some((candidate, rule_priority, depth));
            }
        }

        Ok(best.map(|(m, _, _)| m))
    }
}

/// Whether a transaction's direction fits the category's semantic type.
/// Transfers are recognized by a description marker rather than direction.
fn type_is_consistent(category_type: CategoryType, transaction: &Transaction) -> bool {
    match category_type {
        CategoryType::Expense | CategoryType::Savings => {
            transaction.transaction_type == TransactionType::Debit
        }
        CategoryType::Income => transaction.transaction_type == TransactionType::Credit,
        CategoryType::Transfer => transaction.description.to_lowercase().contains("transfer"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn tx(description: &str, merchant: Option<&str>, minor: i64) -> Transaction {
        Transaction {
            id: "tx-1".to_string(),
            account_id: "acct-1".to_string(),
            amount: Money::from_minor(minor, "SAR"),
            transaction_type: TransactionType::Debit,
            description: description.to_string(),
            merchant_name: merchant.map(str::to_string),
            category_id: None,
            date: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            tags: BTreeSet::new(),
            status: Default::default(),
        }
    }

    fn condition(field: RuleField, operator: ConditionOperator, value: &str) -> RuleCondition {
        RuleCondition {
            field,
            operator,
            value: value.to_string(),
            case_sensitive: false,
        }
    }

    fn expense_category(id: &str, keywords: &[&str]) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_string(),
            category_type: CategoryType::Expense,
            level: 0,
            parent_id: None,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            merchant_patterns: vec![],
            rules: vec![],
            monthly_limit: None,
        }
    }

    #[test]
    fn condition_operators() {
        let t = tx("STARBUCKS RIYADH 0042", Some("Starbucks"), 2500);

        assert!(evaluate_condition(
            &condition(RuleField::Description, ConditionOperator::Contains, "starbucks"),
            &t
        ));
        assert!(evaluate_condition(
            &condition(RuleField::MerchantName, ConditionOperator::Equals, "STARBUCKS"),
            &t
        ));
        assert!(evaluate_condition(
            &condition(RuleField::Description, ConditionOperator::StartsWith, "star"),
            &t
        ));
        assert!(evaluate_condition(
            &condition(RuleField::Description, ConditionOperator::EndsWith, "0042"),
            &t
        ));
        assert!(evaluate_condition(
            &condition(RuleField::Description, ConditionOperator::NotContains, "uber"),
            &t
        ));
        assert!(!evaluate_condition(
            &condition(RuleField::AccountId, ConditionOperator::NotEquals, "acct-1"),
            &t
        ));
    }

    #[test]
    fn numeric_amount_comparison() {
        let t = tx("coffee", None, 2500);
        assert!(evaluate_condition(
            &condition(RuleField::Amount, ConditionOperator::GreaterThan, "10"),
            &t
        ));
        assert!(evaluate_condition(
            &condition(RuleField::Amount, ConditionOperator::LessThan, "100.50"),
            &t
        ));
        // Unparseable threshold degrades to non-match
        assert!(!evaluate_condition(
            &condition(RuleField::Amount, ConditionOperator::GreaterThan, "ten"),
            &t
        ));
    }

    #[test]
    fn invalid_regex_is_non_match() {
        let t = tx("anything", None, 100);
        assert!(!evaluate_condition(
            &condition(RuleField::Description, ConditionOperator::Regex, "[unclosed"),
            &t
        ));
        assert!(evaluate_condition(
            &condition(RuleField::Description, ConditionOperator::Regex, "^any.*g$"),
            &t
        ));
    }

    #[test]
    fn rule_requires_all_conditions() {
        let t = tx("uber trip riyadh", Some("Uber"), 3500);
        let rule = CategorizationRule {
            id: "r1".to_string(),
            category_id: "transport".to_string(),
            conditions: vec![
                condition(RuleField::Description, ConditionOperator::Contains, "uber"),
                condition(RuleField::Amount, ConditionOperator::GreaterThan, "100"),
            ],
            priority: 5,
            confidence: 90,
            active: true,
        };

        // Exactly one condition true: no match
        assert!(!rule.matches(&t));

        let mut both_true = rule.clone();
        both_true.conditions[1] =
            condition(RuleField::Amount, ConditionOperator::GreaterThan, "10");
        assert!(both_true.matches(&t));

        let mut inactive = both_true.clone();
        inactive.active = false;
        assert!(!inactive.matches(&t));
    }

    #[test]
    fn rule_resolution_by_priority_then_confidence() {
        let t = tx("netflix.com", Some("NETFLIX.COM"), 5600);
        let mk = |id: &str, priority, confidence| CategorizationRule {
            id: id.to_string(),
            category_id: "streaming".to_string(),
            conditions: vec![condition(
                RuleField::Description,
                ConditionOperator::Contains,
                "netflix",
            )],
            priority,
            confidence,
            active: true,
        };

        let rules = vec![mk("low", 1, 99), mk("high", 10, 50), mk("mid", 10, 40)];
        assert_eq!(best_rule(&rules, &t).unwrap().id, "high");
    }

    #[test]
    fn keyword_plus_type_consistency_scores_twenty() {
        // Keyword match with no patterns, no limit: an expense category
        // with an outgoing transaction scores 10 + 10.
        let t = tx("restaurant lunch", None, 4500);
        let category = expense_category("dining", &["restaurant"]);

        let m = CategoryMatcher::new().score(&t, &category).unwrap();
        assert_eq!(m.confidence, 20);
        assert_eq!(m.match_reasons.len(), 2);
    }

    #[test]
    fn keyword_points_are_capped() {
        let t = tx("a b c d e f", None, 100);
        let category = expense_category("misc", &["a", "b", "c", "d", "e", "f"]);
        let m = CategoryMatcher::new().score(&t, &category).unwrap();
        // 6 keywords would be 60 uncapped; cap at 40, plus 10 type consistency
        assert_eq!(m.confidence, 50);
    }

    #[test]
    fn amount_limit_scoring() {
        let mut category = expense_category("groceries", &[]);
        category.monthly_limit = Some(Money::from_minor(50_000, "SAR"));

        let within = CategoryMatcher::new()
            .score(&tx("panda", None, 30_000), &category)
            .unwrap();
        assert_eq!(within.confidence, 30); // 20 limit + 10 type

        let near = CategoryMatcher::new()
            .score(&tx("panda", None, 80_000), &category)
            .unwrap();
        assert_eq!(near.confidence, 20); // 10 near-limit + 10 type

        let over = CategoryMatcher::new()
            .score(&tx("panda", None, 200_000), &category)
            .unwrap();
        assert_eq!(over.confidence, 10); // type only
    }

    #[test]
    fn mismatched_limit_currency_is_an_error() {
        let mut category = expense_category("groceries", &[]);
        category.monthly_limit = Some(Money::from_minor(50_000, "USD"));

        let result = CategoryMatcher::new().score(&tx("panda", None, 30_000), &category);
        assert!(result.is_err());
    }

    #[test]
    fn best_match_prefers_deeper_category_on_tie() {
        let mut parent = expense_category("food", &["lunch"]);
        parent.name = "Food".to_string();
        let mut child = expense_category("dining", &["lunch"]);
        child.name = "Dining".to_string();
        child.parent_id = Some("food".to_string());

        let index = CategoryIndex::new(vec![parent, child]);
        let best = CategoryMatcher::new()
            .best_match(&tx("lunch downtown", None, 4000), &index)
            .unwrap()
            .unwrap();
        assert_eq!(best.category_id, "dining");
    }

    #[test]
    fn full_tie_picks_the_same_category_every_run() {
        // A dozen siblings with identical scores must not let map iteration
        // order pick the winner
        for _ in 0..20 {
            let siblings: Vec<Category> = (0..12)
                .map(|n| expense_category(&format!("cat-{n}"), &["lunch"]))
                .collect();
            let index = CategoryIndex::new(siblings);
            let best = CategoryMatcher::new()
                .best_match(&tx("lunch downtown", None, 4000), &index)
                .unwrap()
                .unwrap();
            assert_eq!(best.category_id, "cat-0");
        }
    }
}
