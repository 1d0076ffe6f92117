//! Merchant name normalization and the learned mapping store
//!
//! Raw bank merchant strings are noisy: branch numbers, city suffixes,
//! payment-processor prefixes. Normalization reduces variants of the same
//! logical merchant to one canonical key ("PANDA HYPERMARKET RIYADH" and
//! "Panda Hypermarket - Branch 123" both become "panda hypermarket").
//!
//! The mapping store is the one mutable dataset in the engine. It sits
//! behind the `MappingStore` trait so the detectors stay pure functions of
//! their inputs; the in-memory implementation serializes updates with a
//! mutex. Corrections are idempotent by design, so last-writer-wins on
//! racing identical corrections is safe.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{MappingSource, MerchantMapping};

/// Similarity floor below which a fuzzy lookup returns nothing
pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.6;

const CONFIDENCE_USER: f64 = 0.9;
const CONFIDENCE_AUTO: f64 = 0.6;
const CONFIDENCE_STEP: f64 = 0.05;

/// Tokens that denote a branch or location rather than the merchant itself
const NOISE_TOKENS: &[&str] = &[
    "branch", "store", "location", "mall", "center", "centre", "riyadh", "jeddah", "dammam",
    "makkah", "madinah", "khobar", "ksa", "llc", "ltd", "inc", "co",
];

/// Canonicalize a raw merchant string.
///
/// Lowercase, punctuation to spaces, drop purely numeric tokens and known
/// branch/location noise, collapse whitespace. Two names normalize equal
/// iff they denote the same logical merchant.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !NOISE_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between two normalized keys in 0.0..=1.0.
///
/// Averages token-set overlap (Jaccard) with a normalized edit-distance
/// score, so both word reordering and small spelling drift are tolerated.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    let intersection = tokens_a.intersection(&tokens_b).count() as f64;
    let union = tokens_a.union(&tokens_b).count() as f64;
    let jaccard = if union > 0.0 { intersection / union } else { 0.0 };

    let max_len = a.chars().count().max(b.chars().count()) as f64;
    let edit = edit_distance(a, b) as f64;
    let edit_score = 1.0 - (edit / max_len);

    (jaccard + edit_score) / 2.0
}

/// Classic Levenshtein distance with a single rolling row.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Feedback outcome for a mapping use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// The suggested category was right
    Confirmed,
    /// The user picked a different category
    Rejected,
}

/// A feedback event recorded against a mapping
#[derive(Debug, Clone)]
pub struct MappingFeedback {
    pub merchant_name: String,
    pub outcome: FeedbackOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// Persistence contract for merchant mappings (collaborator boundary).
///
/// Updates must be serialized by the implementation; the engine performs
/// read-modify-write sequences through this interface.
pub trait MappingStore: Send + Sync {
    /// Exact lookup by raw name or by its normalized key
    fn get_by_merchant_name(&self, name: &str) -> Result<Option<MerchantMapping>>;
    fn get_all_mappings(&self) -> Result<Vec<MerchantMapping>>;
    fn upsert(&self, mapping: MerchantMapping) -> Result<()>;
    fn upsert_bulk(&self, mappings: Vec<MerchantMapping>) -> Result<()>;
    fn delete(&self, merchant_name: &str) -> Result<()>;
    fn delete_all(&self) -> Result<()>;
    /// Groups of mappings whose normalized keys collide (size ≥ 2)
    fn find_duplicates(&self) -> Result<Vec<Vec<MerchantMapping>>>;
    fn record_feedback(&self, event: MappingFeedback) -> Result<()>;
}

/// In-memory mapping store keyed by raw merchant name.
///
/// A single mutex serializes all mutations, which covers the per-key
/// serialization the correction flow requires.
#[derive(Default)]
pub struct MemoryMappingStore {
    mappings: Mutex<HashMap<String, MerchantMapping>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MerchantMapping>>> {
        self.mappings
            .lock()
            .map_err(|_| Error::External("mapping store lock poisoned".to_string()))
    }
}

impl MappingStore for MemoryMappingStore {
    fn get_by_merchant_name(&self, name: &str) -> Result<Option<MerchantMapping>> {
        let mappings = self.lock()?;
        if let Some(found) = mappings.get(name) {
            return Ok(Some(found.clone()));
        }
        let key = normalize(name);
        Ok(mappings
            .values()
            .find(|m| m.normalized_name == key)
            .cloned())
    }

    fn get_all_mappings(&self) -> Result<Vec<MerchantMapping>> {
        let mappings = self.lock()?;
        Ok(mappings.values().cloned().collect())
    }

    fn upsert(&self, mapping: MerchantMapping) -> Result<()> {
        let mut mappings = self.lock()?;
        mappings.insert(mapping.merchant_name.clone(), mapping);
        Ok(())
    }

    fn upsert_bulk(&self, batch: Vec<MerchantMapping>) -> Result<()> {
        let mut mappings = self.lock()?;
        for mapping in batch {
            mappings.insert(mapping.merchant_name.clone(), mapping);
        }
        Ok(())
    }

    fn delete(&self, merchant_name: &str) -> Result<()> {
        let mut mappings = self.lock()?;
        if mappings.remove(merchant_name).is_none() {
            return Err(Error::NotFound(format!(
                "merchant mapping '{}'",
                merchant_name
            )));
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn find_duplicates(&self) -> Result<Vec<Vec<MerchantMapping>>> {
        let mappings = self.lock()?;
        let mut by_key: HashMap<&str, Vec<&MerchantMapping>> = HashMap::new();
        for mapping in mappings.values() {
            by_key
                .entry(mapping.normalized_name.as_str())
                .or_default()
                .push(mapping);
        }
        Ok(by_key
            .into_values()
            .filter(|group| group.len() >= 2)
            .map(|group| group.into_iter().cloned().collect())
            .collect())
    }

    fn record_feedback(&self, event: MappingFeedback) -> Result<()> {
        let mut mappings = self.lock()?;
        let key = normalize(&event.merchant_name);
        let Some(mapping) = mappings
            .values_mut()
            .find(|m| m.normalized_name == key)
        else {
            return Err(Error::NotFound(format!(
                "merchant mapping '{}'",
                event.merchant_name
            )));
        };

        match event.outcome {
            FeedbackOutcome::Confirmed => {
                mapping.successful_mappings += 1;
                mapping.confidence = (mapping.confidence + CONFIDENCE_STEP).min(1.0);
            }
            FeedbackOutcome::Rejected => {
                mapping.failed_mappings += 1;
                mapping.confidence = (mapping.confidence - CONFIDENCE_STEP).max(0.0);
            }
        }
        mapping.last_used_at = event.recorded_at;
        Ok(())
    }
}

/// High-level merchant resolution over a mapping store
pub struct MerchantMapper<'a> {
    store: &'a dyn MappingStore,
    similarity_floor: f64,
}

impl<'a> MerchantMapper<'a> {
    pub fn new(store: &'a dyn MappingStore) -> Self {
        Self {
            store,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
        }
    }

    pub fn with_similarity_floor(store: &'a dyn MappingStore, floor: f64) -> Self {
        Self {
            store,
            similarity_floor: floor,
        }
    }

    /// Exact normalized-key match first, then the closest fuzzy match above
    /// the similarity floor, else nothing.
    pub fn find_best_mapping(&self, raw_name: &str) -> Result<Option<MerchantMapping>> {
        if let Some(exact) = self.store.get_by_merchant_name(raw_name)? {
            return Ok(Some(exact));
        }

        let key = normalize(raw_name);
        if key.is_empty() {
            return Ok(None);
        }

        let mut best: Option<(f64, MerchantMapping)> = None;
        for mapping in self.store.get_all_mappings()? {
            let score = similarity(&key, &mapping.normalized_name);
            if score < self.similarity_floor {
                continue;
            }
            let better = best
                .as_ref()
                .map(|(current, _)| score > *current)
                .unwrap_or(true);
            if better {
                best = Some((score, mapping));
            }
        }

        if let Some((score, mapping)) = &best {
            debug!(
                raw = raw_name,
                matched = %mapping.normalized_name,
                score,
                "Fuzzy merchant mapping match"
            );
        }
        Ok(best.map(|(_, m)| m))
    }

    /// Apply a user correction: confirm or supersede the learned category.
    ///
    /// Idempotent — repeating the same correction updates `last_used_at`
    /// only and never double-counts.
    pub fn learn_from_correction(
        &self,
        raw_name: &str,
        new_category_id: &str,
        at: DateTime<Utc>,
    ) -> Result<MerchantMapping> {
        let key = normalize(raw_name);
        if key.is_empty() {
            return Err(Error::Validation(format!(
                "merchant name '{}' normalizes to nothing",
                raw_name
            )));
        }

        let updated = match self.store.get_by_merchant_name(raw_name)? {
            Some(mut mapping) => {
                let same_category = mapping.category_id == new_category_id;
                if same_category && mapping.source == MappingSource::UserConfirmed {
                    // Repeat of an already-applied correction
                    mapping.last_used_at = at;
                } else if same_category {
                    // User confirms what the engine auto-detected
                    mapping.source = MappingSource::UserConfirmed;
                    mapping.successful_mappings += 1;
                    mapping.confidence = (mapping.confidence + 2.0 * CONFIDENCE_STEP).min(1.0);
                    mapping.last_used_at = at;
                } else {
                    // Supersede: the old category was a miss
                    mapping.failed_mappings += 1;
                    mapping.category_id = new_category_id.to_string();
                    mapping.source = MappingSource::UserConfirmed;
                    mapping.confidence = CONFIDENCE_USER;
                    mapping.last_used_at = at;
                }
                mapping
            }
            None => MerchantMapping {
                merchant_name: raw_name.to_string(),
                normalized_name: key,
                category_id: new_category_id.to_string(),
                confidence: CONFIDENCE_USER,
                source: MappingSource::UserConfirmed,
                successful_mappings: 1,
                failed_mappings: 0,
                last_used_at: at,
            },
        };

        self.store.upsert(updated.clone())?;
        Ok(updated)
    }

    /// Record an auto-detected mapping without user involvement.
    pub fn learn_auto(
        &self,
        raw_name: &str,
        category_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<MerchantMapping>> {
        let key = normalize(raw_name);
        if key.is_empty() {
            return Ok(None);
        }
        if self.store.get_by_merchant_name(raw_name)?.is_some() {
            // Never downgrade an existing (possibly user-confirmed) mapping
            return Ok(None);
        }
        let mapping = MerchantMapping {
            merchant_name: raw_name.to_string(),
            normalized_name: key,
            category_id: category_id.to_string(),
            confidence: CONFIDENCE_AUTO,
            source: MappingSource::AutoDetected,
            successful_mappings: 0,
            failed_mappings: 0,
            last_used_at: at,
        };
        self.store.upsert(mapping.clone())?;
        Ok(Some(mapping))
    }

    /// Merge mappings whose normalized keys collide into one record,
    /// summing counters and keeping the highest-confidence category.
    /// Returns the number of records removed.
    pub fn merge_duplicates(&self) -> Result<usize> {
        let mut removed = 0;

        for group in self.store.find_duplicates()? {
            let Some(winner) = group
                .iter()
                .max_by(|a, b| {
                    a.confidence
                        .partial_cmp(&b.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .cloned()
            else {
                continue;
            };

            let mut merged = winner.clone();
            merged.successful_mappings = group.iter().map(|m| m.successful_mappings).sum();
            merged.failed_mappings = group.iter().map(|m| m.failed_mappings).sum();
            merged.last_used_at = group
                .iter()
                .map(|m| m.last_used_at)
                .max()
                .unwrap_or(winner.last_used_at);
            if group
                .iter()
                .any(|m| m.source == MappingSource::UserConfirmed)
            {
                merged.source = MappingSource::UserConfirmed;
            }

            for loser in &group {
                if loser.merchant_name != merged.merchant_name {
                    self.store.delete(&loser.merchant_name)?;
                    removed += 1;
                }
            }
            self.store.upsert(merged)?;

            debug!(removed, "Merged duplicate merchant mappings");
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn normalization_collapses_variants() {
        assert_eq!(normalize("PANDA HYPERMARKET RIYADH"), "panda hypermarket");
        assert_eq!(normalize("Panda Hypermarket - Branch 123"), "panda hypermarket");
        assert_eq!(normalize("NETFLIX.COM*0042"), "netflix com");
        assert_eq!(normalize("  "), "");
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("panda hypermarket", "panda hypermarket"), 1.0);
        assert!(similarity("panda hypermarket", "panda hypermarkt") > 0.6);
        assert!(similarity("panda hypermarket", "uber") < 0.3);
        assert_eq!(similarity("", "anything"), 0.0);
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn correction_creates_then_is_idempotent() {
        let store = MemoryMappingStore::new();
        let mapper = MerchantMapper::new(&store);

        let first = mapper
            .learn_from_correction("PANDA HYPERMARKET RIYADH", "groceries", now())
            .unwrap();
        assert_eq!(first.successful_mappings, 1);
        assert_eq!(first.source, MappingSource::UserConfirmed);

        // Same correction again: no double count
        let later = now() + chrono::Duration::days(1);
        let second = mapper
            .learn_from_correction("PANDA HYPERMARKET RIYADH", "groceries", later)
            .unwrap();
        assert_eq!(second.successful_mappings, 1);
        assert_eq!(second.last_used_at, later);
    }

    #[test]
    fn correction_supersedes_category() {
        let store = MemoryMappingStore::new();
        let mapper = MerchantMapper::new(&store);

        mapper.learn_auto("CARREFOUR JEDDAH", "shopping", now()).unwrap();
        let corrected = mapper
            .learn_from_correction("CARREFOUR JEDDAH", "groceries", now())
            .unwrap();

        assert_eq!(corrected.category_id, "groceries");
        assert_eq!(corrected.failed_mappings, 1);
        assert_eq!(corrected.source, MappingSource::UserConfirmed);
    }

    #[test]
    fn fuzzy_lookup_above_floor() {
        let store = MemoryMappingStore::new();
        let mapper = MerchantMapper::new(&store);
        mapper
            .learn_from_correction("Panda Hypermarket", "groceries", now())
            .unwrap();

        // Different branch wording still resolves
        let found = mapper
            .find_best_mapping("PANDA HYPERMRKET BRANCH 55")
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().category_id, "groceries");

        // Unrelated merchant does not
        assert!(mapper.find_best_mapping("UBER TRIP").unwrap().is_none());
    }

    #[test]
    fn feedback_moves_confidence() {
        let store = MemoryMappingStore::new();
        let mapper = MerchantMapper::new(&store);
        mapper.learn_auto("SPOTIFY", "music", now()).unwrap();

        store
            .record_feedback(MappingFeedback {
                merchant_name: "SPOTIFY".to_string(),
                outcome: FeedbackOutcome::Confirmed,
                recorded_at: now(),
            })
            .unwrap();
        let confirmed = store.get_by_merchant_name("SPOTIFY").unwrap().unwrap();
        assert!(confirmed.confidence > CONFIDENCE_AUTO);
        assert_eq!(confirmed.successful_mappings, 1);

        store
            .record_feedback(MappingFeedback {
                merchant_name: "SPOTIFY".to_string(),
                outcome: FeedbackOutcome::Rejected,
                recorded_at: now(),
            })
            .unwrap();
        let rejected = store.get_by_merchant_name("SPOTIFY").unwrap().unwrap();
        assert_eq!(rejected.failed_mappings, 1);
    }

    #[test]
    fn duplicate_mappings_merge_into_one() {
        let store = MemoryMappingStore::new();
        let make = |raw: &str, confidence, success| MerchantMapping {
            merchant_name: raw.to_string(),
            normalized_name: normalize(raw),
            category_id: if confidence > 0.7 { "groceries" } else { "shopping" }.to_string(),
            confidence,
            source: MappingSource::AutoDetected,
            successful_mappings: success,
            failed_mappings: 1,
            last_used_at: now(),
        };
        store.upsert(make("PANDA HYPERMARKET RIYADH", 0.9, 4)).unwrap();
        store.upsert(make("Panda Hypermarket - Branch 123", 0.5, 2)).unwrap();

        let mapper = MerchantMapper::new(&store);
        let removed = mapper.merge_duplicates().unwrap();
        assert_eq!(removed, 1);

        let survivors = store.get_all_mappings().unwrap();
        assert_eq!(survivors.len(), 1);
        let merged = &survivors[0];
        assert_eq!(merged.category_id, "groceries");
        assert_eq!(merged.successful_mappings, 6);
        assert_eq!(merged.failed_mappings, 2);
    }
}
