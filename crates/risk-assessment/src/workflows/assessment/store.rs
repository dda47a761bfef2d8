use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use super::domain::{
    CategoryCode, CoefficientField, PhaseAssessment, RiskDraft, RiskId, RiskItem, TextField,
};
use super::library::SequenceCounter;
use super::quota::{QuotaDecision, QuotaGuard, SessionTier};
use super::reconciler::normalizer::batch_key;
use super::scoring::{FineKinneyScale, SeverityTier};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("an entry with hazard '{hazard}' and risk '{risk}' already exists")]
    DuplicateEntry { hazard: String, risk: String },
    #[error("free sessions are limited to {limit} entries; upgrade to add more")]
    QuotaExceeded { limit: usize },
    #[error("only {remaining} more entries fit, {requested} were requested")]
    PartialQuota { remaining: usize, requested: usize },
    #[error("entry {0} not found")]
    NotFound(RiskId),
}

impl StoreError {
    fn from_quota(decision: QuotaDecision) -> Option<Self> {
        match decision {
            QuotaDecision::Allowed => None,
            QuotaDecision::Exhausted { limit } => Some(Self::QuotaExceeded { limit }),
            QuotaDecision::Partial {
                remaining,
                requested,
            } => Some(Self::PartialQuota {
                remaining,
                requested,
            }),
        }
    }
}

/// Result of a bulk insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub added: Vec<RiskItem>,
    pub skipped_duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CategoryRemoval {
    Removed { count: usize },
    NothingToRemove,
}

/// Ordered collection of finalized entries.
///
/// Every operation returns a fresh store rather than mutating in place, so a
/// failed operation leaves the caller's snapshot untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskEntryStore {
    entries: Vec<RiskItem>,
    next_id: u64,
}

impl RiskEntryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Restores persisted entries. The id counter never moves backwards past
    /// an id still present in the store.
    pub fn from_entries(entries: Vec<RiskItem>, next_id: u64) -> Self {
        let floor = entries
            .iter()
            .map(|entry| entry.id.0 + 1)
            .max()
            .unwrap_or(1);
        Self {
            entries,
            next_id: next_id.max(floor),
        }
    }

    pub fn entries(&self) -> &[RiskItem] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: RiskId) -> Option<&RiskItem> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Exact, case-sensitive `(hazard, risk)` match.
    pub fn contains_pair(&self, hazard: &str, risk: &str) -> bool {
        self.entries.iter().any(|entry| entry.duplicates(hazard, risk))
    }

    pub fn add_one(
        &self,
        draft: RiskDraft,
        quota: &QuotaGuard,
        tier: SessionTier,
    ) -> Result<(Self, RiskItem), StoreError> {
        if self.contains_pair(&draft.text.hazard, &draft.text.risk) {
            debug!(hazard = %draft.text.hazard, "duplicate entry rejected");
            return Err(StoreError::DuplicateEntry {
                hazard: draft.text.hazard,
                risk: draft.text.risk,
            });
        }
        if let Some(error) = StoreError::from_quota(quota.check(self.len(), 1, tier)) {
            return Err(error);
        }

        let mut next = self.clone();
        let mut sequence = SequenceCounter::from_entries(&self.entries);
        let item = next.materialize(draft, &mut sequence);
        next.entries.push(item.clone());
        info!(id = %item.id, risk_no = %item.risk_no, "risk entry added");
        Ok((next, item))
    }

    /// Admits every draft that is neither already stored nor repeated earlier
    /// in the batch, all at once or not at all.
    pub fn add_many(
        &self,
        drafts: Vec<RiskDraft>,
        quota: &QuotaGuard,
        tier: SessionTier,
    ) -> Result<(Self, BatchReport), StoreError> {
        let total = drafts.len();
        let mut seen = HashSet::new();
        let admissible: Vec<RiskDraft> = drafts
            .into_iter()
            .filter(|draft| {
                !self.contains_pair(&draft.text.hazard, &draft.text.risk)
                    && seen.insert(batch_key(&draft.text.hazard, &draft.text.risk))
            })
            .collect();
        let skipped_duplicates = total - admissible.len();

        if let Some(error) = StoreError::from_quota(quota.check(self.len(), admissible.len(), tier))
        {
            info!(
                requested = admissible.len(),
                current = self.len(),
                "batch rejected by quota"
            );
            return Err(error);
        }

        let mut next = self.clone();
        let mut sequence = SequenceCounter::from_entries(&self.entries);
        let mut added = Vec::with_capacity(admissible.len());
        for draft in admissible {
            let item = next.materialize(draft, &mut sequence);
            next.entries.push(item.clone());
            added.push(item);
        }

        info!(
            added = added.len(),
            skipped_duplicates, "risk batch admitted"
        );
        Ok((
            next,
            BatchReport {
                added,
                skipped_duplicates,
            },
        ))
    }

    fn materialize(&mut self, draft: RiskDraft, sequence: &mut SequenceCounter) -> RiskItem {
        let id = RiskId(self.next_id);
        self.next_id += 1;

        let generated = sequence.advance(&draft.category_code);
        let risk_no = draft
            .risk_no
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(generated);

        RiskItem {
            id,
            risk_no,
            category_code: draft.category_code,
            text: draft.text,
            current: PhaseAssessment::new(draft.current),
            target: PhaseAssessment::new(draft.target),
            image: draft.image,
        }
    }

    /// Unknown ids are not an error.
    pub fn remove(&self, id: RiskId) -> (Self, Option<RiskItem>) {
        let mut next = self.clone();
        let removed = next
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .map(|index| next.entries.remove(index));
        (next, removed)
    }

    pub fn remove_by_category(&self, code: &CategoryCode) -> (Self, CategoryRemoval) {
        let mut next = self.clone();
        next.entries.retain(|entry| &entry.category_code != code);
        let count = self.len() - next.len();
        let outcome = if count == 0 {
            CategoryRemoval::NothingToRemove
        } else {
            CategoryRemoval::Removed { count }
        };
        (next, outcome)
    }

    /// Wholesale wipe. Only reachable through an explicit confirmation step.
    pub fn clear_all_confirmed(&self) -> (Self, usize) {
        let next = Self {
            entries: Vec::new(),
            next_id: self.next_id,
        };
        (next, self.len())
    }

    /// Live edit: empty input counts as 0 until the field is finalized.
    pub fn update_coefficient(
        &self,
        id: RiskId,
        field: CoefficientField,
        raw_value: &str,
    ) -> Result<(Self, RiskItem), StoreError> {
        let value = parse_coefficient_input(raw_value);
        self.replace_entry(id, |entry| Ok(entry.with_coefficient(field, value)))
    }

    /// Field-exit correction: values below 1 snap to 1.
    pub fn finalize_coefficient(
        &self,
        id: RiskId,
        field: CoefficientField,
    ) -> Result<(Self, RiskItem), StoreError> {
        self.replace_entry(id, |entry| {
            if entry.coefficient(field) < FineKinneyScale::MIN {
                Ok(entry.with_coefficient(field, FineKinneyScale::MIN))
            } else {
                Ok(entry.clone())
            }
        })
    }

    pub fn update_text(
        &self,
        id: RiskId,
        field: TextField,
        value: String,
    ) -> Result<(Self, RiskItem), StoreError> {
        let (next, updated) = self.replace_entry(id, |entry| {
            let mut updated = entry.clone();
            updated.text.set_field(field, value);
            Ok(updated)
        })?;

        if matches!(field, TextField::Hazard | TextField::Risk) {
            let clash = next.entries.iter().any(|entry| {
                entry.id != id && entry.duplicates(&updated.text.hazard, &updated.text.risk)
            });
            if clash {
                return Err(StoreError::DuplicateEntry {
                    hazard: updated.text.hazard,
                    risk: updated.text.risk,
                });
            }
        }
        Ok((next, updated))
    }

    pub fn set_image(
        &self,
        id: RiskId,
        image: Option<String>,
    ) -> Result<(Self, RiskItem), StoreError> {
        self.replace_entry(id, |entry| {
            let mut updated = entry.clone();
            updated.image = image;
            Ok(updated)
        })
    }

    fn replace_entry<F>(&self, id: RiskId, edit: F) -> Result<(Self, RiskItem), StoreError>
    where
        F: FnOnce(&RiskItem) -> Result<RiskItem, StoreError>,
    {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let updated = edit(&self.entries[index])?;
        let mut next = self.clone();
        next.entries[index] = updated.clone();
        Ok((next, updated))
    }

    /// Entries whose phase-1 score meets the tier's threshold.
    pub fn filter_by_severity(&self, tier: SeverityTier) -> Vec<&RiskItem> {
        self.entries
            .iter()
            .filter(|entry| tier.admits(entry.current.score()))
            .collect()
    }
}

impl Default for RiskEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Leading-integer parse clamped to `[0, 100]`; anything unparseable is 0.
pub(crate) fn parse_coefficient_input(raw: &str) -> u32 {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = digits.chars().take_while(char::is_ascii_digit).collect();
    if negative || digits.is_empty() {
        return 0;
    }
    digits
        .parse::<u64>()
        .map(|value| value.min(FineKinneyScale::MAX as u64) as u32)
        .unwrap_or(FineKinneyScale::MAX)
}
