//! Candidate reconciliation: normalizes catalog and provider records, removes
//! duplicates, and runs the search → preview → commit protocol.

pub mod normalizer;
pub mod provider;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{CategoryCode, Coefficients, PhaseAssessment, RiskDraft, RiskItem, RiskText};
use super::library::Category;
use super::quota::{QuotaDecision, QuotaGuard, SessionTier};
use super::scoring::SeverityTier;
use super::store::{BatchReport, RiskEntryStore, StoreError};
use normalizer::{batch_key, RawCandidate};
use provider::{SuggestionProvider, SuggestionRequest, SuggestionResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PreviewId(pub u32);

impl std::fmt::Display for PreviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reconciled record awaiting user selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub preview_id: PreviewId,
    pub category_code: CategoryCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_risk_no: Option<String>,
    #[serde(flatten)]
    pub text: RiskText,
    /// Scored during search for tier filtering.
    pub current: PhaseAssessment,
    /// Scored only when committed.
    pub target: Coefficients,
    pub selected: bool,
}

impl Candidate {
    fn into_draft(self) -> RiskDraft {
        RiskDraft {
            risk_no: None,
            category_code: self.category_code,
            text: self.text,
            current: self.current.coefficients(),
            target: self.target,
            image: None,
        }
    }
}

/// Provider metadata echoed back with a preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuggestionMeta {
    pub method: Option<String>,
    pub sector_count: usize,
    pub general_count: usize,
    pub matched_tags: Vec<String>,
    pub received: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewSet {
    pub query: String,
    pub tier: SeverityTier,
    pub meta: SuggestionMeta,
    candidates: Vec<Candidate>,
}

impl PreviewSet {
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn selected_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.selected).count()
    }

    /// Flips one candidate; returns the new flag or `None` for unknown ids.
    pub fn toggle(&mut self, id: PreviewId) -> Option<bool> {
        let candidate = self.candidates.iter_mut().find(|c| c.preview_id == id)?;
        candidate.selected = !candidate.selected;
        Some(candidate.selected)
    }

    pub fn select_all(&mut self) {
        self.set_all(true);
    }

    pub fn deselect_all(&mut self) {
        self.set_all(false);
    }

    fn set_all(&mut self, selected: bool) {
        for candidate in &mut self.candidates {
            candidate.selected = selected;
        }
    }

    /// Replaces the selection with exactly `ids`.
    pub fn apply_selection(&mut self, ids: &[PreviewId]) {
        let wanted: HashSet<PreviewId> = ids.iter().copied().collect();
        for candidate in &mut self.candidates {
            candidate.selected = wanted.contains(&candidate.preview_id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    Preview(PreviewSet),
    NoEligibleResults { received: usize, tier: SeverityTier },
    ProviderUnavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("no candidates selected")]
    NoSelection,
    #[error("free sessions are limited to {limit} entries; upgrade to add more")]
    QuotaExceeded { limit: usize },
    #[error("only {remaining} of the {selected} selected candidates fit; select fewer and retry")]
    PartialQuota { remaining: usize, selected: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns every template of a category into drafts for `add_many`.
pub fn drafts_from_category(category: &Category) -> Vec<RiskDraft> {
    category
        .items
        .iter()
        .map(|item| RiskDraft {
            risk_no: None,
            category_code: category.code.clone(),
            text: item.text.clone(),
            current: item.current,
            target: item.target,
            image: None,
        })
        .collect()
}

/// Search-phase filtering: score, tier gate, store dedup, batch dedup.
pub fn build_preview(
    query: &str,
    tier: SeverityTier,
    response: SuggestionResponse,
    existing: &[RiskItem],
) -> SearchOutcome {
    let received = response.results.len();
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for raw in response.results {
        let RawCandidate {
            category_code,
            risk_no,
            item,
        } = raw;
        let current = PhaseAssessment::new(item.current);
        if !tier.admits(current.score()) {
            continue;
        }
        if existing
            .iter()
            .any(|entry| entry.duplicates(&item.text.hazard, &item.text.risk))
        {
            continue;
        }
        if !seen.insert(batch_key(&item.text.hazard, &item.text.risk)) {
            continue;
        }

        candidates.push(Candidate {
            preview_id: PreviewId(candidates.len() as u32 + 1),
            category_code: category_code
                .map(CategoryCode::new)
                .unwrap_or_else(CategoryCode::manual),
            suggested_risk_no: risk_no,
            text: item.text,
            current,
            target: item.target,
            selected: true,
        });
    }

    if candidates.is_empty() {
        return SearchOutcome::NoEligibleResults { received, tier };
    }

    SearchOutcome::Preview(PreviewSet {
        query: query.to_string(),
        tier,
        meta: SuggestionMeta {
            method: response.method,
            sector_count: response.sector_count,
            general_count: response.general_count,
            matched_tags: response.matched_tags,
            received,
        },
        candidates,
    })
}

/// Commit phase. Quota is checked against the whole selection; nothing is
/// admitted when it does not fit.
pub fn commit(
    mut preview: PreviewSet,
    selected_ids: Option<&[PreviewId]>,
    store: &RiskEntryStore,
    quota: &QuotaGuard,
    tier: SessionTier,
) -> Result<(RiskEntryStore, BatchReport), ReconcileError> {
    if let Some(ids) = selected_ids {
        preview.apply_selection(ids);
    }

    let selected: Vec<Candidate> = preview
        .candidates
        .into_iter()
        .filter(|candidate| candidate.selected)
        .collect();
    if selected.is_empty() {
        return Err(ReconcileError::NoSelection);
    }

    match quota.check(store.len(), selected.len(), tier) {
        QuotaDecision::Allowed => {}
        QuotaDecision::Exhausted { limit } => {
            warn!(selected = selected.len(), "commit blocked: quota exhausted");
            return Err(ReconcileError::QuotaExceeded { limit });
        }
        QuotaDecision::Partial { remaining, .. } => {
            return Err(ReconcileError::PartialQuota {
                remaining,
                selected: selected.len(),
            });
        }
    }

    let drafts = selected.into_iter().map(Candidate::into_draft).collect();
    let (next, report) = store.add_many(drafts, quota, tier)?;
    info!(committed = report.added.len(), "preview committed");
    Ok((next, report))
}

/// Search front-end bound to a suggestion provider.
pub struct CandidateReconciler<P> {
    provider: Arc<P>,
    limit: usize,
}

impl<P> CandidateReconciler<P>
where
    P: SuggestionProvider,
{
    pub fn new(provider: Arc<P>, limit: usize) -> Self {
        Self { provider, limit }
    }

    /// Provider failures become `ProviderUnavailable`, never an error.
    pub async fn search(
        &self,
        query: &str,
        tier: SeverityTier,
        existing: &[RiskItem],
    ) -> SearchOutcome {
        let request = SuggestionRequest {
            query: query.trim().to_string(),
            limit: self.limit,
        };

        match self.provider.suggest(request).await {
            Ok(response) => {
                let outcome = build_preview(query, tier, response, existing);
                match &outcome {
                    SearchOutcome::Preview(preview) => {
                        info!(query, candidates = preview.len(), "suggestion preview ready")
                    }
                    SearchOutcome::NoEligibleResults { received, .. } => {
                        info!(query, received, "no eligible suggestions")
                    }
                    SearchOutcome::ProviderUnavailable { .. } => {}
                }
                outcome
            }
            Err(error) => {
                warn!(query, %error, "suggestion provider unavailable");
                SearchOutcome::ProviderUnavailable {
                    reason: error.to_string(),
                }
            }
        }
    }
}
