use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::clear::{ClearConfirmation, ClearStep};
use super::domain::{
    AssessmentSnapshot, CategoryCode, CoefficientField, HeaderMetadata, RiskDraft, RiskId,
    RiskItem, TextField,
};
use super::library::CategoryLibrary;
use super::persistence::{AssessmentStorage, PersistenceHandle, SaveStatus, StorageError};
use super::quota::{QuotaGuard, SessionTier};
use super::reconciler::provider::SuggestionProvider;
use super::reconciler::{
    self, CandidateReconciler, PreviewId, PreviewSet, ReconcileError, SearchOutcome,
};
use super::report::AssessmentReport;
use super::scoring::SeverityTier;
use super::store::{BatchReport, CategoryRemoval, RiskEntryStore, StoreError};
use crate::config::AssessmentConfig;

struct AssessmentState {
    store: RiskEntryStore,
    header: HeaderMetadata,
    tier: SessionTier,
    clear: ClearConfirmation,
    preview: Option<PreviewSet>,
}

/// Single entry point for every mutation of the assessment being edited.
/// Mutations are serialized behind one lock; persistence is queued after each
/// successful change.
pub struct AssessmentService<P> {
    state: Mutex<AssessmentState>,
    library: Arc<CategoryLibrary>,
    reconciler: CandidateReconciler<P>,
    quota: QuotaGuard,
    clear_window: Duration,
    persistence: Option<PersistenceHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ClearOutcome {
    Armed {
        expires_at: chrono::DateTime<Utc>,
    },
    Cleared {
        removed: usize,
    },
}

impl<P> AssessmentService<P>
where
    P: SuggestionProvider + 'static,
{
    pub fn new(
        library: Arc<CategoryLibrary>,
        provider: Arc<P>,
        config: &AssessmentConfig,
        suggestion_limit: usize,
    ) -> Self {
        Self {
            state: Mutex::new(AssessmentState {
                store: RiskEntryStore::new(),
                header: HeaderMetadata::default(),
                tier: config.session_tier,
                clear: ClearConfirmation::Idle,
                preview: None,
            }),
            library,
            reconciler: CandidateReconciler::new(provider, suggestion_limit),
            quota: QuotaGuard::new(config.free_limit),
            clear_window: Duration::seconds(config.clear_window_secs),
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, handle: PersistenceHandle) -> Self {
        self.persistence = Some(handle);
        self
    }

    fn lock(&self) -> MutexGuard<'_, AssessmentState> {
        self.state.lock().expect("assessment state mutex poisoned")
    }

    /// Swaps in a new store, disarms a pending clear and queues a save.
    fn commit_store(&self, state: &mut AssessmentState, store: RiskEntryStore) {
        state.store = store;
        state.clear.disarm();
        self.persist(state);
    }

    fn persist(&self, state: &AssessmentState) {
        if let Some(handle) = &self.persistence {
            handle.enqueue(snapshot_of(state));
        }
    }

    /// Loads the last saved snapshot. Returns whether one was found.
    pub fn restore<S>(&self, storage: &S) -> Result<bool, StorageError>
    where
        S: AssessmentStorage + ?Sized,
    {
        let Some(snapshot) = storage.load()? else {
            return Ok(false);
        };
        let mut state = self.lock();
        state.store = RiskEntryStore::from_entries(snapshot.risks, snapshot.next_id);
        state.header = snapshot.header;
        info!(entries = state.store.len(), "assessment restored");
        Ok(true)
    }

    pub fn library(&self) -> &CategoryLibrary {
        &self.library
    }

    pub fn quota(&self) -> QuotaGuard {
        self.quota
    }

    pub fn snapshot(&self) -> AssessmentSnapshot {
        snapshot_of(&self.lock())
    }

    pub fn entries(&self) -> Vec<RiskItem> {
        self.lock().store.entries().to_vec()
    }

    pub fn session_tier(&self) -> SessionTier {
        self.lock().tier
    }

    pub fn set_session_tier(&self, tier: SessionTier) {
        self.lock().tier = tier;
    }

    /// Open slots for the current session; `None` when unbounded.
    pub fn remaining_slots(&self) -> Option<usize> {
        let state = self.lock();
        self.quota.remaining(state.store.len(), state.tier)
    }

    pub fn save_status(&self) -> Option<SaveStatus> {
        self.persistence.as_ref().map(PersistenceHandle::status)
    }

    fn add_draft(&self, draft: RiskDraft) -> Result<RiskItem, AssessmentServiceError> {
        let mut state = self.lock();
        let (store, item) = state.store.add_one(draft, &self.quota, state.tier)?;
        self.commit_store(&mut state, store);
        Ok(item)
    }

    /// Direct form submission; defaults to the manual category.
    pub fn add_manual(&self, draft: RiskDraft) -> Result<RiskItem, AssessmentServiceError> {
        self.add_draft(draft)
    }

    pub fn add_from_personal_library(
        &self,
        mut draft: RiskDraft,
    ) -> Result<RiskItem, AssessmentServiceError> {
        draft.category_code = CategoryCode::personal_library();
        draft.risk_no = None;
        self.add_draft(draft)
    }

    /// Adds one template item from the catalog.
    pub fn quick_add(
        &self,
        code: &CategoryCode,
        index: usize,
    ) -> Result<RiskItem, AssessmentServiceError> {
        let category = self
            .library
            .find_category(code)
            .ok_or_else(|| AssessmentServiceError::UnknownCategory(code.clone()))?;
        let draft = reconciler::drafts_from_category(category)
            .into_iter()
            .nth(index)
            .ok_or_else(|| AssessmentServiceError::UnknownTemplate {
                code: code.clone(),
                index,
            })?;
        self.add_draft(draft)
    }

    /// Adds every template of a category not already present.
    pub fn bulk_add_category(
        &self,
        code: &CategoryCode,
    ) -> Result<BatchReport, AssessmentServiceError> {
        let category = self
            .library
            .find_category(code)
            .ok_or_else(|| AssessmentServiceError::UnknownCategory(code.clone()))?;
        let drafts = reconciler::drafts_from_category(category);

        let mut state = self.lock();
        let (store, report) = state.store.add_many(drafts, &self.quota, state.tier)?;
        if !report.added.is_empty() {
            self.commit_store(&mut state, store);
        }
        Ok(report)
    }

    pub fn remove(&self, id: RiskId) -> Option<RiskItem> {
        let mut state = self.lock();
        let (store, removed) = state.store.remove(id);
        if removed.is_some() {
            self.commit_store(&mut state, store);
        }
        removed
    }

    pub fn remove_category(&self, code: &CategoryCode) -> CategoryRemoval {
        let mut state = self.lock();
        let (store, outcome) = state.store.remove_by_category(code);
        if let CategoryRemoval::Removed { count } = outcome {
            info!(%code, count, "category entries removed");
            self.commit_store(&mut state, store);
        }
        outcome
    }

    /// First call arms, a second call within the window wipes the store.
    pub fn request_clear(&self) -> ClearOutcome {
        let mut state = self.lock();
        match state.clear.request(Utc::now(), self.clear_window) {
            ClearStep::Armed { expires_at } => ClearOutcome::Armed { expires_at },
            ClearStep::Confirmed => {
                let (store, removed) = state.store.clear_all_confirmed();
                state.store = store;
                state.preview = None;
                self.persist(&state);
                warn!(removed, "assessment cleared");
                ClearOutcome::Cleared { removed }
            }
        }
    }

    pub fn update_coefficient(
        &self,
        id: RiskId,
        field: CoefficientField,
        raw_value: &str,
    ) -> Result<RiskItem, AssessmentServiceError> {
        let mut state = self.lock();
        let (store, item) = state.store.update_coefficient(id, field, raw_value)?;
        self.commit_store(&mut state, store);
        Ok(item)
    }

    /// Field-exit hook; must run whenever a coefficient input loses focus.
    pub fn finalize_coefficient(
        &self,
        id: RiskId,
        field: CoefficientField,
    ) -> Result<RiskItem, AssessmentServiceError> {
        let mut state = self.lock();
        let (store, item) = state.store.finalize_coefficient(id, field)?;
        self.commit_store(&mut state, store);
        Ok(item)
    }

    pub fn update_text(
        &self,
        id: RiskId,
        field: TextField,
        value: String,
    ) -> Result<RiskItem, AssessmentServiceError> {
        let mut state = self.lock();
        let (store, item) = state.store.update_text(id, field, value)?;
        self.commit_store(&mut state, store);
        Ok(item)
    }

    pub fn set_image(
        &self,
        id: RiskId,
        image: Option<String>,
    ) -> Result<RiskItem, AssessmentServiceError> {
        let mut state = self.lock();
        let (store, item) = state.store.set_image(id, image)?;
        self.commit_store(&mut state, store);
        Ok(item)
    }

    pub fn update_header(&self, header: HeaderMetadata) {
        let mut state = self.lock();
        state.header = header;
        self.persist(&state);
    }

    pub fn header(&self) -> HeaderMetadata {
        self.lock().header.clone()
    }

    pub fn filter_by_severity(&self, tier: SeverityTier) -> Vec<RiskItem> {
        self.lock()
            .store
            .filter_by_severity(tier)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Queries the provider and keeps the resulting preview as the pending one.
    pub async fn search(&self, query: &str, tier: SeverityTier) -> SearchOutcome {
        let existing = self.entries();
        let outcome = self.reconciler.search(query, tier, &existing).await;

        let mut state = self.lock();
        state.preview = match &outcome {
            SearchOutcome::Preview(preview) => Some(preview.clone()),
            _ => None,
        };
        outcome
    }

    pub fn pending_preview(&self) -> Option<PreviewSet> {
        self.lock().preview.clone()
    }

    pub fn toggle_candidate(&self, id: PreviewId) -> Result<bool, AssessmentServiceError> {
        let mut state = self.lock();
        let preview = state
            .preview
            .as_mut()
            .ok_or(AssessmentServiceError::NoPendingPreview)?;
        preview
            .toggle(id)
            .ok_or(AssessmentServiceError::UnknownCandidate(id))
    }

    pub fn cancel_preview(&self) -> bool {
        self.lock().preview.take().is_some()
    }

    /// Commits the selected candidates. On failure the preview stays pending
    /// so the user can adjust the selection and retry.
    pub fn commit_preview(
        &self,
        selected: Option<&[PreviewId]>,
    ) -> Result<BatchReport, AssessmentServiceError> {
        let mut state = self.lock();
        let preview = state
            .preview
            .clone()
            .ok_or(AssessmentServiceError::NoPendingPreview)?;

        let (store, report) =
            reconciler::commit(preview, selected, &state.store, &self.quota, state.tier)?;
        state.preview = None;
        if !report.added.is_empty() {
            self.commit_store(&mut state, store);
        }
        Ok(report)
    }

    pub fn report(&self) -> AssessmentReport {
        AssessmentReport::compile(&self.snapshot())
    }
}

fn snapshot_of(state: &AssessmentState) -> AssessmentSnapshot {
    AssessmentSnapshot {
        header: state.header.clone(),
        risks: state.store.entries().to_vec(),
        next_id: state.store.next_id(),
    }
}

/// Error raised by the assessment service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("category {0} is not in the catalog")]
    UnknownCategory(CategoryCode),
    #[error("category {code} has no template #{index}")]
    UnknownTemplate { code: CategoryCode, index: usize },
    #[error("no suggestion preview is pending")]
    NoPendingPreview,
    #[error("candidate {0} is not part of the pending preview")]
    UnknownCandidate(PreviewId),
}

impl AssessmentServiceError {
    /// True when the only way forward is a premium session.
    pub fn upgrade_required(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::QuotaExceeded { .. })
                | Self::Reconcile(ReconcileError::QuotaExceeded { .. })
                | Self::Reconcile(ReconcileError::Store(StoreError::QuotaExceeded { .. }))
        )
    }

    /// Slots still open when the request was too large but not hopeless.
    pub fn remaining_slots(&self) -> Option<usize> {
        match self {
            Self::Store(StoreError::PartialQuota { remaining, .. })
            | Self::Reconcile(ReconcileError::PartialQuota { remaining, .. })
            | Self::Reconcile(ReconcileError::Store(StoreError::PartialQuota { remaining, .. })) => {
                Some(*remaining)
            }
            _ => None,
        }
    }
}
