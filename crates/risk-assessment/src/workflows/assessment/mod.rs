//! Fine-Kinney risk assessment engine.
//!
//! Entries live in an immutable-snapshot [`RiskEntryStore`]; every change goes
//! through [`AssessmentService`], which serializes mutations, enforces the
//! free-tier quota and queues persistence. Catalog templates and provider
//! suggestions enter through the reconciler.

pub mod clear;
pub mod domain;
pub mod library;
pub mod persistence;
pub mod quota;
pub mod reconciler;
pub mod report;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use clear::{ClearConfirmation, ClearStep};
pub use domain::{
    AssessmentSnapshot, CategoryCode, CoefficientField, Coefficients, HeaderMetadata, Phase,
    PhaseAssessment, RiskDraft, RiskId, RiskItem, RiskText, TextField,
};
pub use library::{CatalogError, Category, CategoryItem, CategoryLibrary};
pub use persistence::{
    AssessmentStorage, JsonFileStorage, PersistenceHandle, SaveStatus, StorageError,
};
pub use quota::{QuotaDecision, QuotaGuard, SessionTier};
pub use reconciler::provider::{
    HttpSuggestionProvider, ProviderError, SuggestionProvider, SuggestionRequest,
    SuggestionResponse,
};
pub use reconciler::{
    Candidate, CandidateReconciler, PreviewId, PreviewSet, ReconcileError, SearchOutcome,
};
pub use report::AssessmentReport;
pub use router::assessment_router;
pub use scoring::{classify, score, FineKinneyScale, RiskLevel, SeverityTier};
pub use service::{AssessmentService, AssessmentServiceError, ClearOutcome};
pub use store::{BatchReport, CategoryRemoval, RiskEntryStore, StoreError};
