use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::response::Response;
use serde_json::{json, Value};

use crate::config::AssessmentConfig;
use crate::workflows::assessment::domain::{
    AssessmentSnapshot, CategoryCode, Coefficients, RiskDraft, RiskText,
};
use crate::workflows::assessment::library::{Category, CategoryItem, CategoryLibrary};
use crate::workflows::assessment::persistence::{AssessmentStorage, StorageError};
use crate::workflows::assessment::reconciler::normalizer::RawCandidate;
use crate::workflows::assessment::reconciler::provider::{
    ProviderError, SuggestionProvider, SuggestionRequest, SuggestionResponse,
};
use crate::workflows::assessment::service::AssessmentService;

pub(super) fn text(hazard: &str, risk: &str) -> RiskText {
    RiskText {
        source: "Production hall".to_string(),
        hazard: hazard.to_string(),
        risk: risk.to_string(),
        affected: "Operators".to_string(),
        responsible: "Shift supervisor".to_string(),
        measures: "Training and signage".to_string(),
        ..RiskText::default()
    }
}

pub(super) fn draft_in(
    code: &str,
    hazard: &str,
    risk: &str,
    current: (u32, u32, u32),
) -> RiskDraft {
    let mut draft = RiskDraft::new(CategoryCode::new(code), text(hazard, risk));
    draft.current = Coefficients::new(current.0, current.1, current.2);
    draft.target = Coefficients::new(1, current.1, current.2);
    draft
}

pub(super) fn draft(hazard: &str, risk: &str) -> RiskDraft {
    draft_in(CategoryCode::MANUAL, hazard, risk, (3, 6, 7))
}

pub(super) fn numbered_drafts(count: usize) -> Vec<RiskDraft> {
    (0..count)
        .map(|n| draft(&format!("Hazard {n}"), &format!("Risk {n}")))
        .collect()
}

fn item(hazard: &str, risk: &str, current: (u32, u32, u32)) -> CategoryItem {
    CategoryItem {
        text: text(hazard, risk),
        current: Coefficients::new(current.0, current.1, current.2),
        target: Coefficients::new(1, current.1, current.2),
        sector_tags: Vec::new(),
    }
}

pub(super) fn catalog() -> CategoryLibrary {
    CategoryLibrary::new(vec![
        Category {
            code: CategoryCode::new("01"),
            category: "Electrical".to_string(),
            items: vec![
                item("Exposed wiring", "Electric shock", (3, 6, 15)),
                item("Overloaded socket", "Fire", (6, 3, 40)),
                item("Missing earth leakage breaker", "Electrocution", (3, 3, 40)),
                item("Wet hands on switchgear", "Electric shock", (1, 6, 15)),
            ],
        },
        Category {
            code: CategoryCode::new("02"),
            category: "Slips and trips".to_string(),
            items: vec![
                item("Wet floor", "Slip and fall", (6, 6, 3)),
                item("Cables across walkway", "Trip", (3, 6, 3)),
            ],
        },
    ])
}

pub(super) fn raw(hazard: &str, risk: &str, p: u32, f: u32, s: u32) -> RawCandidate {
    RawCandidate::from_value(&json!({
        "hazard": hazard,
        "risk": risk,
        "p": p, "f": f, "s": s,
        "p2": 1, "f2": f, "s2": s,
    }))
    .expect("valid candidate")
}

pub(super) fn raw_in(code: &str, hazard: &str, risk: &str, p: u32, f: u32, s: u32) -> RawCandidate {
    let mut candidate = raw(hazard, risk, p, f, s);
    candidate.category_code = Some(code.to_string());
    candidate
}

pub(super) fn response(results: Vec<RawCandidate>) -> SuggestionResponse {
    SuggestionResponse {
        count: results.len(),
        results,
        method: Some("sector".to_string()),
        ..SuggestionResponse::default()
    }
}

/// Provider returning a canned response and recording every request.
pub(super) struct StaticProvider {
    outcome: Result<SuggestionResponse, String>,
    requests: Mutex<Vec<SuggestionRequest>>,
}

impl StaticProvider {
    pub(super) fn returning(response: SuggestionResponse) -> Self {
        Self {
            outcome: Ok(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn requests(&self) -> Vec<SuggestionRequest> {
        self.requests.lock().expect("request mutex poisoned").clone()
    }
}

impl SuggestionProvider for StaticProvider {
    async fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError> {
        self.requests
            .lock()
            .expect("request mutex poisoned")
            .push(request);
        self.outcome
            .clone()
            .map_err(ProviderError::InvalidResponse)
    }
}

#[derive(Default)]
pub(super) struct MemoryStorage {
    saved: Mutex<Option<AssessmentSnapshot>>,
}

impl MemoryStorage {
    pub(super) fn with(snapshot: AssessmentSnapshot) -> Self {
        Self {
            saved: Mutex::new(Some(snapshot)),
        }
    }

    pub(super) fn saved(&self) -> Option<AssessmentSnapshot> {
        self.saved.lock().expect("storage mutex poisoned").clone()
    }
}

impl AssessmentStorage for MemoryStorage {
    fn save(&self, snapshot: &AssessmentSnapshot) -> Result<(), StorageError> {
        *self.saved.lock().expect("storage mutex poisoned") = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<AssessmentSnapshot>, StorageError> {
        Ok(self.saved())
    }
}

pub(super) fn build_service_with(
    provider: StaticProvider,
) -> (AssessmentService<StaticProvider>, Arc<StaticProvider>) {
    let provider = Arc::new(provider);
    let service = AssessmentService::new(
        Arc::new(catalog()),
        provider.clone(),
        &AssessmentConfig::default(),
        25,
    );
    (service, provider)
}

pub(super) fn build_service() -> AssessmentService<StaticProvider> {
    build_service_with(StaticProvider::returning(SuggestionResponse::default())).0
}

pub(super) fn fill(service: &AssessmentService<StaticProvider>, count: usize) {
    for (n, draft) in numbered_drafts(count).into_iter().enumerate() {
        service
            .add_manual(draft)
            .unwrap_or_else(|err| panic!("entry {n} should fit: {err}"));
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
