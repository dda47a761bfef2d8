use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{CategoryCode, CoefficientField, HeaderMetadata, RiskDraft, RiskId, TextField};
use super::quota::SessionTier;
use super::reconciler::provider::SuggestionProvider;
use super::reconciler::{PreviewId, ReconcileError, SearchOutcome};
use super::scoring::{FineKinneyScale, SeverityTier};
use super::service::{AssessmentService, AssessmentServiceError, ClearOutcome};
use super::store::StoreError;

type SharedService<P> = State<Arc<AssessmentService<P>>>;

/// Router builder exposing the assessment engine over HTTP.
pub fn assessment_router<P>(service: Arc<AssessmentService<P>>) -> Router
where
    P: SuggestionProvider + 'static,
{
    Router::new()
        .route(
            "/api/v1/assessment/risks",
            get(list_handler::<P>).post(add_manual_handler::<P>),
        )
        .route(
            "/api/v1/assessment/risks/personal",
            post(add_personal_handler::<P>),
        )
        .route(
            "/api/v1/assessment/risks/:id",
            delete(remove_handler::<P>),
        )
        .route(
            "/api/v1/assessment/risks/:id/coefficients",
            patch(update_coefficient_handler::<P>),
        )
        .route(
            "/api/v1/assessment/risks/:id/coefficients/:field/finalize",
            post(finalize_coefficient_handler::<P>),
        )
        .route(
            "/api/v1/assessment/risks/:id/text",
            patch(update_text_handler::<P>),
        )
        .route(
            "/api/v1/assessment/risks/:id/image",
            put(set_image_handler::<P>),
        )
        .route(
            "/api/v1/assessment/categories",
            get(categories_handler::<P>),
        )
        .route(
            "/api/v1/assessment/categories/:code/items/:index",
            post(quick_add_handler::<P>),
        )
        .route(
            "/api/v1/assessment/categories/:code/bulk",
            post(bulk_add_handler::<P>),
        )
        .route(
            "/api/v1/assessment/categories/:code/risks",
            delete(remove_category_handler::<P>),
        )
        .route("/api/v1/assessment/clear", post(clear_handler::<P>))
        .route("/api/v1/assessment/search", post(search_handler::<P>))
        .route(
            "/api/v1/assessment/preview",
            get(preview_handler::<P>).delete(cancel_preview_handler::<P>),
        )
        .route(
            "/api/v1/assessment/preview/:preview_id/toggle",
            post(toggle_candidate_handler::<P>),
        )
        .route(
            "/api/v1/assessment/preview/commit",
            post(commit_handler::<P>),
        )
        .route(
            "/api/v1/assessment/header",
            get(header_handler::<P>).put(update_header_handler::<P>),
        )
        .route("/api/v1/assessment/session", put(session_handler::<P>))
        .route("/api/v1/assessment/quota", get(quota_handler::<P>))
        .route("/api/v1/assessment/report", get(report_handler::<P>))
        .route(
            "/api/v1/assessment/persistence",
            get(persistence_handler::<P>),
        )
        .route("/api/v1/assessment/scale", get(scale_handler))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TierQuery {
    #[serde(default)]
    tier: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoefficientUpdate {
    field: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextUpdate {
    field: TextField,
    value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageUpdate {
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequest {
    query: String,
    #[serde(default)]
    tier: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CommitRequest {
    #[serde(default)]
    selected: Option<Vec<PreviewId>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionUpdate {
    tier: SessionTier,
}

fn parse_tier(raw: Option<u32>) -> Result<SeverityTier, Response> {
    SeverityTier::try_from(raw.unwrap_or(0)).map_err(|error| {
        let payload = json!({ "error": error.to_string() });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

pub(crate) fn error_response(error: AssessmentServiceError) -> Response {
    let message = error.to_string();

    if error.upgrade_required() {
        let payload = json!({ "error": message, "upgrade_required": true });
        return (StatusCode::PAYMENT_REQUIRED, Json(payload)).into_response();
    }
    if let Some(remaining) = error.remaining_slots() {
        let payload = json!({ "error": message, "remaining": remaining });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }

    let status = match error {
        AssessmentServiceError::Store(StoreError::DuplicateEntry { .. })
        | AssessmentServiceError::Reconcile(ReconcileError::Store(
            StoreError::DuplicateEntry { .. },
        )) => StatusCode::CONFLICT,
        AssessmentServiceError::Reconcile(ReconcileError::NoSelection) => StatusCode::BAD_REQUEST,
        AssessmentServiceError::Store(StoreError::NotFound(_))
        | AssessmentServiceError::Reconcile(ReconcileError::Store(StoreError::NotFound(_)))
        | AssessmentServiceError::UnknownCategory(_)
        | AssessmentServiceError::UnknownTemplate { .. }
        | AssessmentServiceError::NoPendingPreview
        | AssessmentServiceError::UnknownCandidate(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": message }))).into_response()
}

pub(crate) async fn list_handler<P>(
    State(service): SharedService<P>,
    Query(query): Query<TierQuery>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match parse_tier(query.tier) {
        Ok(tier) => Json(service.filter_by_severity(tier)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn add_manual_handler<P>(
    State(service): SharedService<P>,
    Json(draft): Json<RiskDraft>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.add_manual(draft) {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn add_personal_handler<P>(
    State(service): SharedService<P>,
    Json(draft): Json<RiskDraft>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.add_from_personal_library(draft) {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_handler<P>(
    State(service): SharedService<P>,
    Path(id): Path<u64>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    let removed = service.remove(RiskId(id));
    Json(json!({ "removed": removed.is_some() })).into_response()
}

pub(crate) async fn update_coefficient_handler<P>(
    State(service): SharedService<P>,
    Path(id): Path<u64>,
    Json(update): Json<CoefficientUpdate>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    let Some(field) = CoefficientField::parse(&update.field) else {
        let payload = json!({ "error": format!("unknown coefficient '{}'", update.field) });
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    };
    match service.update_coefficient(RiskId(id), field, &update.value) {
        Ok(item) => Json(item).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn finalize_coefficient_handler<P>(
    State(service): SharedService<P>,
    Path((id, field)): Path<(u64, String)>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    let Some(field) = CoefficientField::parse(&field) else {
        let payload = json!({ "error": format!("unknown coefficient '{field}'") });
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    };
    match service.finalize_coefficient(RiskId(id), field) {
        Ok(item) => Json(item).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_text_handler<P>(
    State(service): SharedService<P>,
    Path(id): Path<u64>,
    Json(update): Json<TextUpdate>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.update_text(RiskId(id), update.field, update.value) {
        Ok(item) => Json(item).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn set_image_handler<P>(
    State(service): SharedService<P>,
    Path(id): Path<u64>,
    Json(update): Json<ImageUpdate>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.set_image(RiskId(id), update.image) {
        Ok(item) => Json(item).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn categories_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    Json(service.library().list_categories()).into_response()
}

pub(crate) async fn quick_add_handler<P>(
    State(service): SharedService<P>,
    Path((code, index)): Path<(String, usize)>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.quick_add(&CategoryCode::new(code), index) {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bulk_add_handler<P>(
    State(service): SharedService<P>,
    Path(code): Path<String>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.bulk_add_category(&CategoryCode::new(code)) {
        Ok(report) if report.added.is_empty() => {
            let payload = json!({
                "added": [],
                "skipped_duplicates": report.skipped_duplicates,
                "message": "all templates of this category are already present",
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_category_handler<P>(
    State(service): SharedService<P>,
    Path(code): Path<String>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    Json(service.remove_category(&CategoryCode::new(code))).into_response()
}

pub(crate) async fn clear_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    let outcome = service.request_clear();
    let status = match outcome {
        ClearOutcome::Armed { .. } => StatusCode::ACCEPTED,
        ClearOutcome::Cleared { .. } => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}

pub(crate) async fn search_handler<P>(
    State(service): SharedService<P>,
    Json(request): Json<SearchRequest>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    let tier = match parse_tier(request.tier) {
        Ok(tier) => tier,
        Err(response) => return response,
    };
    let outcome = service.search(&request.query, tier).await;
    let status = match outcome {
        SearchOutcome::Preview(_) | SearchOutcome::NoEligibleResults { .. } => StatusCode::OK,
        SearchOutcome::ProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(outcome)).into_response()
}

pub(crate) async fn preview_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.pending_preview() {
        Some(preview) => Json(preview).into_response(),
        None => error_response(AssessmentServiceError::NoPendingPreview),
    }
}

pub(crate) async fn cancel_preview_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    Json(json!({ "cancelled": service.cancel_preview() })).into_response()
}

pub(crate) async fn toggle_candidate_handler<P>(
    State(service): SharedService<P>,
    Path(preview_id): Path<u32>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.toggle_candidate(PreviewId(preview_id)) {
        Ok(selected) => Json(json!({ "preview_id": preview_id, "selected": selected }))
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn commit_handler<P>(
    State(service): SharedService<P>,
    Json(request): Json<CommitRequest>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.commit_preview(request.selected.as_deref()) {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn header_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    Json(service.header()).into_response()
}

pub(crate) async fn update_header_handler<P>(
    State(service): SharedService<P>,
    Json(header): Json<HeaderMetadata>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    service.update_header(header);
    Json(service.header()).into_response()
}

pub(crate) async fn session_handler<P>(
    State(service): SharedService<P>,
    Json(update): Json<SessionUpdate>,
) -> Response
where
    P: SuggestionProvider + 'static,
{
    service.set_session_tier(update.tier);
    Json(json!({ "tier": update.tier, "remaining": service.remaining_slots() })).into_response()
}

pub(crate) async fn quota_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    Json(json!({
        "tier": service.session_tier(),
        "limit": service.quota().limit(),
        "remaining": service.remaining_slots(),
    }))
    .into_response()
}

pub(crate) async fn report_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    Json(service.report()).into_response()
}

pub(crate) async fn persistence_handler<P>(State(service): SharedService<P>) -> Response
where
    P: SuggestionProvider + 'static,
{
    match service.save_status() {
        Some(status) => Json(status).into_response(),
        None => Json(json!({ "status": "disabled" })).into_response(),
    }
}

pub(crate) async fn scale_handler() -> Response {
    Json(FineKinneyScale::STANDARD).into_response()
}

