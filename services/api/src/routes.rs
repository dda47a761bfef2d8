use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use risk_assessment::workflows::assessment::{
    assessment_router, classify, score, AssessmentService, CoefficientField, FineKinneyScale,
    RiskLevel, SuggestionProvider,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    pub(crate) probability: u32,
    pub(crate) frequency: u32,
    pub(crate) severity: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreResponse {
    pub(crate) score: u32,
    pub(crate) level: RiskLevel,
    pub(crate) label: &'static str,
    pub(crate) color: &'static str,
    /// Coefficients that are not one of the standard scale grades.
    pub(crate) off_scale: Vec<CoefficientField>,
}

pub(crate) fn with_assessment_routes<P>(service: Arc<AssessmentService<P>>) -> axum::Router
where
    P: SuggestionProvider + 'static,
{
    assessment_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/score", axum::routing::post(score_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Stateless scoring for a single triple; never touches the assessment.
pub(crate) async fn score_endpoint(Json(request): Json<ScoreRequest>) -> Json<ScoreResponse> {
    Json(score_triple(&request))
}

pub(crate) fn score_triple(request: &ScoreRequest) -> ScoreResponse {
    let value = score(request.probability, request.frequency, request.severity);
    let level = classify(value);
    let scale = FineKinneyScale::STANDARD;
    let off_scale = [
        (CoefficientField::Probability, request.probability),
        (CoefficientField::Frequency, request.frequency),
        (CoefficientField::Severity, request.severity),
    ]
    .into_iter()
    .filter(|(field, value)| !scale.options(*field).contains(value))
    .map(|(field, _)| field)
    .collect();

    ScoreResponse {
        score: value,
        level,
        label: level.label(),
        color: level.color_token(),
        off_scale,
    }
}
