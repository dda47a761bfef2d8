use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use risk_assessment::config::AppConfig;
use risk_assessment::error::AppError;
use risk_assessment::telemetry;
use risk_assessment::workflows::assessment::{
    AssessmentService, CategoryLibrary, HttpSuggestionProvider, JsonFileStorage,
    PersistenceHandle,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let library = Arc::new(
        CategoryLibrary::load_or_empty(config.assessment.catalog_source.as_deref()).await,
    );
    let provider = Arc::new(HttpSuggestionProvider::new(&config.provider)?);
    if config.provider.endpoint.is_none() {
        warn!("ASSESSMENT_SUGGEST_URL not set; suggestion search will report the provider as unavailable");
    }

    let mut service = AssessmentService::new(
        library,
        provider,
        &config.assessment,
        config.provider.limit,
    );
    if let Some(path) = config.storage.path.clone() {
        let storage = Arc::new(JsonFileStorage::new(path, config.storage.capacity_bytes));
        match service.restore(storage.as_ref()) {
            Ok(true) => info!(path = %storage.path().display(), "saved assessment restored"),
            Ok(false) => info!(path = %storage.path().display(), "no saved assessment found"),
            Err(err) => warn!(%err, "saved assessment could not be restored; starting empty"),
        }
        service = service.with_persistence(PersistenceHandle::spawn(storage));
    }

    let app = with_assessment_routes(Arc::new(service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "risk assessment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
