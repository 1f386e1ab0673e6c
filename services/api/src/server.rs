use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryProjectRepository};
use crate::routes::with_project_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use campus_gig::config::AppConfig;
use campus_gig::error::AppError;
use campus_gig::telemetry;
use campus_gig::workflows::projects::ProjectService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(roster) = args.roster.take() {
        config.roster_csv = Some(roster);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryProjectRepository::default());
    if let Some(roster) = config.roster_csv.as_deref() {
        repository.seed_roster(roster)?;
    }
    let project_service = Arc::new(ProjectService::new(repository));

    let app = with_project_routes(project_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(%addr, roster = ?config.roster_csv, "campus project service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
