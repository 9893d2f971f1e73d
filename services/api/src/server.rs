use crate::cli::ServeArgs;
use crate::infra::{AppState, DraftSessions, InMemoryDraftRepository};
use crate::routes::with_draft_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use development_wizard::config::AppConfig;
use development_wizard::error::AppError;
use development_wizard::telemetry;
use std::sync::atomic::Ordering;
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

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let quiet_period = config.wizard.autosave_quiet_period;
    let sessions = DraftSessions::new(InMemoryDraftRepository::default(), quiet_period);

    let app = with_draft_routes(sessions)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        quiet_period_ms = quiet_period.as_millis() as u64,
        "development wizard ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
