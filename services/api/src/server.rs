use crate::cli::ServeArgs;
use crate::infra::{build_store, operator_session, AppState};
use crate::routes::with_console_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use matri_admin::config::AppConfig;
use matri_admin::directory::{AdminConsole, FixedSessionProvider};
use matri_admin::error::AppError;
use matri_admin::telemetry;
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
    if let Some(seed) = args.seed.take() {
        config.console.seed_path = Some(seed);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(build_store(config.console.seed_path.as_deref())?);
    let console = Arc::new(AdminConsole::new(store));
    let sessions = Arc::new(FixedSessionProvider::signed_in(operator_session(
        &config.console,
    )));

    let app = with_console_routes(console, sessions)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        operator = %config.console.operator,
        seeded_from = ?config.console.seed_path,
        "admin console ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
