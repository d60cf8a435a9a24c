use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::router;
use axum_prometheus::PrometheusMetricLayer;
use member_match::config::AppConfig;
use member_match::error::AppError;
use member_match::telemetry::{self, LogSink};
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

    telemetry::init(&config.telemetry, LogSink::Stdout)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        renewal_window_days: config.renewals.window_days,
    };

    let app = router(app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        window_days = config.renewals.window_days,
        "member reconciliation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
