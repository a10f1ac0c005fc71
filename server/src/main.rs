use server::config::RelayConfig;
use server::routes;
use server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = RelayConfig::from_env();
    let addr = config.socket_addr();
    tracing::info!(
        heartbeat_interval_secs = config.heartbeat_interval.as_secs(),
        heartbeat_timeout_secs = config.heartbeat_timeout.as_secs(),
        session_queue_capacity = config.session_queue_capacity,
        "relay config loaded"
    );

    let state = AppState::new(config);
    let app = routes::app(state.clone());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "sketchboard relay listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    state.teardown().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
