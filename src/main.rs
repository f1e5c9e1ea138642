use axum::{
    Router,
    routing::{delete, get, post},
};
use clap::Parser; // for cli
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use dashboard_refresh::gateway::HttpReportFetcher;
use dashboard_refresh::handlers::{
    change_period_handler, dismiss_notifications_handler, display_handler, health_handler,
    metrics_handler, refresh_handler, visibility_handler,
};
use dashboard_refresh::session::FileSessionStore;
use dashboard_refresh::state::AppState;
use dashboard_refresh::ui::{MemoryCharts, MemoryDisplay};
use dashboard_refresh::{Args, Collaborators, DashboardConfig, DashboardController, Error};

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_refresh=info".into()),
        )
        .with_target(true)
        .init();

    // parse cli arguments
    let args = Args::parse();
    let config = DashboardConfig::from(&args);

    let session = Arc::new(FileSessionStore::new(&args.token_file));
    let fetcher = HttpReportFetcher::new(
        &args.backend,
        session.clone(),
        Duration::from_secs(args.request_timeout),
    )?;
    let display = Arc::new(MemoryDisplay::new());
    let charts = Arc::new(MemoryCharts::new());

    let controller = DashboardController::obtain(
        &args.page_id,
        config,
        Collaborators {
            fetcher: Arc::new(fetcher),
            session,
            display: display.clone(),
            charts: charts.clone(),
        },
    );

    let initial = controller.start().await;
    info!(?initial, period = %controller.current_period(), "initial load");

    let state = AppState {
        controller: controller.clone(),
        display,
        charts,
    };

    //creating the router with routes
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/display", get(display_handler))
        .route("/refresh", post(refresh_handler))
        .route("/period/{period}", post(change_period_handler))
        .route("/visibility", post(visibility_handler))
        .route("/notifications", delete(dismiss_notifications_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(port = args.port, backend = %args.backend, "dashboard controller listening");
    info!(
        cache_ttl = args.cache_ttl,
        rate_limit = args.rate_limit,
        rate_window = args.rate_window,
        refresh_interval = args.refresh_interval,
        "refresh policy"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.destroy().await;
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
