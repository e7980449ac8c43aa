use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use checkin_server::config::Config;
use checkin_server::db;
use checkin_server::routes::create_routes;
use checkin_server::services::import::seed_if_empty;
use checkin_server::services::TicketRegistry;
use checkin_server::state::AppState;

const DEFAULT_LOG_FILTER: &str = "checkin_server=info,tower_http=info";

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env();

    let pool = db::connect(&config.database_url, config.max_connections)
        .await
        .expect("Failed to open ticket database");

    tracing::info!("Successfully connected to database, migrations applied");

    let registry = TicketRegistry::new(pool.clone());

    match seed_if_empty(&registry, &config.import_path).await {
        Ok(Some(report)) => tracing::info!(
            imported = report.imported,
            skipped = report.skipped,
            "Registry seeded from {}",
            config.import_path.display()
        ),
        Ok(None) => {}
        Err(e) => tracing::error!(error = %e, "Automatic ticket import failed"),
    }

    let state = AppState::new(registry, config.import_path.clone());
    let app = create_routes(state, config.cors_allowed_origins.as_deref());

    let addr = config.socket_addr();
    tracing::info!("🎫 Check-in server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    pool.close().await;
    tracing::info!("Database closed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
