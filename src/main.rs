use axum::{routing::get_service, Router};
use std::{path::Path, sync::Arc};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{MemoryStore, SessionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hallpass::api::middleware::session::{
    create_postgres_session_store, create_session_layer, AppState,
};
use hallpass::config::Config;
use hallpass::db::{self, MemoryPassStore, PgPassStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hallpass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Hall Pass server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        google_sign_in = config.google.is_some(),
        teacher_match = ?config.school.teacher_match,
        "Configuration loaded successfully"
    );

    let secure_cookies = config.base_url.starts_with("https://");
    let bind_addr = format!("{}:{}", config.host, config.port);

    let app = match config.database_url.clone() {
        Some(database_url) => {
            let pool = db::create_pool(&database_url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations completed");

            let store = PgPassStore::connect(pool.clone()).await?;
            let _listener = store.spawn_listener();

            let session_store = create_postgres_session_store(pool).await?;
            build_app(AppState::new(store, config), session_store, secure_cookies)
        }
        None => {
            tracing::warn!("No database_url configured; passes are kept in memory only");
            let store = Arc::new(MemoryPassStore::new());
            build_app(
                AppState::new(store, config),
                MemoryStore::default(),
                secure_cookies,
            )
        }
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_app<S: SessionStore + Clone>(state: AppState, session_store: S, secure: bool) -> Router {
    // Serve static assets from web/static
    let static_routes = Router::new().nest_service(
        "/static",
        get_service(ServeDir::new(Path::new("web").join("static"))),
    );

    hallpass::api::router()
        .merge(static_routes)
        .layer(create_session_layer(session_store, secure))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
