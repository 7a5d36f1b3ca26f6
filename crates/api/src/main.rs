use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promptsmith_api::config::Settings;
use promptsmith_api::engine::compare::CompareOrchestrator;
use promptsmith_api::engine::eval::EvalOrchestrator;
use promptsmith_api::engine::generate::GenerationService;
use promptsmith_api::router::build_app_router;
use promptsmith_api::state::AppState;
use promptsmith_openai::Adapters;
use promptsmith_store::Repository;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promptsmith_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let settings = Settings::from_env();
    tracing::info!(
        host = %settings.host,
        port = settings.port,
        data_dir = %settings.data_dir.display(),
        bucket = %settings.storage_bucket,
        "Loaded configuration",
    );

    // --- Storage ---
    let repository = Arc::new(
        Repository::new(settings.repository_config()).expect("Failed to initialize storage"),
    );
    tracing::info!("Storage bootstrapped");

    // --- Adapters ---
    let adapters = Adapters::from_config(settings.openai_config()).expect("Failed to build adapter clients");
    if adapters.offline {
        tracing::warn!("OPENAI_API_KEY is not set; model calls run on deterministic fallbacks");
    }

    // --- Services & state ---
    let settings = Arc::new(settings);
    let state = AppState {
        settings: Arc::clone(&settings),
        repository: Arc::clone(&repository),
        generation: Arc::new(GenerationService::new(Arc::clone(&repository), adapters.clone())),
        compare: Arc::new(CompareOrchestrator::new(Arc::clone(&repository), adapters.clone())),
        eval: Arc::new(EvalOrchestrator::new(repository, adapters)),
    };

    // --- Router & server ---
    let app = build_app_router(state);
    let addr = SocketAddr::new(
        settings.host.parse().expect("Invalid HOST address"),
        settings.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // In-flight eval runs are process-volatile; commits and images already
    // written remain in the repository.
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM so the server shuts down cleanly whether
/// stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
