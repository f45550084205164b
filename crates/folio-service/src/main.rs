use diesel::Connection;
use diesel::sqlite::SqliteConnection;
use folio_service::{
    DefaultAppState, config::Config, repositories::sqlite::run_migrations, routes::create_router,
};
use std::future::IntoFuture;
use std::sync::{Arc, Mutex};
use tokio::{signal, sync::Notify};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio_service=debug".parse().expect("static directive")),
        )
        .init();

    let config = Config::from_env().unwrap_or_else(|err| {
        error!(error = %err, "Invalid configuration");
        std::process::exit(1);
    });
    info!(?config, "Loaded configuration");

    let mut connection =
        SqliteConnection::establish(&config.database_url).unwrap_or_else(|err| {
            error!(database_url = %config.database_url, error = %err, "Failed to connect to database");
            std::process::exit(1);
        });

    if let Err(err) = run_migrations(&mut connection) {
        error!(error = %err, "Failed to migrate database");
        std::process::exit(1);
    }

    info!(database_url = %config.database_url, "Connected to database");

    let app_state = DefaultAppState::from_connection(Arc::new(Mutex::new(connection)), &config);

    let app = create_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|err| {
            error!(bind_address = %config.bind_addr, error = %err, "Failed to bind to address");
            std::process::exit(1);
        });

    info!(bind_address = %config.bind_addr, "Server running");

    let shutdown_started = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown_started = shutdown_started.clone();
        async move {
            shutdown_signal().await;
            shutdown_started.notify_one();
        }
    });

    // In-flight requests get the grace period once shutdown begins.
    let grace_period = config.graceful_shutdown_timeout;
    let deadline = async {
        shutdown_started.notified().await;
        tokio::time::sleep(grace_period).await;
    };

    tokio::select! {
        result = server.into_future() => {
            if let Err(err) = result {
                error!(error = %err, "Server error");
                std::process::exit(1);
            }
            info!("Graceful shutdown completed - all requests finished");
        }
        _ = deadline => {
            error!(timeout = ?grace_period, "Graceful shutdown timed out");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown");
}
