use std::net::SocketAddr;

use catalog_core::{init_tracing, CatalogConfig, LogFormat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CatalogConfig::load("dev")?;
    init_tracing(LogFormat::parse(
        &config.get_or("logging.format", "pretty".to_string()),
    ));

    let host: String = config.get_or("server.host", "0.0.0.0".to_string());
    let port: u16 = config.get_or("server.port", 8080);

    let app = catalog_service::build(&config);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        profile = config.profile(),
        "catalog service listening"
    );

    axum::serve(
        listener,
        app.router
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    app.background.shutdown().await;
    Ok(())
}

/// Wait for Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
