// src/server.rs - Bootstrap: wire the printer, scheduler and HTTP listener
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::printer::Printer;
use crate::scheduler::Scheduler;
use crate::web::api::{AppStateInner, create_router};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(
        "could not listen on {address}: {source}. Ports below 1024 need elevated privileges, \
         and on Windows the World Wide Web Publishing Service may already hold port 80"
    )]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind the configured address. Failure here is the emulator's only fatal
/// error; there is no retry and no fallback port.
pub async fn bind(config: &Config) -> Result<TcpListener, ServerError> {
    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind { address, source })
}

/// Run the emulator on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, config: Config, seed: Option<u64>) -> Result<(), ServerError> {
    let printer = match seed {
        Some(seed) => Printer::with_seed(config.thermal.clone(), seed),
        None => Printer::new(config.thermal.clone()),
    };
    let (scheduler, scheduler_task) = Scheduler::spawn(printer.clone(), config.protocol.command_delay());
    tracing::info!("Command latency: {:?}", scheduler.delay());
    let app = create_router(AppStateInner::new(printer.clone(), scheduler, config.upload.clone()));

    tracing::info!("Starting fake printer on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    printer.shutdown().await;
    if let Err(e) = scheduler_task.await {
        tracing::error!("Scheduler task failed: {}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
