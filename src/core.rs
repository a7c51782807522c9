//! Wiring and lifecycle: bring up the store, vault, LLM client, narrator,
//! scheduler and HTTP server, then tear them down in reverse on SIGINT or
//! SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::api::{build_router, AppState};
use crate::config::Config;
use crate::db::Store;
use crate::llm::OllamaClient;
use crate::narrator::pipeline::OllamaJournalLlm;
use crate::narrator::types::NarrationConfig;
use crate::narrator::Narrator;
use crate::scheduler::Scheduler;
use crate::vault::Vault;

const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

pub async fn run(config: Config) -> anyhow::Result<()> {
    let timezone = config.tz();
    let actors = config.actors();
    info!(actors = ?actors, timezone = %config.timezone, "Starting braind");

    // 1. Durable store
    let store = Arc::new(Store::open(&config.db_path).await?);
    info!(path = %config.db_path, "Store opened");

    // 2. Vault
    let vault = Arc::new(Vault::new(&config.vault_path));

    // 3. LLM client, with a warn-only startup probe
    let llm = Arc::new(OllamaClient::new(
        &config.ollama_url,
        &config.ollama_model,
        &config.ollama_model_heavy,
    )?);
    match tokio::time::timeout(Duration::from_secs(10), llm.health_check()).await {
        Ok(Ok(())) => info!(
            url = %config.ollama_url,
            light = %config.ollama_model,
            heavy = %config.ollama_model_heavy,
            "Ollama connected"
        ),
        Ok(Err(e)) => warn!("Ollama health check failed, LLM features may not work: {}", e),
        Err(_) => warn!("Ollama health check timed out, LLM features may not work"),
    }

    // 4. Narrator
    let narrator_llm = Arc::new(OllamaJournalLlm::new(llm.clone()));
    let narration_config = NarrationConfig::new(
        &config.vault_path,
        timezone,
        &config.ollama_model_heavy,
    );
    let narrator = Arc::new(Narrator::new(narrator_llm, narration_config)?);

    // 5. Shared state + scheduler
    let port = config.port;
    let state = Arc::new(AppState::new(
        config,
        store.clone(),
        vault.clone(),
        llm.clone(),
        narrator.clone(),
    ));

    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        vault,
        llm,
        narrator,
        timezone,
        actors,
    ));
    let _ = state.scheduler.set(scheduler.clone());
    let scheduler_handle = scheduler.spawn();

    // 6. HTTP server
    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Listening");

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = drain_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    // HTTP gets the drain window, then the scheduler stops, then the pool
    // closes.
    info!(drain = ?SHUTDOWN_DRAIN, "Shutting down gracefully");
    let _ = drain_tx.send(());
    match tokio::time::timeout(SHUTDOWN_DRAIN, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("HTTP server shutdown error: {}", e),
        Ok(Err(e)) => warn!("HTTP server task error: {}", e),
        Err(_) => warn!("HTTP drain window elapsed with requests in flight"),
    }

    info!("Stopping scheduler");
    scheduler_handle.stop();

    info!("Closing store");
    store.close().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
