mod batch;
mod chain;
mod config;
mod error;
mod http;
mod pacing;
mod policy;
mod queue;
mod seqparser;
mod submitter;

use std::sync::Arc;

use eyre::{eyre, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use chain::{BlockEventSource, ChainGateway, Wallet};
use config::FaucetConfig;
use http::AppState;
use pacing::PacingController;
use queue::BroadcastQueue;
use submitter::Submitter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = FaucetConfig::from_env()?;

    let wallet = Wallet::from_secret_key(&cfg.server_sk, &cfg.bech32_hrp)?;
    tracing::info!(
        granter = %wallet.account_id(),
        lcd_url = %cfg.lcd_url,
        rpc_url = %cfg.rpc_url,
        allowance_amount = cfg.allowance_amount,
        "faucet starting"
    );

    let gateway = Arc::new(ChainGateway::new(
        wallet,
        cfg.lcd_url.clone(),
        cfg.rpc_url.clone(),
        &cfg.chain_id,
        cfg.denom.clone(),
        cfg.gas_price,
    )?);

    let queue = BroadcastQueue::new();
    let submitter = Submitter::new(gateway.clone(), queue.clone(), cfg.memo.clone());
    let pacing = PacingController::new(queue.clone(), submitter);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let (block_rx, block_event_handles) =
        BlockEventSource::new(cfg.rpc_url.clone(), cfg.poll_interval).spawn(&shutdown_tx);
    let pacing_handle = pacing.spawn(block_rx, shutdown_tx.subscribe());

    let state = AppState {
        gateway,
        queue,
        config: Arc::new(cfg.clone()),
    };

    let addr = format!("{}:{}", cfg.server_host, cfg.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;

    tracing::info!(%addr, "listening");

    let mut shutdown_rx = shutdown_tx.subscribe();
    let server = axum::serve(listener, http::router(state)).with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        tracing::info!("http server shutting down");
    });
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!(error = %e, "http server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("failed to listen for ctrl-c: {e}"))?;
    tracing::info!("ctrl-c received, shutting down");
    let _ = shutdown_tx.send(());

    let _ = server_handle.await;
    pacing_handle.abort();
    block_event_handles.abort();
    Ok(())
}
