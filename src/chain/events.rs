use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Result};
use futures::StreamExt;
use tendermint_rpc::event::EventData;
use tendermint_rpc::query::{EventType, Query};
use tendermint_rpc::{SubscriptionClient, WebSocketClient, WebSocketClientUrl};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, timeout};
use tracing::{error, info, warn};

/// `on_block` height standing in for "a block happened, but we don't know
/// which one" — emitted by the polling fallback. `u64::MAX` is never a real
/// block height, so the Pacing Controller's `on_block(height: u64)` contract
/// doesn't need an `Option`.
pub const POLL_HEIGHT_SENTINEL: u64 = u64::MAX;

const ESTABLISH_TIMEOUT: Duration = Duration::from_secs(30);
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Mode {
    Subscribed = 0,
    Polling = 1,
    Reconnecting = 2,
}

/// Every event that can change [`Mode`], isolated from the async I/O that
/// produces them so the transition table itself is a pure, unit-testable
/// function (mirrors [`crate::seqparser::parse_expected_sequence`]'s
/// isolation from the Submitter's retry loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    EstablishSucceeded,
    EstablishTimedOut,
    EstablishFailed,
    SubscriptionEnded,
}

/// The subscribe loop's transition table: what `Mode` follows a given event.
/// A timed-out or failed establish attempt falls back to polling; a
/// subscription that ends for any reason (error, peer close, inactivity)
/// goes to `Reconnecting` so `poll_ticker` covers the gap until the next
/// establish attempt resolves.
fn next_mode(trigger: Transition) -> Mode {
    match trigger {
        Transition::EstablishSucceeded => Mode::Subscribed,
        Transition::EstablishTimedOut | Transition::EstablishFailed => Mode::Polling,
        Transition::SubscriptionEnded => Mode::Reconnecting,
    }
}

/// Delivers `on_block(height)` ticks to the Pacing Controller over an
/// `mpsc` channel, self-healing around a `tendermint-rpc` WebSocket
/// subscription with a polling fallback (§4.1 Block Event Source).
pub struct BlockEventSource {
    rpc_url: String,
    poll_interval: Duration,
}

impl BlockEventSource {
    pub fn new(rpc_url: String, poll_interval: Duration) -> Self {
        Self {
            rpc_url,
            poll_interval,
        }
    }

    /// Spawns the subscribe/poll/reconnect loop and returns the receiver
    /// half of the channel the Pacing Controller drives off of, plus the two
    /// tasks' `JoinHandle`s so the caller can `abort()` them on shutdown
    /// (§5: both the block-event task and the pacing task are aborted once
    /// the signal fires).
    pub fn spawn(self, shutdown: &broadcast::Sender<()>) -> (mpsc::Receiver<u64>, BlockEventHandles) {
        let (tx, rx) = mpsc::channel(64);
        let mode = Arc::new(AtomicU8::new(Mode::Reconnecting as u8));

        let poll_handle = tokio::spawn(poll_ticker(
            tx.clone(),
            self.poll_interval,
            mode.clone(),
            shutdown.subscribe(),
        ));
        let subscribe_handle =
            tokio::spawn(subscribe_loop(self.rpc_url, tx, mode, shutdown.subscribe()));

        (
            rx,
            BlockEventHandles {
                poll_handle,
                subscribe_handle,
            },
        )
    }
}

/// The `poll_ticker`/`subscribe_loop` task handles a [`BlockEventSource`]
/// spawns. Held by the caller solely so it can abort both on shutdown.
pub struct BlockEventHandles {
    poll_handle: tokio::task::JoinHandle<()>,
    subscribe_handle: tokio::task::JoinHandle<()>,
}

impl BlockEventHandles {
    pub fn abort(&self) {
        self.poll_handle.abort();
        self.subscribe_handle.abort();
    }
}

async fn poll_ticker(
    tx: mpsc::Sender<u64>,
    poll_interval: Duration,
    mode: Arc<AtomicU8>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(poll_interval);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {
                if mode.load(Ordering::Relaxed) != Mode::Subscribed as u8
                    && tx.send(POLL_HEIGHT_SENTINEL).await.is_err()
                {
                    return;
                }
            }
        }
    }
}

async fn subscribe_loop(
    rpc_url: String,
    tx: mpsc::Sender<u64>,
    mode: Arc<AtomicU8>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        if shutdown.try_recv().is_ok() {
            return;
        }

        match timeout(ESTABLISH_TIMEOUT, establish(&rpc_url)).await {
            Ok(Ok((client, driver_handle, mut subscription))) => {
                mode.store(next_mode(Transition::EstablishSucceeded) as u8, Ordering::Relaxed);
                info!(rpc_url = %rpc_url, "block subscription established");

                loop {
                    tokio::select! {
                        _ = shutdown.recv() => {
                            let _ = client.close();
                            driver_handle.abort();
                            return;
                        }
                        next = timeout(INACTIVITY_TIMEOUT, subscription.next()) => {
                            match next {
                                Ok(Some(Ok(event))) => {
                                    if let EventData::NewBlock { block: Some(block), .. } = event.data {
                                        let height = block.header.height.value();
                                        if tx.send(height).await.is_err() {
                                            let _ = client.close();
                                            driver_handle.abort();
                                            return;
                                        }
                                    }
                                }
                                Ok(Some(Err(e))) => {
                                    warn!(error = %e, "block subscription error; reconnecting");
                                    break;
                                }
                                Ok(None) => {
                                    warn!("block subscription closed by peer; reconnecting");
                                    break;
                                }
                                Err(_) => {
                                    warn!(
                                        timeout_secs = INACTIVITY_TIMEOUT.as_secs(),
                                        "no block event received before inactivity timeout; reconnecting"
                                    );
                                    break;
                                }
                            }
                        }
                    }
                }

                mode.store(next_mode(Transition::SubscriptionEnded) as u8, Ordering::Relaxed);
                let _ = client.close();
                driver_handle.abort();
            }
            Ok(Err(e)) => {
                error!(error = %e, "failed to establish block subscription");
                mode.store(next_mode(Transition::EstablishFailed) as u8, Ordering::Relaxed);
                tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
            }
            Err(_) => {
                warn!(
                    timeout_secs = ESTABLISH_TIMEOUT.as_secs(),
                    "timed out establishing block subscription; falling back to polling"
                );
                mode.store(next_mode(Transition::EstablishTimedOut) as u8, Ordering::Relaxed);
                tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
            }
        }
    }
}

async fn establish(
    rpc_url: &str,
) -> Result<(
    WebSocketClient,
    tokio::task::JoinHandle<()>,
    tendermint_rpc::Subscription,
)> {
    let ws_url = to_websocket_scheme(rpc_url);
    let url: WebSocketClientUrl = ws_url
        .parse()
        .map_err(|e| eyre!("invalid websocket url {ws_url}: {e}"))?;
    let (client, driver) = WebSocketClient::new(url)
        .await
        .map_err(|e| eyre!("failed to open websocket: {e}"))?;
    let driver_handle = tokio::spawn(async move {
        if let Err(e) = driver.run().await {
            warn!(error = %e, "websocket driver exited");
        }
    });
    let subscription = client
        .subscribe(Query::from(EventType::NewBlock))
        .await
        .map_err(|e| eyre!("failed to subscribe to NewBlock events: {e}"))?;
    Ok((client, driver_handle, subscription))
}

fn to_websocket_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_https_to_wss() {
        assert_eq!(
            to_websocket_scheme("https://rpc.example.com:26657"),
            "wss://rpc.example.com:26657"
        );
    }

    #[test]
    fn rewrites_http_to_ws() {
        assert_eq!(
            to_websocket_scheme("http://rpc.example.com:26657"),
            "ws://rpc.example.com:26657"
        );
    }

    #[test]
    fn successful_establish_switches_to_subscribed() {
        assert_eq!(next_mode(Transition::EstablishSucceeded), Mode::Subscribed);
    }

    #[test]
    fn establish_timeout_falls_back_to_polling() {
        assert_eq!(next_mode(Transition::EstablishTimedOut), Mode::Polling);
    }

    #[test]
    fn establish_failure_falls_back_to_polling() {
        assert_eq!(next_mode(Transition::EstablishFailed), Mode::Polling);
    }

    #[test]
    fn subscription_ending_for_any_reason_goes_to_reconnecting() {
        assert_eq!(next_mode(Transition::SubscriptionEnded), Mode::Reconnecting);
    }
}
