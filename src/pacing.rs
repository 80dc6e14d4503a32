use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::batch::build_batch;
use crate::queue::BroadcastQueue;
use crate::submitter::Submitter;

/// Enforces the "quiet block(s) after submission" policy and drives the
/// drain → build → submit cycle off the Block Event Source's ticks (§4.5
/// Pacing Controller).
///
/// Structurally single-consumer: it's the only task reading `block_rx`, so
/// "at most one Submitter execution in flight" (invariant 3) holds without a
/// lock around the whole cycle.
pub struct PacingController {
    queue: BroadcastQueue,
    submitter: Submitter,
    cooldown_ticks: u32,
}

impl PacingController {
    pub fn new(queue: BroadcastQueue, submitter: Submitter) -> Self {
        Self {
            queue,
            submitter,
            cooldown_ticks: 0,
        }
    }

    pub fn spawn(
        mut self,
        mut block_rx: mpsc::Receiver<u64>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("pacing controller shutting down");
                        return;
                    }
                    maybe_height = block_rx.recv() => {
                        match maybe_height {
                            Some(height) => self.on_block(height).await,
                            None => return,
                        }
                    }
                }
            }
        })
    }

    async fn on_block(&mut self, height: u64) {
        if self.cooldown_ticks > 0 {
            self.cooldown_ticks -= 1;
            return;
        }

        if self.queue.is_empty().await {
            return;
        }

        let drained = self.queue.drain().await;
        let drained_count = drained.len();
        let batch = build_batch(drained);
        let batch_size = batch.entries.len();

        self.submitter.submit(batch).await;
        self.cooldown_ticks = 1;

        info!(
            height,
            drained_count, batch_size, "batch submitted; cooldown armed"
        );
    }
}

