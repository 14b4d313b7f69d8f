use monitor_core::SignalEvent;
use tokio::sync::{broadcast, mpsc};

use crate::envelope::Envelope;

/// Build the worker-to-broadcaster hand-off: a cloneable sender for worker
/// tasks and the single-consumer queue drained inside the event loop.
pub fn notification_channel() -> (NotificationSender, NotificationQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, NotificationQueue { rx })
}

/// Handle held by worker tasks. Sends never block; the single consumer on the
/// other side owns all subscriber-socket interaction.
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl NotificationSender {
    pub fn notify_signal(&self, event: &SignalEvent) {
        self.send(Envelope::signal(event));
    }

    pub fn notify_info(&self, message: impl Into<String>) {
        self.send(Envelope::info(message));
    }

    pub fn notify_warning(&self, message: impl Into<String>) {
        self.send(Envelope::warning(message));
    }

    pub fn notify_error(&self, message: impl Into<String>, target_info: Option<&str>) {
        self.send(Envelope::error(message, target_info));
    }

    fn send(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            // Consumer already stopped (shutdown path)
            tracing::warn!("notification queue closed, dropping message");
        }
    }
}

/// Single-consumer side of the bridge.
pub struct NotificationQueue {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl NotificationQueue {
    /// Drain the queue into the broadcast channel until every sender handle
    /// has been dropped, then finish. Messages already queued at shutdown are
    /// still delivered; failures are logged, never raised.
    pub async fn run(mut self, broadcast_tx: broadcast::Sender<String>) {
        while let Some(envelope) = self.rx.recv().await {
            tracing::info!("{}", envelope.message);
            match serde_json::to_string(&envelope) {
                Ok(json) => {
                    // Err means no connected subscribers right now; best-effort.
                    if broadcast_tx.send(json).is_err() {
                        tracing::debug!("no subscribers connected, message not fanned out");
                    }
                }
                Err(e) => tracing::error!("failed to serialize envelope: {e}"),
            }
        }
        tracing::info!("notification queue drained, consumer stopping");
    }
}
