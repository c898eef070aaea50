use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use remixpilot_core_types::{CoreError, RunEvent};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Delivers `event` to current subscribers, returning how many saw it.
    fn publish(&self, event: E) -> Result<usize, CoreError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Fire-and-forget destination for run events.
///
/// Emission never fails the caller and never blocks on slow observers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

impl<T> EventSink for Arc<T>
where
    T: EventSink + ?Sized,
{
    fn emit(&self, event: RunEvent) {
        (**self).emit(event)
    }
}

/// Broadcast bus. Receivers that fall behind observe `Lagged` rather
/// than slowing down publishers.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    fn publish(&self, event: E) -> Result<usize, CoreError> {
        self.sender
            .send(event)
            .map_err(|_| CoreError::new("no subscribers"))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

impl EventSink for InMemoryBus<RunEvent> {
    fn emit(&self, event: RunEvent) {
        // No subscribers is the normal state when nobody is watching.
        if let Err(err) = self.publish(event) {
            tracing::trace!(target: "event-bus", %err, "run event dropped");
        }
    }
}

/// Helper to materialise an mpsc receiver from the bus subscription
/// so callers can await events without handling broadcast semantics directly.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "event-bus", skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}
