use std::{
    collections::HashMap,
    fmt,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::BrokerError;

/// Process-unique identifier of one attached connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Maps each attached connection to an unbounded FIFO queue. Knows nothing
/// about the store or the transport.
pub struct Broker {
    queues: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a fresh queue for `id` and hands back its receiving end.
    pub fn attach(&self, id: ConnectionId) -> Result<Subscription, BrokerError> {
        let mut queues = self.queues.lock();
        if queues.contains_key(&id) {
            return Err(BrokerError::AlreadyAttached(id));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        queues.insert(id, sender);
        debug!(connection = %id, "attached");
        Ok(Subscription { id, receiver })
    }

    /// Drops the queue for `id` together with anything still undelivered.
    ///
    /// Returns `false` when `id` was not attached.
    pub fn detach(&self, id: ConnectionId) -> bool {
        let removed = self.queues.lock().remove(&id).is_some();
        if removed {
            debug!(connection = %id, "detached");
        }
        removed
    }

    /// Queues `body` for one connection. Unknown ids are ignored, since a
    /// connection may detach while a reply to it is in flight.
    pub fn publish_to(&self, id: ConnectionId, body: impl Into<String>) -> bool {
        let sender = self.queues.lock().get(&id).cloned();
        match sender {
            Some(sender) => sender.send(body.into()).is_ok(),
            None => false,
        }
    }

    /// Queues `body` for every attached connection and returns how many
    /// queues accepted it.
    pub fn publish_all(&self, body: impl Into<String>) -> usize {
        let body = body.into();
        // Copy the senders out so the registry lock is not held while enqueueing.
        let senders: Vec<_> = self.queues.lock().values().cloned().collect();
        senders
            .iter()
            .filter(|sender| sender.send(body.clone()).is_ok())
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.queues.lock().len()
    }
}

/// Receiving end of one connection's queue.
///
/// Yields bodies in the order they were published and waits while the queue
/// is empty. The stream ends only once the connection is detached.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    receiver: mpsc::UnboundedReceiver<String>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.receiver.poll_recv(cx)
    }
}

/// Detaches its connection when dropped, including on unwinding paths.
pub struct Attachment {
    broker: Arc<Broker>,
    id: ConnectionId,
}

impl Attachment {
    pub fn new(broker: Arc<Broker>, id: ConnectionId) -> Self {
        Self { broker, id }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.broker.detach(self.id);
    }
}
