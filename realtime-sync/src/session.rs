use std::{fmt::Debug, sync::Arc};

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{select, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    broker::{Attachment, Broker, ConnectionId, Subscription},
    dispatch::{DispatchResult, Dispatcher},
    error::BrokerError,
    message::render_error,
};

/// A frame received from the client, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// A frame the protocol has no use for, such as binary data.
    Unsupported(&'static str),
}

/// One client connection: an inbound loop feeding the dispatcher and an
/// outbound task draining the connection's queue into any `Sink<String>`.
pub struct Session {
    broker: Arc<Broker>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        broker: Arc<Broker>,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            broker,
            dispatcher,
            cancel,
        }
    }

    /// Runs until the client goes away, delivery to it fails, or the session
    /// is cancelled. The connection is detached from the broker on every exit
    /// path and any undelivered output is discarded.
    pub async fn run<R, W>(self, inbound: R, outbound: W) -> Result<ConnectionId, BrokerError>
    where
        R: Stream<Item = Inbound> + Unpin,
        W: Sink<String> + Send + Unpin + 'static,
        W::Error: Debug,
    {
        let Session {
            broker,
            dispatcher,
            cancel,
        } = self;

        let id = broker.next_id();
        let subscription = broker.attach(id)?;
        let attachment = Attachment::new(Arc::clone(&broker), id);
        info!(connection = %id, "session started");

        let mut delivery = tokio::spawn(deliver(subscription, outbound));
        receive(&broker, &dispatcher, id, inbound, &cancel, &mut delivery).await;

        delivery.abort();
        drop(attachment);
        info!(connection = %id, "session ended");
        Ok(id)
    }
}

async fn receive<R>(
    broker: &Broker,
    dispatcher: &Dispatcher,
    id: ConnectionId,
    mut inbound: R,
    cancel: &CancellationToken,
    delivery: &mut JoinHandle<()>,
) where
    R: Stream<Item = Inbound> + Unpin,
{
    loop {
        select! {
            _ = cancel.cancelled() => {
                debug!(connection = %id, "session cancelled");
                break;
            }
            _ = &mut *delivery => {
                debug!(connection = %id, "outbound side closed");
                break;
            }
            frame = inbound.next() => match frame {
                // Dispatch runs outside the select, so cancellation never
                // interrupts a message halfway through.
                Some(Inbound::Text(raw)) => {
                    let result = dispatcher.dispatch(id, &raw).await;
                    publish(broker, id, result);
                }
                Some(Inbound::Unsupported(reason)) => {
                    broker.publish_to(id, render_error(reason));
                }
                None => {
                    debug!(connection = %id, "client closed the connection");
                    break;
                }
            },
        }
    }
}

fn publish(broker: &Broker, origin: ConnectionId, result: DispatchResult) {
    if result.broadcast {
        let delivered = broker.publish_all(result.body);
        debug!(connection = %origin, delivered, "resync broadcast");
    } else {
        broker.publish_to(origin, result.body);
    }
}

async fn deliver<W>(mut subscription: Subscription, mut outbound: W)
where
    W: Sink<String> + Unpin,
    W::Error: Debug,
{
    while let Some(body) = subscription.next().await {
        if let Err(err) = outbound.send(body).await {
            debug!(connection = %subscription.id(), ?err, "failed to deliver message to client");
            return;
        }
    }
}
