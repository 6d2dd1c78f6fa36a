//! Delivery of server-initiated messages to application subscribers.
//!
//! The command channel interleaves responses with events; everything the
//! correlator does not claim lands here. The reader channel only ever
//! carries `ReaderMessageEvent`. Subscribers receive events through
//! unbounded streams, so a slow consumer can never stall a channel worker;
//! parse failures are logged and the event is dropped, never surfaced to a
//! command caller.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::{
    channel::MessageHandler,
    correlator::Correlator,
    protocol::{
        decode_frame, EventAck, Incoming, PaymentOutcome, ReaderMessage, ServerEvent,
        METHOD_READER_MESSAGE, METHOD_TRANSACTION_COMPLETE,
    },
    transport::Transport,
};

/// Stream of events delivered to one subscriber.
pub type EventStream<T> = mpsc::UnboundedReceiver<T>;

/// Fan-out list of subscriber sinks. Dropped receivers are pruned on the
/// next broadcast.
pub(crate) struct EventSinks<T> {
    sinks: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> EventSinks<T> {
    pub(crate) fn new() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn subscribe(&self) -> EventStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sinks.lock().await.push(tx);
        rx
    }

    pub(crate) async fn broadcast(&self, value: T) {
        let mut sinks = self.sinks.lock().await;
        sinks.retain(|tx| tx.send(value.clone()).is_ok());
    }
}

/// Handles everything received on the command channel: responses go to the
/// correlator, events are acknowledged and fanned out.
pub(crate) struct CommandChannelHandler {
    pub(crate) transport: Arc<Transport>,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) transactions: Arc<EventSinks<PaymentOutcome>>,
}

impl MessageHandler for CommandChannelHandler {
    async fn on_frame(&self, frame: Vec<u8>) {
        debug!(payload = %String::from_utf8_lossy(&frame), "received data from kiosk");

        let incoming = match decode_frame(&frame) {
            Ok(incoming) => incoming,
            Err(err) => {
                warn!(%err, "dropping unparseable message from kiosk");
                return;
            }
        };

        match incoming {
            Incoming::Response(response) => {
                // Unclaimed responses are late replies to a call that has
                // already timed out, or stray ids; both are dropped.
                if let Some(response) = self.correlator.complete(response).await {
                    warn!(id = response.id, "unexpected message received from kiosk");
                }
            }
            Incoming::Event(event) => self.dispatch(event).await,
        }
    }
}

impl CommandChannelHandler {
    async fn dispatch(&self, event: ServerEvent) {
        if event.method != METHOD_TRANSACTION_COMPLETE {
            warn!(method = %event.method, "unexpected message received from kiosk");
            return;
        }

        let Some(id) = event.id else {
            warn!("TransactionComplete event carries no numeric id, dropping");
            return;
        };

        let params = event.params.unwrap_or(Value::Null);
        let outcome = match PaymentOutcome::from_event_params(params) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, "dropping malformed TransactionComplete event");
                return;
            }
        };

        // The kiosk expects the acknowledgement before anything else.
        if let Ok(ack) = serde_json::to_vec(&EventAck::new(id)) {
            if let Err(err) = self.transport.send(&ack).await {
                warn!(%err, "failed to acknowledge TransactionComplete event");
            }
        }

        self.transactions.broadcast(outcome).await;
    }
}

/// Handles the reader-event channel, which only carries display updates
/// and never needs a reply.
pub(crate) struct ReaderChannelHandler {
    pub(crate) messages: Arc<EventSinks<ReaderMessage>>,
}

impl MessageHandler for ReaderChannelHandler {
    async fn on_frame(&self, frame: Vec<u8>) {
        debug!(payload = %String::from_utf8_lossy(&frame), "received event from reader");

        let event = match decode_frame(&frame) {
            Ok(Incoming::Event(event)) => event,
            Ok(Incoming::Response(response)) => {
                warn!(id = response.id, "unexpected response on the reader channel");
                return;
            }
            Err(err) => {
                warn!(%err, "dropping unparseable reader message");
                return;
            }
        };

        if event.method != METHOD_READER_MESSAGE {
            warn!(method = %event.method, "unexpected event on the reader channel");
            return;
        }

        match ReaderMessage::from_event_params(event.params.unwrap_or(Value::Null)) {
            Ok(message) => self.messages.broadcast(message).await,
            Err(err) => warn!(%err, "dropping malformed ReaderMessageEvent"),
        }
    }
}
