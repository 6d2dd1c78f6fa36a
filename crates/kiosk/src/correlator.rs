//! Request/response rendezvous for the command channel.
//!
//! At most one command is in flight process-wide. The caller parks a fresh
//! oneshot sender keyed by the request id; the command-channel worker fills
//! it when the matching response arrives. Anything that does not match the
//! expected id belongs to the event dispatcher instead.

use std::time::Duration;

use tokio::{
    sync::{oneshot, Mutex},
    time,
};
use tracing::{debug, warn};

use crate::{
    error::KioskError,
    protocol::{RequestId, RpcResponse},
    transport::Transport,
};

struct Pending {
    id: RequestId,
    tx: oneshot::Sender<RpcResponse>,
}

pub(crate) struct Correlator {
    /// Serializes callers of [`Correlator::send_receive`]; commands never
    /// overlap on the wire.
    caller: Mutex<()>,
    slot: Mutex<Option<Pending>>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            caller: Mutex::new(()),
            slot: Mutex::new(None),
        }
    }

    /// Sends one request and waits for the response with the same id.
    pub(crate) async fn send_receive(
        &self,
        transport: &Transport,
        id: RequestId,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<RpcResponse, KioskError> {
        let _guard = self.caller.lock().await;

        let (tx, rx) = oneshot::channel();
        *self.slot.lock().await = Some(Pending { id, tx });

        if let Err(err) = transport.send(payload).await {
            self.slot.lock().await.take();
            return Err(err);
        }

        match time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_closed)) => {
                self.slot.lock().await.take();
                Err(KioskError::ChannelClosed)
            }
            Err(_elapsed) => {
                // Abandon the slot; a late response will be routed to the
                // event dispatcher and dropped there.
                self.slot.lock().await.take();
                warn!(id, "no response from kiosk before the deadline");
                Err(KioskError::Timeout(timeout))
            }
        }
    }

    /// Offers a response to the waiting caller. Returns it back when no
    /// caller expects this id, so the channel handler can treat it as an
    /// unexpected message.
    pub(crate) async fn complete(&self, response: RpcResponse) -> Option<RpcResponse> {
        let mut slot = self.slot.lock().await;
        if !slot
            .as_ref()
            .is_some_and(|pending| pending.id == response.id)
        {
            return Some(response);
        }

        if let Some(pending) = slot.take() {
            debug!(id = response.id, "response matched in-flight command");
            // If the caller timed out between the check and here, the send
            // just fails; the response is dropped like any late reply.
            pending.tx.send(response).ok();
        }
        None
    }
}
