//! The long-running receive loop, one per channel.

use std::{future::Future, sync::Arc};

use tokio::time::{sleep, timeout};
use tracing::{error, warn};

use crate::{config::RECONNECT_DELAY, framing::FrameBuffer, transport::Transport};

const READ_CHUNK: usize = 1024;

/// Consumes complete frames received on one channel.
pub(crate) trait MessageHandler: Send + Sync + 'static {
    fn on_frame(&self, frame: Vec<u8>) -> impl Future<Output = ()> + Send;
}

/// Maintains the connection and feeds received frames to the handler.
/// Runs until the owning client drops and aborts the task.
pub(crate) async fn run<H: MessageHandler>(transport: Arc<Transport>, handler: H) {
    let incoming_timeout = transport.config().incoming_timeout;
    let max_frame = transport.config().max_frame_bytes;

    loop {
        let mut read_end = match transport.connect().await {
            Ok(read_end) => read_end,
            Err(source) => {
                error!(channel = transport.label(), %source, "failed to connect to kiosk");
                sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        let mut frames = FrameBuffer::new(max_frame);
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            if !transport.is_connected() {
                // A sender hit a write failure; rebuild the connection.
                break;
            }

            match timeout(incoming_timeout, read_end.read(&mut chunk)).await {
                // Nothing arrived within the receive window; go around and
                // re-check the connection.
                Err(_elapsed) => continue,
                Ok(Ok(0)) => {
                    warn!(channel = transport.label(), "kiosk closed the connection");
                    break;
                }
                Ok(Ok(received)) => {
                    for frame in frames.push(&chunk[..received]) {
                        handler.on_frame(frame).await;
                    }
                }
                Ok(Err(source)) => {
                    error!(channel = transport.label(), %source, "error receiving from kiosk");
                    break;
                }
            }
        }

        transport.disconnect().await;
        sleep(RECONNECT_DELAY).await;
    }
}
