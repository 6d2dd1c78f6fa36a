//! One stream endpoint of the kiosk link, TCP or Unix domain.
//!
//! A transport owns the write half of the current connection; the channel
//! worker owns the read half. Senders and the worker coordinate through the
//! writer lock: a failed send drops the write half and marks the transport
//! disconnected, which the worker notices on its next receive tick and
//! answers by reconnecting.

use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{lookup_host, TcpStream, UnixStream},
    sync::Mutex,
};
use tracing::{debug, error, info};

use crate::{
    config::{ChannelConfig, Endpoint},
    error::KioskError,
};

enum WriteEnd {
    Tcp(tokio::net::tcp::OwnedWriteHalf),
    Unix(tokio::net::unix::OwnedWriteHalf),
}

pub(crate) enum ReadEnd {
    Tcp(tokio::net::tcp::OwnedReadHalf),
    Unix(tokio::net::unix::OwnedReadHalf),
}

impl ReadEnd {
    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ReadEnd::Tcp(half) => half.read(buf).await,
            ReadEnd::Unix(half) => half.read(buf).await,
        }
    }
}

pub(crate) struct Transport {
    config: ChannelConfig,
    /// Human label for log lines ("command" / "reader").
    label: &'static str,
    writer: Mutex<Option<WriteEnd>>,
    connected: AtomicBool,
}

impl Transport {
    pub(crate) fn new(config: ChannelConfig, label: &'static str) -> Self {
        Self {
            config,
            label,
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    pub(crate) fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub(crate) fn label(&self) -> &'static str {
        self.label
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Establishes the connection, stores the write half, and hands the
    /// read half to the caller (the channel worker).
    pub(crate) async fn connect(&self) -> io::Result<ReadEnd> {
        info!(
            channel = self.label,
            endpoint = %self.config.endpoint,
            "opening kiosk socket"
        );

        let (read_end, write_end) = match &self.config.endpoint {
            Endpoint::Tcp { host, port } => {
                let mut addrs = lookup_host((host.as_str(), *port)).await?;
                let addr = addrs.next().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("failed to resolve hostname {host}"),
                    )
                })?;
                let stream = TcpStream::connect(addr).await?;
                let (read, write) = stream.into_split();
                (ReadEnd::Tcp(read), WriteEnd::Tcp(write))
            }
            Endpoint::Unix { path } => {
                let stream = UnixStream::connect(path).await?;
                let (read, write) = stream.into_split();
                (ReadEnd::Unix(read), WriteEnd::Unix(write))
            }
        };

        *self.writer.lock().await = Some(write_end);
        self.connected.store(true, Ordering::SeqCst);
        info!(
            channel = self.label,
            endpoint = %self.config.endpoint,
            "successfully connected"
        );
        Ok(read_end)
    }

    /// Writes one whole frame. A failure drops the connection so the worker
    /// loop reconnects.
    pub(crate) async fn send(&self, payload: &[u8]) -> Result<(), KioskError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            error!(channel = self.label, "kiosk socket is not connected");
            return Err(KioskError::NotConnected);
        };

        debug!(
            channel = self.label,
            payload = %String::from_utf8_lossy(payload),
            "sending message to kiosk"
        );

        let written = match writer {
            WriteEnd::Tcp(half) => half.write_all(payload).await,
            WriteEnd::Unix(half) => half.write_all(payload).await,
        };

        match written {
            Ok(()) => Ok(()),
            Err(source) => {
                error!(channel = self.label, %source, "failed to write to kiosk socket");
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
                Err(KioskError::Comm { source })
            }
        }
    }

    /// Tears down the current connection; idempotent.
    pub(crate) async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if self.writer.lock().await.take().is_some() {
            info!(
                channel = self.label,
                endpoint = %self.config.endpoint,
                "closing kiosk socket"
            );
        }
    }
}
