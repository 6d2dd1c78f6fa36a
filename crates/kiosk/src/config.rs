use std::{env, path::PathBuf, time::Duration};

use crate::error::KioskError;

/// TCP port of the kiosk command channel.
pub const DEFAULT_COMMAND_PORT: u16 = 10000;
/// TCP port of the kiosk reader-event channel.
pub const DEFAULT_READER_PORT: u16 = 10001;
/// TCP host used when the caller supplies an empty address.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Environment variable naming the base directory of the Unix sockets.
pub const SOCKET_DIR_ENV: &str = "OTI_KIOSK_SOCKET_DIR";
/// Base directory used when neither the caller nor the environment names one.
pub const DEFAULT_SOCKET_DIR: &str = "./var";

const COMMAND_SOCKET_NAME: &str = "socket_cmd";
const READER_SOCKET_NAME: &str = "socket_events";

/// Longest socket path accepted by `sockaddr_un` on Linux, minus the
/// terminating NUL.
const MAX_SOCKET_PATH_LEN: usize = 107;

pub(crate) const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
pub(crate) const DEFAULT_INCOMING_TIMEOUT: Duration = Duration::from_millis(1000);
pub(crate) const DEFAULT_MAX_FRAME_BYTES: usize = 1024;
pub(crate) const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// One stream endpoint, either side of the dual-channel link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{host}:{port}"),
            Endpoint::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Settings for one channel: where to connect and how to pace reception.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub endpoint: Endpoint,
    /// How long a single receive waits before the worker re-checks the
    /// connection. Bounds how stale an event can get, so left configurable.
    pub incoming_timeout: Duration,
    /// Upper bound on a single JSON message; larger frames are a parsing
    /// error and are discarded.
    pub max_frame_bytes: usize,
}

/// Where the two kiosk sockets live.
#[derive(Clone, Debug)]
enum EndpointSpec {
    Tcp { host: String },
    Unix { base_dir: Option<PathBuf> },
}

/// Fluent configuration for [`KioskClient`](crate::KioskClient).
///
/// Defaults to TCP against `127.0.0.1` on the standard kiosk ports.
#[derive(Clone, Debug)]
pub struct KioskClientBuilder {
    endpoint: EndpointSpec,
    command_port: u16,
    reader_port: u16,
    pub(crate) response_timeout: Duration,
    incoming_timeout: Duration,
    max_frame_bytes: usize,
}

impl Default for KioskClientBuilder {
    fn default() -> Self {
        Self {
            endpoint: EndpointSpec::Tcp {
                host: String::new(),
            },
            command_port: DEFAULT_COMMAND_PORT,
            reader_port: DEFAULT_READER_PORT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            incoming_timeout: DEFAULT_INCOMING_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl KioskClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reach the kiosk over TCP. An empty host falls back to
    /// [`DEFAULT_TCP_HOST`].
    pub fn tcp(mut self, host: impl Into<String>) -> Self {
        self.endpoint = EndpointSpec::Tcp { host: host.into() };
        self
    }

    /// Reach the kiosk over Unix domain sockets under `base_dir`
    /// (`<base_dir>/socket_cmd` and `<base_dir>/socket_events`).
    pub fn unix(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.endpoint = EndpointSpec::Unix {
            base_dir: Some(base_dir.into()),
        };
        self
    }

    /// Unix domain sockets with the base directory taken from
    /// [`SOCKET_DIR_ENV`], falling back to [`DEFAULT_SOCKET_DIR`].
    pub fn unix_from_env(mut self) -> Self {
        self.endpoint = EndpointSpec::Unix { base_dir: None };
        self
    }

    /// Override the command-channel TCP port.
    pub fn command_port(mut self, port: u16) -> Self {
        self.command_port = port;
        self
    }

    /// Override the reader-event-channel TCP port.
    pub fn reader_port(mut self, port: u16) -> Self {
        self.reader_port = port;
        self
    }

    /// How long a command waits for its response.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// How long a channel worker blocks in a single receive.
    pub fn incoming_timeout(mut self, timeout: Duration) -> Self {
        self.incoming_timeout = timeout;
        self
    }

    /// Upper bound on a single incoming JSON message.
    pub fn max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// Resolve the builder into the two channel configurations.
    pub(crate) fn channel_configs(&self) -> Result<(ChannelConfig, ChannelConfig), KioskError> {
        let (command, reader) = match &self.endpoint {
            EndpointSpec::Tcp { host } => {
                let host = if host.is_empty() {
                    DEFAULT_TCP_HOST.to_string()
                } else {
                    host.clone()
                };
                (
                    Endpoint::Tcp {
                        host: host.clone(),
                        port: self.command_port,
                    },
                    Endpoint::Tcp {
                        host,
                        port: self.reader_port,
                    },
                )
            }
            EndpointSpec::Unix { base_dir } => {
                let base = match base_dir {
                    Some(dir) => dir.clone(),
                    None => env::var_os(SOCKET_DIR_ENV)
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_DIR)),
                };
                (
                    Endpoint::Unix {
                        path: checked_socket_path(&base, COMMAND_SOCKET_NAME)?,
                    },
                    Endpoint::Unix {
                        path: checked_socket_path(&base, READER_SOCKET_NAME)?,
                    },
                )
            }
        };

        Ok((
            ChannelConfig {
                endpoint: command,
                incoming_timeout: self.incoming_timeout,
                max_frame_bytes: self.max_frame_bytes,
            },
            ChannelConfig {
                endpoint: reader,
                incoming_timeout: self.incoming_timeout,
                max_frame_bytes: self.max_frame_bytes,
            },
        ))
    }
}

fn checked_socket_path(base: &std::path::Path, name: &str) -> Result<PathBuf, KioskError> {
    let path = base.join(name);
    if path.as_os_str().len() > MAX_SOCKET_PATH_LEN {
        return Err(KioskError::Config(format!(
            "socket path is too long: {}",
            path.display()
        )));
    }
    Ok(path)
}
