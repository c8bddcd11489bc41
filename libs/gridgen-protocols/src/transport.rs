//! Fire-and-forget frame transport
//!
//! Every frame travels over its own TCP connection: connect, write, close. Nothing
//! is read back and nothing is retried. All failure causes collapse into
//! `Delivery::Failed`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::Duration;

use async_trait::async_trait;
use errors::{GridgenError, GridgenResult};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::modbus::Frame;

/// Default connect/write timeout for a single transmission
pub const DEFAULT_TRANSMIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Destination of every connection in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> GridgenResult<Self> {
        let host = host.into();
        let trimmed = host.trim();

        if trimmed.is_empty() {
            return Err(GridgenError::InvalidTarget(
                "host must not be empty".to_string(),
            ));
        }
        if trimmed.contains(char::is_whitespace) {
            return Err(GridgenError::InvalidTarget(format!(
                "host '{trimmed}' contains whitespace"
            )));
        }
        if port == 0 {
            return Err(GridgenError::InvalidTarget("port must not be 0".to_string()));
        }

        Ok(Self {
            host: trimmed.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, using `port_override` instead of the target port when given
    pub fn endpoint(&self, port_override: Option<u16>) -> String {
        let port = port_override.unwrap_or(self.port);
        if self.host.contains(':') {
            // Bare IPv6 literal
            format!("[{}]:{}", self.host, port)
        } else {
            format!("{}:{}", self.host, port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint(None))
    }
}

/// Outcome of one transmission
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Connected and wrote the whole frame
    Sent,
    /// Anything else: refused, timed out, unreachable, reset
    Failed,
}

impl Delivery {
    #[inline]
    pub fn is_sent(self) -> bool {
        self == Delivery::Sent
    }
}

/// Destination for generated frames
///
/// Implementations must never panic or propagate errors: a send either happens or it
/// does not.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Deliver `frame` to the target, or to `port` on the target host when given
    async fn transmit(&self, frame: &Frame, port: Option<u16>) -> Delivery;

    fn target(&self) -> &Target;
}

/// TCP sink: one short-lived connection per frame
#[derive(Debug, Clone)]
pub struct TcpFrameSink {
    target: Target,
    timeout: Duration,
}

impl TcpFrameSink {
    pub fn new(target: Target, timeout: Duration) -> Self {
        Self { target, timeout }
    }
}

#[async_trait]
impl FrameSink for TcpFrameSink {
    async fn transmit(&self, frame: &Frame, port: Option<u16>) -> Delivery {
        transmit(frame, &self.target, port, self.timeout).await
    }

    fn target(&self) -> &Target {
        &self.target
    }
}

/// Open a connection, write `frame`, close it
///
/// Connect and write are each bounded by `timeout_duration`. Closing is best effort and
/// does not affect the outcome.
pub async fn transmit(
    frame: &Frame,
    target: &Target,
    port: Option<u16>,
    timeout_duration: Duration,
) -> Delivery {
    let addr = target.endpoint(port);

    let mut stream = match timeout(timeout_duration, TcpStream::connect(addr.as_str())).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            trace!("TCP connect: {} - {}", addr, e);
            return Delivery::Failed;
        },
        Err(_) => {
            trace!("TCP connect timeout: {}", addr);
            return Delivery::Failed;
        },
    };

    if let Err(e) = stream.set_nodelay(true) {
        trace!("TCP_NODELAY: {}", e);
    }

    match timeout(timeout_duration, stream.write_all(frame.as_bytes())).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => {
            trace!("TCP TX: {} - {}", addr, e);
            return Delivery::Failed;
        },
        Err(_) => {
            trace!("TCP TX timeout: {}", addr);
            return Delivery::Failed;
        },
    }

    let _ = timeout(timeout_duration, stream.shutdown()).await;
    trace!("TCP TX: {} {}B", addr, frame.len());

    Delivery::Sent
}

/// Local IPv4 address used for outbound traffic
///
/// Connecting a UDP socket sends nothing; it only asks the OS for a route. Falls back
/// to loopback when there is no route.
pub fn detect_local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) => ip,
        Err(e) => {
            debug!("Local IP detection failed ({}), using loopback", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        },
    }
}
