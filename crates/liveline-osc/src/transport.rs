//! Datagram transport layer
//!
//! A transport binds a local endpoint, sends to one fixed remote peer, and
//! reports inbound traffic through a single event channel.

use crate::codec::{decode_packet, OscMessage};
use crate::config::OscConfig;
use crate::error::{OscError, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Largest datagram we accept.
const MAX_DATAGRAM: usize = 65_536;

/// Events emitted by an open transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// Emitted exactly once, first, after a successful open.
    Ready,
    Message(OscMessage),
    /// Channel-level fault (not tied to any request).
    Error(OscError),
}

/// Bidirectional, connectionless message channel.
///
/// `send` is fire-and-forget. `close` is idempotent.
pub trait OscTransport: Send + 'static {
    fn open(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>>;

    fn send(&self, message: &OscMessage) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// UDP transport bound to `host:receive_port`, sending to `host:send_port`.
pub struct UdpTransport {
    config: OscConfig,
    socket: Option<Arc<UdpSocket>>,
    remote: Option<SocketAddr>,
    recv_task: Option<JoinHandle<()>>,
}

impl UdpTransport {
    pub fn new(config: OscConfig) -> Self {
        Self {
            config,
            socket: None,
            remote: None,
            recv_task: None,
        }
    }

    /// Local address actually bound, if open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
        (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("could not resolve {}:{}", host, port),
            )
        })
    }

    async fn recv_loop(socket: Arc<UdpSocket>, events: mpsc::UnboundedSender<TransportEvent>) {
        if events.send(TransportEvent::Ready).is_err() {
            return;
        }

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => match decode_packet(&buf[..len]) {
                    Ok(messages) => {
                        for message in messages {
                            if events.send(TransportEvent::Message(message)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(from = %from, error = %e, "Discarding malformed OSC packet");
                    }
                },
                Err(e) => {
                    // Windows reports ICMP port-unreachable as a recv error; keep listening
                    if events.send(TransportEvent::Error(OscError::Io(e))).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

impl OscTransport for UdpTransport {
    fn open(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        self.close();

        let local = self.config.local_addr();
        let bind_err = |source: std::io::Error| OscError::Bind {
            addr: local.clone(),
            source,
        };

        let local_addr = Self::resolve(&self.config.host, self.config.receive_port).map_err(bind_err)?;
        let std_socket = std::net::UdpSocket::bind(local_addr).map_err(bind_err)?;
        std_socket.set_nonblocking(true).map_err(bind_err)?;
        let socket = Arc::new(UdpSocket::from_std(std_socket).map_err(bind_err)?);

        let remote = Self::resolve(&self.config.host, self.config.send_port)?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.recv_task = Some(tokio::spawn(Self::recv_loop(socket.clone(), tx)));
        self.socket = Some(socket);
        self.remote = Some(remote);

        tracing::debug!(local = %local, remote = %remote, "UDP transport bound");
        Ok(rx)
    }

    fn send(&self, message: &OscMessage) -> Result<()> {
        let (socket, remote) = match (&self.socket, self.remote) {
            (Some(socket), Some(remote)) => (socket, remote),
            _ => return Err(OscError::NotReady),
        };

        let packet = message.encode()?;
        socket
            .try_send_to(&packet, remote)
            .map_err(|source| OscError::Send {
                address: message.address.clone(),
                source,
            })?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
        }
        if self.socket.take().is_some() {
            tracing::debug!(port = self.config.receive_port, "UDP transport closed");
        }
        self.remote = None;
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
