//! UDP adapter for the sink/source capabilities
//!
//! A [`UdpEndpoint`] wraps a connected `tokio::net::UdpSocket` and splits
//! into a [`UdpSink`] and a [`UdpSource`] sharing the socket. UDP has no
//! connection teardown; closing a sink drops its socket reference.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::{PacketSink, PacketSource};

/// A connected UDP endpoint, usable as both sink and source
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
}

impl UdpEndpoint {
    /// Dial a remote address from an ephemeral local port
    ///
    /// The local socket family matches the remote address family.
    pub async fn dial(raddr: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = match raddr {
            SocketAddr::V4(_) => (IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into(),
            SocketAddr::V6(_) => (IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(raddr).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Wrap an already-connected socket
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
        }
    }

    /// Split into sink and source halves sharing the socket
    pub fn split(&self) -> (UdpSink, UdpSource) {
        (
            UdpSink(Arc::clone(&self.socket)),
            UdpSource(Arc::clone(&self.socket)),
        )
    }

    /// Local address of the underlying socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Sink half of a connected UDP socket
pub struct UdpSink(Arc<UdpSocket>);

#[async_trait]
impl PacketSink for UdpSink {
    async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        // One datagram per chunk; a short send is a transport fault.
        let n = self.0.send(payload).await?;
        if n != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram send: {} of {}", n, payload.len()),
            ));
        }
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        // UDP sockets close on drop.
        Ok(())
    }
}

/// Source half of a connected UDP socket
pub struct UdpSource(Arc<UdpSocket>);

#[async_trait]
impl PacketSource for UdpSource {
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(buf).await
    }
}
