//! Transport abstraction
//!
//! The broker core never touches sockets directly. It consumes two
//! capabilities: a writable-closable destination ([`PacketSink`]) and a
//! readable source ([`PacketSource`]), each identified by a unique string
//! key (its peer address). The UDP adapter in [`udp`] implements both over
//! a connected `tokio::net::UdpSocket`; tests implement them in memory.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::lookup_host;

use crate::error::{PlexError, Result};

pub mod udp;

pub use udp::{UdpEndpoint, UdpSink, UdpSource};

/// A writable, closable destination for broadcast chunks
///
/// The registry exclusively owns a sink once it is registered; nothing
/// else may close it. `send` must write the whole payload or fail.
#[async_trait]
pub trait PacketSink: Send {
    /// Write one chunk, in full
    async fn send(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Release the underlying resource
    ///
    /// Called at most once, by the registry (explicit unsubscribe,
    /// eviction, or broker close).
    async fn close(&mut self) -> io::Result<()>;
}

/// A readable source of inbound bytes
///
/// A dedicated forwarding task exclusively reads the source; dropping the
/// source releases it.
#[async_trait]
pub trait PacketSource: Send {
    /// Read up to `buf.len()` bytes, returning the number read
    ///
    /// An error ends the forwarding task that drives this source.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Resolve an address string to a socket address.
///
/// Accepts the `":port"` shorthand for `0.0.0.0:port`. Returns the first
/// resolved endpoint, or [`PlexError::Resolve`] if the name yields none.
pub async fn resolve(addr: &str) -> Result<SocketAddr> {
    let normalized = normalize_addr(addr);
    let mut addrs = lookup_host(normalized.as_ref()).await?;
    addrs
        .next()
        .ok_or_else(|| PlexError::Resolve(addr.to_string()))
}

fn normalize_addr(addr: &str) -> std::borrow::Cow<'_, str> {
    if addr.starts_with(':') {
        std::borrow::Cow::Owned(format!("0.0.0.0{}", addr))
    } else {
        std::borrow::Cow::Borrowed(addr)
    }
}
