//! Broker facade
//!
//! [`Plex`] composes the ingress pipe, the peer registry and the
//! broadcast loop, and exposes the two UDP attachment points: a blocking
//! listen call feeding inbound datagrams into the pipe, and a
//! dial-and-register call creating an outbound subscriber.

use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::broadcast;
use crate::error::{PlexError, Result};
use crate::pipe::{self, PipeWriter};
use crate::registry::PeerRegistry;
use crate::transport::{self, PacketSink, PacketSource, UdpEndpoint};

/// Queue depth of the ingress pipe, in chunks
pub const DEFAULT_PIPE_DEPTH: usize = 64;

/// User-space multicast broker
///
/// One ingress point, many subscribers. Construction spawns the
/// broadcast loop; it runs detached until [`close`](Plex::close) shuts
/// the pipe.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
///
/// # async fn example() -> plex::Result<()> {
/// let broker = Arc::new(plex::Plex::new(1500)?);
///
/// // Feed inbound datagrams; blocks, so run it in the background.
/// let listener = Arc::clone(&broker);
/// tokio::spawn(async move {
///     if let Err(e) = listener.listen_udp(":18833").await {
///         tracing::info!(error = %e, "listener exited");
///     }
/// });
///
/// broker.subscribe_udp("10.0.0.2:18833").await?;
/// # Ok(())
/// # }
/// ```
pub struct Plex {
    registry: Arc<PeerRegistry>,

    /// Writer clone used by the listen entry point
    pipe: PipeWriter,

    /// Atomic unit of fan-out; the maximum datagram size carried
    buffer_size: usize,
}

impl Plex {
    /// Create a broker with the given fan-out buffer size.
    ///
    /// `buffer_size` of zero is rejected: every read would be a no-op.
    pub fn new(buffer_size: usize) -> Result<Self> {
        Self::with_pipe_depth(buffer_size, DEFAULT_PIPE_DEPTH)
    }

    /// Create a broker with an explicit ingress queue depth.
    pub fn with_pipe_depth(buffer_size: usize, pipe_depth: usize) -> Result<Self> {
        if buffer_size == 0 {
            return Err(PlexError::InvalidBufferSize);
        }

        let (tx, rx) = pipe::pipe(pipe_depth);
        let registry = Arc::new(PeerRegistry::new(tx.clone(), buffer_size));
        tokio::spawn(broadcast::run(rx, Arc::clone(&registry)));

        Ok(Self {
            registry,
            pipe: tx,
            buffer_size,
        })
    }

    /// Register a peer under `key` with an optional sink and source.
    ///
    /// The transport-agnostic entry point; [`subscribe_udp`](Self::subscribe_udp)
    /// wraps it for connected UDP sockets.
    pub async fn subscribe(
        &self,
        key: &str,
        sink: Option<Box<dyn PacketSink>>,
        source: Option<Box<dyn PacketSource>>,
    ) -> Result<()> {
        self.registry.subscribe(key, sink, source).await
    }

    /// Remove a peer; a no-op for unknown keys.
    pub async fn unsubscribe(&self, key: &str) {
        self.registry.unsubscribe(key).await;
    }

    /// Whether `key` is registered as a subscriber and/or publisher.
    pub async fn exists(&self, key: &str) -> (bool, bool) {
        self.registry.exists(key).await
    }

    /// Bind `laddr` and feed every inbound datagram into the ingress pipe.
    ///
    /// Accepts the `":port"` shorthand. Blocks the calling task until the
    /// socket errors or the broker closes (then [`PlexError::Closed`]),
    /// so callers that need to keep running must spawn it.
    pub async fn listen_udp(&self, laddr: &str) -> Result<()> {
        let addr = transport::resolve(laddr).await?;
        let socket = UdpSocket::bind(addr).await?;
        let local = socket.local_addr()?;
        tracing::info!(addr = %local, "listening");

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = tokio::select! {
                res = socket.recv_from(&mut buf) => res?.0,
                _ = self.pipe.closed() => {
                    tracing::info!(addr = %local, "broker closed, listener exiting");
                    return Err(PlexError::Closed);
                }
            };
            // Short datagrams are forwarded at their actual length.
            let chunk = Bytes::copy_from_slice(&buf[..n]);
            if self.pipe.write(chunk).await.is_err() {
                tracing::info!(addr = %local, "broker closed, listener exiting");
                return Err(PlexError::Closed);
            }
        }
    }

    /// Dial `raddr` and register the endpoint as subscriber and publisher.
    ///
    /// The peer starts receiving broadcasts from the next dequeued chunk
    /// onward; nothing is replayed. Bytes it sends back are merged into
    /// the ingress stream.
    pub async fn subscribe_udp(&self, raddr: &str) -> Result<()> {
        let addr = transport::resolve(raddr).await?;
        let endpoint = UdpEndpoint::dial(addr).await?;
        let (sink, source) = endpoint.split();

        self.subscribe(raddr, Some(Box::new(sink)), Some(Box::new(source)))
            .await?;
        tracing::info!(peer = %raddr, "subscribed");
        Ok(())
    }

    /// Shut the broker down.
    ///
    /// Closes every publisher, the pipe and every sink via the registry;
    /// the broadcast loop observes the closed pipe and exits on its own.
    /// Does not wait for that exit. Idempotent.
    pub async fn close(&self) {
        self.registry.close().await;
    }

    /// Whether [`close`](Self::close) has run.
    pub async fn is_closed(&self) -> bool {
        self.registry.is_closed().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testutil::{CountingSink, ScriptedSource};

    #[tokio::test]
    async fn test_zero_buffer_size_rejected() {
        assert!(matches!(Plex::new(0), Err(PlexError::InvalidBufferSize)));
    }

    #[tokio::test]
    async fn test_publisher_to_subscribers_end_to_end() {
        let broker = Plex::new(1024).unwrap();

        let (sink_a, mut probe_a) = CountingSink::new();
        let (sink_b, mut probe_b) = CountingSink::new();
        broker
            .subscribe("a", Some(Box::new(sink_a)), None)
            .await
            .unwrap();
        broker
            .subscribe("b", Some(Box::new(sink_b)), None)
            .await
            .unwrap();

        let source = ScriptedSource::new_then_pending(vec![vec![42u8; 37]]);
        broker
            .subscribe("pub", None, Some(Box::new(source)))
            .await
            .unwrap();

        let expected = Bytes::from(vec![42u8; 37]);
        assert_eq!(probe_a.recv().await, expected);
        assert_eq!(probe_b.recv().await, expected);
    }

    #[tokio::test]
    async fn test_same_key_subscriber_and_publisher() {
        let broker = Plex::new(1024).unwrap();

        let (sink, _probe) = CountingSink::new();
        let source = ScriptedSource::new_then_pending(vec![]);
        broker
            .subscribe("both", Some(Box::new(sink)), Some(Box::new(source)))
            .await
            .unwrap();

        assert_eq!(broker.exists("both").await, (true, true));
    }

    #[tokio::test]
    async fn test_close_rejects_further_subscribes() {
        let broker = Plex::new(1024).unwrap();
        let (sink, probe) = CountingSink::new();
        broker
            .subscribe("a", Some(Box::new(sink)), None)
            .await
            .unwrap();

        broker.close().await;
        assert!(broker.is_closed().await);
        assert_eq!(probe.closes(), 1);

        let (late, _) = CountingSink::new();
        assert!(matches!(
            broker.subscribe("late", Some(Box::new(late)), None).await,
            Err(PlexError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_stops_quiet_publisher() {
        let broker = Plex::new(1024).unwrap();
        let source = ScriptedSource::new_then_pending(vec![]);
        broker
            .subscribe("pub", None, Some(Box::new(source)))
            .await
            .unwrap();
        assert_eq!(broker.exists("pub").await, (false, true));

        broker.close().await;
        assert_eq!(broker.exists("pub").await, (false, false));
    }

    #[tokio::test]
    async fn test_listen_udp_surfaces_bind_failure() {
        let broker = Plex::new(1024).unwrap();

        // Occupy a port, then try to listen on it.
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let result = broker.listen_udp(&addr.to_string()).await;
        assert!(matches!(result, Err(PlexError::Io(_))));
        assert!(!broker.is_closed().await);
    }

    #[tokio::test]
    async fn test_listen_udp_feeds_subscribers() {
        let broker = Arc::new(Plex::new(1024).unwrap());

        let (sink, mut probe) = CountingSink::new();
        broker
            .subscribe("a", Some(Box::new(sink)), None)
            .await
            .unwrap();

        // Bind an ephemeral listener and discover its port via a probe
        // socket bound first.
        let probe_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listen_addr = listener_socket.local_addr().unwrap();
        drop(listener_socket);

        let listener = Arc::clone(&broker);
        let listen_task =
            tokio::spawn(async move { listener.listen_udp(&listen_addr.to_string()).await });

        // Retry until the listener is up; UDP sends do not error on a
        // not-yet-bound peer, so retry the payload itself.
        let payload = b"datagram";
        let mut got = None;
        for _ in 0..50 {
            probe_socket.send_to(payload, listen_addr).await.unwrap();
            if let Ok(chunk) =
                tokio::time::timeout(Duration::from_millis(200), probe.recv()).await
            {
                got = Some(chunk);
                break;
            }
        }
        assert_eq!(got.expect("listener never delivered"), Bytes::from_static(payload));

        broker.close().await;
        let result = tokio::time::timeout(Duration::from_secs(5), listen_task)
            .await
            .expect("listener did not exit after close")
            .unwrap();
        assert!(matches!(result, Err(PlexError::Closed)));
    }
}
