//! Per-peer registry entries
//!
//! This module defines the handles the registry stores per peer: a shared,
//! lockable sink for subscribers and an abortable forwarding task for
//! publishers.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::transport::PacketSink;

/// Handle to one registered subscriber sink
///
/// The sink itself sits behind its own mutex so the broadcast loop can
/// write to a snapshot of handles without holding the registry lock.
/// Cloning the handle shares the sink; only the registry may close it.
#[derive(Clone)]
pub struct SubscriberHandle {
    sink: Arc<Mutex<Box<dyn PacketSink>>>,
}

impl SubscriberHandle {
    /// Wrap a sink for registration
    pub fn new(sink: Box<dyn PacketSink>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Write one chunk through the sink
    pub async fn send(&self, payload: &[u8]) -> std::io::Result<()> {
        self.sink.lock().await.send(payload).await
    }

    /// Close the sink, logging rather than propagating failure
    ///
    /// Best-effort: releasing as many resources as possible matters more
    /// than surfacing one close error.
    pub(super) async fn close_logged(&self, key: &str) {
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::warn!(peer = %key, error = %e, "sink close failed");
        }
    }
}

/// Handle to one publisher's forwarding task
///
/// The task exclusively owns the packet source; aborting the task drops
/// the source, which releases the underlying endpoint.
pub struct PublisherHandle {
    forward: JoinHandle<()>,
}

impl PublisherHandle {
    /// Wrap a spawned forwarding task
    pub fn new(forward: JoinHandle<()>) -> Self {
        Self { forward }
    }

    /// Stop the forwarding task
    ///
    /// A no-op if the task already exited on its own.
    pub(super) fn abort(&self) {
        self.forward.abort();
    }
}
