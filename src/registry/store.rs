//! Peer registry implementation
//!
//! Owns the subscriber and publisher maps, the master handle to the
//! ingress pipe, and the closed flag. The same key may independently
//! exist in either or both maps: a bidirectional UDP peer registers under
//! one key as both subscriber and publisher.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use super::entry::{PublisherHandle, SubscriberHandle};
use crate::error::{PlexError, Result};
use crate::pipe::PipeWriter;
use crate::transport::{PacketSink, PacketSource};

struct Peers {
    subs: HashMap<String, SubscriberHandle>,
    pubs: HashMap<String, PublisherHandle>,
    closed: bool,
}

/// Registry of live subscribers and publishers
pub struct PeerRegistry {
    peers: Mutex<Peers>,

    /// Master writer; closing it shuts the pipe for every clone
    pipe: PipeWriter,

    /// Chunk size used by publisher forwarding tasks
    buffer_size: usize,
}

impl PeerRegistry {
    /// Create an empty registry feeding the given pipe
    pub fn new(pipe: PipeWriter, buffer_size: usize) -> Self {
        Self {
            peers: Mutex::new(Peers {
                subs: HashMap::new(),
                pubs: HashMap::new(),
                closed: false,
            }),
            pipe,
            buffer_size,
        }
    }

    /// Look up a key in both maps
    pub async fn exists(&self, key: &str) -> (bool, bool) {
        let peers = self.peers.lock().await;
        (peers.subs.contains_key(key), peers.pubs.contains_key(key))
    }

    /// Register a peer under `key`
    ///
    /// A sink is inserted into the subscriber map, replacing (and closing)
    /// any previous sink under the same key. A source gets a dedicated
    /// forwarding task copying its bytes into the ingress pipe until the
    /// source errors or the pipe closes; the task then removes its own
    /// registry entry.
    ///
    /// Rejected with [`PlexError::Closed`] after [`close`](Self::close).
    pub async fn subscribe(
        self: &Arc<Self>,
        key: &str,
        sink: Option<Box<dyn PacketSink>>,
        source: Option<Box<dyn PacketSource>>,
    ) -> Result<()> {
        let replaced = {
            let mut peers = self.peers.lock().await;
            if peers.closed {
                return Err(PlexError::Closed);
            }

            let replaced = sink.map(|sink| {
                peers
                    .subs
                    .insert(key.to_string(), SubscriberHandle::new(sink))
            });

            if let Some(source) = source {
                // Spawning is not blocking I/O, so doing it under the lock
                // keeps the closed check and the map insert atomic.
                let registry = Arc::clone(self);
                let owner = key.to_string();
                let forward = tokio::spawn(async move {
                    registry.forward(owner, source).await;
                });
                if let Some(old) = peers
                    .pubs
                    .insert(key.to_string(), PublisherHandle::new(forward))
                {
                    old.abort();
                }
            }

            replaced.flatten()
        };

        // Close the displaced sink outside the lock.
        if let Some(old) = replaced {
            old.close_logged(key).await;
        }

        tracing::debug!(peer = %key, "peer registered");
        Ok(())
    }

    /// Copy bytes from a source into the ingress pipe, one chunk at a time.
    async fn forward(self: Arc<Self>, key: String, mut source: Box<dyn PacketSource>) {
        loop {
            let mut buf = vec![0u8; self.buffer_size];
            match source.recv(&mut buf).await {
                Ok(n) => {
                    buf.truncate(n);
                    if self.pipe.write(Bytes::from(buf)).await.is_err() {
                        tracing::info!(peer = %key, "ingress pipe closed, publisher copy ending");
                        break;
                    }
                }
                Err(e) => {
                    tracing::info!(peer = %key, error = %e, "publisher source ended");
                    break;
                }
            }
        }

        // Drop the dead entry so it cannot dangle until an explicit
        // unsubscribe. The handle being removed is this task's own; it is
        // dropped, not aborted.
        let mut peers = self.peers.lock().await;
        peers.pubs.remove(&key);
    }

    /// Remove a peer from both maps, closing what was registered
    ///
    /// Idempotent; unsubscribing an absent key is a no-op.
    pub async fn unsubscribe(&self, key: &str) {
        let (removed_sub, removed_pub) = {
            let mut peers = self.peers.lock().await;
            let removed_pub = peers.pubs.remove(key);
            if let Some(publisher) = &removed_pub {
                publisher.abort();
            }
            (peers.subs.remove(key), removed_pub.is_some())
        };

        let removed_any = removed_sub.is_some() || removed_pub;
        if let Some(sub) = removed_sub {
            sub.close_logged(key).await;
        }
        if removed_any {
            tracing::debug!(peer = %key, "peer unsubscribed");
        }
    }

    /// Stable snapshot of the current subscriber set
    ///
    /// Taken under the registry lock; the broadcast loop iterates the
    /// snapshot, never the live map.
    pub async fn snapshot(&self) -> Vec<(String, SubscriberHandle)> {
        let peers = self.peers.lock().await;
        peers
            .subs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Shut the registry down
    ///
    /// Stops every publisher task, closes both ends of the ingress pipe,
    /// then closes every subscriber sink. All closes are best-effort.
    /// Idempotent; afterwards the registry is inert and `subscribe` is
    /// rejected.
    pub async fn close(&self) {
        let subs = {
            let mut peers = self.peers.lock().await;
            if peers.closed {
                return;
            }
            peers.closed = true;

            for (_, publisher) in peers.pubs.drain() {
                publisher.abort();
            }
            peers.subs.drain().collect::<Vec<_>>()
        };

        self.pipe.close();

        for (key, sub) in subs {
            sub.close_logged(&key).await;
        }

        tracing::info!("registry closed");
    }

    /// Whether `close` has run
    pub async fn is_closed(&self) -> bool {
        self.peers.lock().await.closed
    }
}
