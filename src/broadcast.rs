//! Broadcast loop
//!
//! The single task that drains the ingress pipe and replicates every
//! chunk to the current subscriber set. Runs once per broker, for the
//! broker's lifetime; pipe closure is its shutdown signal, not an
//! anomaly.

use std::sync::Arc;

use crate::pipe::PipeReader;
use crate::registry::PeerRegistry;

/// Drain the pipe and fan each chunk out to all current subscribers.
///
/// Delivery within one chunk is sequential and complete before the next
/// chunk is dequeued: every subscriber registered at dequeue time sees
/// the chunk, subscribers registered later never do. A failing subscriber
/// is evicted and never blocks delivery to the rest.
pub(crate) async fn run(mut reader: PipeReader, registry: Arc<PeerRegistry>) {
    while let Some(chunk) = reader.read().await {
        let snapshot = registry.snapshot().await;
        for (key, subscriber) in snapshot {
            if let Err(e) = subscriber.send(&chunk).await {
                tracing::warn!(peer = %key, error = %e, "subscriber write failed, evicting");
                registry.unsubscribe(&key).await;
            }
        }
    }
    tracing::info!("ingress pipe closed, broadcast loop exiting");
}
