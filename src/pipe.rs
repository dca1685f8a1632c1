//! Ingress pipe
//!
//! The single conduit every inbound byte passes through before fan-out.
//! Any number of producers (publisher forwarding tasks, the UDP listener)
//! hold [`PipeWriter`] clones; exactly one [`PipeReader`] exists and is
//! owned by the broadcast loop. The reader is not cloneable, so the
//! single-reader discipline that gives fan-out a deterministic chunk
//! order is structural rather than conventional.
//!
//! The queue is bounded: a write blocks once `depth` chunks are pending,
//! which is the backpressure that keeps fast publishers from outrunning a
//! slow fan-out pass. Closing the pipe fails all later writes and makes
//! the reader return `None` without draining what is still queued.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

/// Create a pipe with room for `depth` pending chunks.
pub fn pipe(depth: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    let (closed_tx, closed_rx) = watch::channel(false);
    (
        PipeWriter {
            tx,
            closed: Arc::new(closed_tx),
        },
        PipeReader {
            rx,
            closed: closed_rx,
        },
    )
}

/// Producer half of the ingress pipe
#[derive(Clone)]
pub struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
    closed: Arc<watch::Sender<bool>>,
}

impl PipeWriter {
    /// Enqueue one chunk, waiting for queue space.
    ///
    /// Fails once the pipe is closed, including while blocked on a full
    /// queue.
    pub async fn write(&self, chunk: Bytes) -> Result<(), PipeClosed> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(PipeClosed);
        }
        tokio::select! {
            res = self.tx.send(chunk) => res.map_err(|_| PipeClosed),
            _ = closed.wait_for(|c| *c) => Err(PipeClosed),
        }
    }

    /// Close the pipe, releasing both ends.
    ///
    /// Idempotent. Blocked and future writes fail; the reader observes
    /// closure on its next read.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Whether the pipe has been closed
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait until the pipe is closed.
    ///
    /// Lets producers blocked on non-pipe I/O (the UDP listener) observe
    /// shutdown without waiting for their next write.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|c| *c).await;
    }
}

/// Consumer half of the ingress pipe
///
/// Not cloneable; owned by the broadcast loop for the broker's lifetime.
pub struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    closed: watch::Receiver<bool>,
}

impl PipeReader {
    /// Dequeue the next chunk.
    ///
    /// Returns `None` once the pipe is closed or every writer is gone.
    /// Chunks still queued at close time are discarded, so a blocked
    /// reader wakes promptly on shutdown.
    pub async fn read(&mut self) -> Option<Bytes> {
        // The watch guard is consumed inside the select arm (before any
        // await) so the future stays `Send`.
        let explicitly_closed = tokio::select! {
            biased;
            res = self.closed.wait_for(|c| *c) => res.is_ok(),
            chunk = self.rx.recv() => return chunk,
        };
        if explicitly_closed {
            // Explicit close: stop without draining.
            None
        } else {
            // Every writer dropped without closing: drain what is
            // queued, then end.
            self.rx.recv().await
        }
    }
}

/// The pipe was closed while writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeClosed;

impl std::fmt::Display for PipeClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ingress pipe closed")
    }
}

impl std::error::Error for PipeClosed {}
