//! In-memory sink/source doubles shared by the unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::transport::{PacketSink, PacketSource};

/// Sink that records every delivered chunk and counts closes.
pub(crate) struct CountingSink {
    delivered: mpsc::UnboundedSender<Bytes>,
    closes: Arc<AtomicUsize>,
    /// Fail every send once this many sends have succeeded
    fail_after: Option<usize>,
    sent: usize,
}

impl CountingSink {
    pub(crate) fn new() -> (Self, SinkProbe) {
        Self::with_fail_after(None)
    }

    /// A sink whose sends fail after `n` successes (0 = first write fails).
    pub(crate) fn failing_after(n: usize) -> (Self, SinkProbe) {
        Self::with_fail_after(Some(n))
    }

    fn with_fail_after(fail_after: Option<usize>) -> (Self, SinkProbe) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Self {
                delivered: tx,
                closes: Arc::clone(&closes),
                fail_after,
                sent: 0,
            },
            SinkProbe {
                delivered: rx,
                closes,
            },
        )
    }
}

#[async_trait]
impl PacketSink for CountingSink {
    async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        if let Some(limit) = self.fail_after {
            if self.sent >= limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink failed"));
            }
        }
        self.sent += 1;
        let _ = self.delivered.send(Bytes::copy_from_slice(payload));
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observer side of a [`CountingSink`].
pub(crate) struct SinkProbe {
    delivered: mpsc::UnboundedReceiver<Bytes>,
    closes: Arc<AtomicUsize>,
}

impl SinkProbe {
    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Await the next delivered chunk, failing the test after a second.
    pub(crate) async fn recv(&mut self) -> Bytes {
        tokio::time::timeout(Duration::from_secs(1), self.delivered.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("sink dropped without delivering")
    }

    /// Chunk already delivered, if any.
    pub(crate) fn try_recv(&mut self) -> Option<Bytes> {
        self.delivered.try_recv().ok()
    }
}

/// Source that yields a fixed script of chunks, then ends or parks.
pub(crate) struct ScriptedSource {
    chunks: VecDeque<Vec<u8>>,
    park_when_done: bool,
}

impl ScriptedSource {
    /// Yields the chunks, then reports end-of-stream.
    pub(crate) fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            park_when_done: false,
        }
    }

    /// Yields the chunks, then blocks forever (a quiet but live peer).
    pub(crate) fn new_then_pending(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            park_when_done: true,
        }
    }
}

#[async_trait]
impl PacketSource for ScriptedSource {
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None if self.park_when_done => std::future::pending().await,
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script ended")),
        }
    }
}
