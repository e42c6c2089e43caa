//! Routing of build output into the log.
//!
//! The router drains an [`OutputStream`] on a dedicated thread and writes every chunk to its
//! sink before taking the next one, so the sink sees the chunks in arrival order. The returned
//! [`Subscription`] owns that thread; disposing it stops the routing.
//!
//! Disposal first cuts the producer off, so the queue can only shrink from then on. What is
//! left is still written, for a bounded time.

use super::stream::{OutputChunk, OutputStream};
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often an idle router checks whether it has been disposed.
const IDLE_TICK: Duration = Duration::from_millis(25);

/// Longest a disposed router keeps writing chunks that were queued before disposal.
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Forwards output chunks to a writer.
pub struct BuildOutputRouter<W> {
    sink: W,
}

impl<W: Write + Send + 'static> BuildOutputRouter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Subscribe to `stream` and start forwarding.
    pub fn route(self, stream: OutputStream) -> Subscription {
        let parts = stream.into_parts();
        let chunks = parts.chunks;
        let stopping = Arc::new(AtomicBool::new(false));
        let faulted = Arc::new(AtomicBool::new(false));

        let worker = {
            let stopping = Arc::clone(&stopping);
            let faulted = Arc::clone(&faulted);
            let mut sink = self.sink;
            thread::spawn(move || {
                let result = forward(&chunks, &mut sink, &stopping);
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "failed to write build output");
                    faulted.store(true, Ordering::SeqCst);
                }
                result
            })
        };

        Subscription {
            unsubscribed: parts.unsubscribed,
            stopping,
            faulted,
            worker: Some(worker),
            on_dispose: parts.on_dispose,
        }
    }
}

fn forward<W: Write>(
    chunks: &Receiver<OutputChunk>,
    sink: &mut W,
    stopping: &AtomicBool,
) -> io::Result<()> {
    loop {
        match chunks.recv_timeout(IDLE_TICK) {
            Ok(chunk) => write_chunk(sink, &chunk)?,
            Err(RecvTimeoutError::Disconnected) => return sink.flush(),
            Err(RecvTimeoutError::Timeout) => {}
        }
        if stopping.load(Ordering::SeqCst) {
            break;
        }
    }

    // Disposed: the sender is already cut off, so this only shrinks the queue.
    let deadline = Instant::now() + DRAIN_LIMIT;
    while let Ok(chunk) = chunks.try_recv() {
        write_chunk(sink, &chunk)?;
        if Instant::now() >= deadline {
            tracing::warn!("gave up writing queued build output after disposal");
            break;
        }
    }
    sink.flush()
}

fn write_chunk<W: Write>(sink: &mut W, chunk: &[u8]) -> io::Result<()> {
    tracing::trace!(bytes = chunk.len(), "routing output chunk");
    sink.write_all(chunk)
}

/// Live forwarding relation between an output stream and a writer.
///
/// Disposed at most once, either explicitly or on drop.
pub struct Subscription {
    unsubscribed: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    worker: Option<JoinHandle<io::Result<()>>>,
    on_dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Cut the producer off, run the stream's dispose hook, then wait for the router thread
    /// to write what was already queued.
    ///
    /// Returns the write error that stopped the router, if any. Calls after the first
    /// return `Ok(())` and do nothing.
    pub fn dispose(&mut self) -> io::Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.unsubscribed.store(true, Ordering::SeqCst);
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(hook) = self.on_dispose.take() {
            hook();
        }

        let result = worker
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("output router panicked")));
        tracing::debug!("output subscription disposed");
        result
    }

    pub fn is_disposed(&self) -> bool {
        self.worker.is_none()
    }

    /// Whether the router has stopped on a write error.
    pub fn has_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}
