//! Push-based streams handed out by a build tool.
//!
//! A build produces two independent streams: an ordered stream of raw output chunks and a
//! completion signal that carries at most one terminal event. Both are thin wrappers over
//! `std::sync::mpsc`. A consumer unsubscribes by raising the stream's flag or dropping the
//! receiving side; either way the producer's next `send` returns `false`.

use super::error::BuildError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A slice of the tool's captured stdout.
pub type OutputChunk = Vec<u8>;

type DisposeHook = Box<dyn FnOnce() + Send>;

/// Producer half of an [`OutputStream`].
#[derive(Clone)]
pub struct OutputSender {
    chunks: Sender<OutputChunk>,
    unsubscribed: Arc<AtomicBool>,
}

impl OutputSender {
    /// Push a chunk. Returns `false` once the subscriber has gone away.
    pub fn send(&self, chunk: impl Into<OutputChunk>) -> bool {
        if self.unsubscribed.load(Ordering::SeqCst) {
            return false;
        }
        self.chunks.send(chunk.into()).is_ok()
    }
}

/// Ordered stream of output chunks.
pub struct OutputStream {
    chunks: Receiver<OutputChunk>,
    unsubscribed: Arc<AtomicBool>,
    on_dispose: Option<DisposeHook>,
}

/// Consumer-side pieces of an [`OutputStream`], taken apart by the router.
pub(crate) struct StreamParts {
    pub chunks: Receiver<OutputChunk>,
    /// Once set, the sender refuses new chunks.
    pub unsubscribed: Arc<AtomicBool>,
    pub on_dispose: Option<DisposeHook>,
}

impl OutputStream {
    pub fn channel() -> (OutputSender, OutputStream) {
        let (tx, rx) = mpsc::channel();
        let unsubscribed = Arc::new(AtomicBool::new(false));
        let sender = OutputSender {
            chunks: tx,
            unsubscribed: Arc::clone(&unsubscribed),
        };
        let stream = OutputStream {
            chunks: rx,
            unsubscribed,
            on_dispose: None,
        };
        (sender, stream)
    }

    /// Run `hook` once when the subscription reading this stream is disposed.
    pub fn on_dispose(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    pub(crate) fn into_parts(self) -> StreamParts {
        StreamParts {
            chunks: self.chunks,
            unsubscribed: self.unsubscribed,
            on_dispose: self.on_dispose,
        }
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("on_dispose", &self.on_dispose.is_some())
            .finish()
    }
}

/// Producer half of a [`Completion`]. Consumed by the terminal event.
pub struct CompletionSender(Sender<Result<(), BuildError>>);

impl CompletionSender {
    pub fn succeed(self) {
        let _ = self.0.send(Ok(()));
    }

    pub fn fail(self, error: BuildError) {
        let _ = self.0.send(Err(error));
    }
}

/// Completion signal of a build: success, or the first error.
#[derive(Debug)]
pub struct Completion(Receiver<Result<(), BuildError>>);

impl Completion {
    pub fn channel() -> (CompletionSender, Completion) {
        let (tx, rx) = mpsc::channel();
        (CompletionSender(tx), Completion(rx))
    }

    /// Wait up to `timeout` for the terminal event, handing the signal back if none arrived.
    ///
    /// A sender dropped without reporting counts as [`BuildError::Disconnected`].
    pub fn wait_timeout(self, timeout: Duration) -> Result<Result<(), BuildError>, Completion> {
        match self.0.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(BuildError::Disconnected)),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATIENCE: Duration = Duration::from_secs(5);

    #[test]
    fn test_send_fails_after_unsubscribe() {
        let (tx, stream) = OutputStream::channel();
        assert!(tx.send(b"a".to_vec()));
        drop(stream);
        assert!(!tx.send(b"b".to_vec()));
    }

    #[test]
    fn test_send_refused_once_flagged() {
        let (tx, stream) = OutputStream::channel();
        let parts = stream.into_parts();
        assert!(tx.send(b"a".to_vec()));
        parts.unsubscribed.store(true, Ordering::SeqCst);
        assert!(!tx.send(b"b".to_vec()));

        drop(tx);
        let queued: Vec<OutputChunk> = parts.chunks.iter().collect();
        assert_eq!(queued, vec![b"a".to_vec()]);
    }

    #[test]
    fn test_completion_success() {
        let (tx, completion) = Completion::channel();
        tx.succeed();
        assert!(completion.wait_timeout(PATIENCE).unwrap().is_ok());
    }

    #[test]
    fn test_completion_failure() {
        let (tx, completion) = Completion::channel();
        tx.fail(BuildError::Failed("SchemeX failed".into()));
        let err = completion.wait_timeout(PATIENCE).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "SchemeX failed");
    }

    #[test]
    fn test_dropped_sender_is_disconnected() {
        let (tx, completion) = Completion::channel();
        drop(tx);
        assert!(matches!(
            completion.wait_timeout(PATIENCE).unwrap(),
            Err(BuildError::Disconnected)
        ));
    }

    #[test]
    fn test_wait_timeout_returns_signal() {
        let (tx, completion) = Completion::channel();
        let completion = completion
            .wait_timeout(Duration::from_millis(10))
            .unwrap_err();
        tx.succeed();
        assert!(completion.wait_timeout(PATIENCE).unwrap().is_ok());
    }
}
