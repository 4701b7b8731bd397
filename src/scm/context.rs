use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::ScmError;

/// Cancellation and deadline scope for a single driver call.
///
/// Cloning a context shares its cancellation signal. A context carries no
/// other state, so one client can serve many concurrent callers each with
/// their own context.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`Context`] derived from [`Context::with_cancel`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace never fails, even with no receivers left
        self.0.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context whose deadline is `timeout` from now, or the existing
    /// deadline if that is earlier.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Derive a cancellable context.
    ///
    /// Replaces any cancellation signal the context already had.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(rx);
        (self, CancelHandle(tx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. On cancellation `fut` is dropped, aborting any
    /// in-flight I/O it owns.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ScmError>
    where
        F: Future<Output = Result<T, ScmError>>,
    {
        if self.is_cancelled() {
            return Err(ScmError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(ScmError::DeadlineExceeded);
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ScmError::Cancelled),
            _ = self.expired() => Err(ScmError::DeadlineExceeded),
            result = fut => result,
        }
    }

    async fn cancelled(&self) {
        if let Some(rx) = &self.cancel {
            let mut rx = rx.clone();
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        // No handle, or the handle was dropped without cancelling.
        std::future::pending::<()>().await
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
