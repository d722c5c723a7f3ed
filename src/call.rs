//! Cancellable call context carried through a generation task.
//!
//! A [`CallContext`] couples a cancellation token with an optional deadline.
//! Child contexts share the parent's cancellation and may only shorten the
//! deadline, which is how the health check gets its own sub-deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::Error;

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a child that is cancelled with the parent and expires no later
    /// than `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<(), Error> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes or the context ends, whichever comes first.
    ///
    /// ```
    /// # tokio_test::block_on(async {
    /// use llm_relay::{CallContext, ErrorKind};
    ///
    /// let ctx = CallContext::new();
    /// assert_eq!(ctx.run(async { 4 }).await.unwrap(), 4);
    ///
    /// ctx.cancel();
    /// let err = ctx.run(async { 4 }).await.unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::Cancelled);
    /// # })
    /// ```
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Error> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled),
            _ = wait_for(self.deadline) => Err(Error::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let out = ctx.run(async { 42 }).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_hits_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let err = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_child() {
        let parent = CallContext::new();
        let child = parent.child_with_timeout(Duration::from_secs(10));
        parent.cancel();
        assert_eq!(child.check().unwrap_err().kind(), ErrorKind::Cancelled);
        let err = child.run(std::future::pending::<()>()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_child_never_extends_parent_deadline() {
        let parent = CallContext::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let short = parent.child_with_timeout(Duration::from_millis(10));
        assert!(short.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn test_child_cancel_leaves_parent_alone() {
        let parent = CallContext::new();
        let child = parent.child_with_timeout(Duration::from_secs(1));
        child.cancel();
        assert!(parent.check().is_ok());
    }
}
