//! Per-request execution state.
//!
//! A [`Context`] is created by the host for exactly one in-flight request and dropped when the
//! request completes. It carries the request deadline, a cancellation signal and the tracing span
//! the endpoint executes in.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;

#[derive(Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    span: Span,
}

impl Context {
    /// Creates a context with no deadline and its own cancellation signal.
    pub fn new() -> Self {
        Self { token: CancellationToken::new(), deadline: None, span: Span::none() }
    }

    /// Creates a context that is cancelled whenever `parent` is.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self { token: parent.child_token(), deadline: None, span: Span::none() }
    }

    /// Narrows the deadline to at most `timeout` from now. A deadline never extends.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.narrow_timeout(timeout);
        self
    }

    /// A timeout too large to represent as a deadline leaves the current deadline unchanged.
    pub(crate) fn narrow_timeout(&mut self, timeout: Duration) {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return;
        };
        self.deadline = Some(match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        });
    }

    pub(crate) fn attach_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The span of the endpoint execution this context belongs to.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Cancels the request. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns `true` while the request has been neither cancelled nor timed out.
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && !self.is_expired()
    }

    /// Completes once the request is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// A token that is cancelled along with this context, for work spawned on behalf of the request.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
