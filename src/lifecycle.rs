//! Request-scoped deadline and cancellation tracking
//!
//! A [`RequestContext`] is attached to every request by the timeout
//! middleware and handed to each catalog operation. Operations run to
//! completion regardless of its state; the context is consulted only before a
//! successful result is delivered, so a client that has given up never
//! receives stale work.

use std::time::Duration;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// Observed state of a request at a given moment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    DeadlineExceeded,
    Canceled,
}

/// Per-request deadline plus cancellation token
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Context expiring after `timeout`, canceled along with `parent`
    pub fn new(timeout: Duration, parent: &CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel: parent.child_token(),
        }
    }

    /// Context with no parent token
    pub fn detached(timeout: Duration) -> Self {
        Self::new(timeout, &CancellationToken::new())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A deadline that has passed wins over cancellation
    pub fn state(&self) -> Lifecycle {
        if Instant::now() >= self.deadline {
            Lifecycle::DeadlineExceeded
        } else if self.cancel.is_cancelled() {
            Lifecycle::Canceled
        } else {
            Lifecycle::Active
        }
    }

    pub fn check(&self) -> AppResult<()> {
        match self.state() {
            Lifecycle::Active => Ok(()),
            Lifecycle::DeadlineExceeded => Err(AppError::Timeout),
            Lifecycle::Canceled => Err(AppError::Canceled),
        }
    }

    /// Hand back `value` only if the request is still live
    pub fn deliver<T>(&self, value: T) -> AppResult<T> {
        self.check()?;
        Ok(value)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal("request context missing".to_string()))
    }
}
