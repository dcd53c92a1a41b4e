use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::ExposedThingError;

/// Outcome slot shared between a dispatch and its `Pending` result.
pub(crate) type Completion<T> = oneshot::Sender<Result<T, ExposedThingError>>;

/// Deferred result of a property read, property write or action invocation.
///
/// Resolves once the responsible handler completes. If the completing side
/// is dropped first, the result is [`ExposedThingError::Abandoned`].
#[must_use = "a pending result does nothing unless awaited"]
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, ExposedThingError>>,
}

impl<T> Pending<T> {
    /// Creates a completion sender and the result that observes it.
    pub(crate) fn channel() -> (Completion<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A result that is already settled.
    pub(crate) fn ready(result: Result<T, ExposedThingError>) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(result);
        pending
    }

    pub(crate) fn from_receiver(rx: oneshot::Receiver<Result<T, ExposedThingError>>) -> Self {
        Self { rx }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, ExposedThingError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ExposedThingError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
