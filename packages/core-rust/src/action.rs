//! Invocation functions backing actions.
//!
//! An action declares at registration time whether its function answers
//! immediately or hands back a future, so the dispatcher can branch on the
//! declared variant instead of inspecting return values.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::types::{ActionArgs, Value};

/// Boxed, sendable future used for deferred action results.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type ImmediateFn = dyn Fn(ActionArgs) -> anyhow::Result<Value> + Send + Sync;
type DeferredFn = dyn Fn(ActionArgs) -> BoxFuture<anyhow::Result<Value>> + Send + Sync;

/// The function that runs when an action is invoked without a custom handler.
#[derive(Clone)]
pub enum ActionBehavior {
    /// Computes the result on the invoking thread.
    Immediate(Arc<ImmediateFn>),
    /// Returns a future that is driven on the runtime until it resolves.
    Deferred(Arc<DeferredFn>),
}

impl ActionBehavior {
    /// Wraps a function that returns its result directly.
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(ActionArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Immediate(Arc::new(f))
    }

    /// Wraps a function that returns a future of its result.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Deferred(Arc::new(move |args: ActionArgs| -> BoxFuture<anyhow::Result<Value>> {
            Box::pin(f(args))
        }))
    }

    /// Returns `true` for the deferred variant.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl fmt::Debug for ActionBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(_) => f.write_str("ActionBehavior::Immediate"),
            Self::Deferred(_) => f.write_str("ActionBehavior::Deferred"),
        }
    }
}
