//! The request/response protocol between the dispatcher and custom handlers.
//!
//! A handler receives an owned [`Request`] and completes it exactly once with
//! [`Request::respond`] or [`Request::respond_with_error`]. It may do so
//! synchronously inside the handler call or later from any thread or task.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;
use wot_core::{ActionArgs, Value};

use crate::error::ExposedThingError;
use crate::notification::RequestType;
use crate::pending::{Completion, Pending};

/// Operation-specific data carried by a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    /// Property read; carries nothing.
    Retrieve,
    /// Property write with the value being written.
    Update { value: Value },
    /// Action invocation with its keyword arguments.
    Invoke { args: ActionArgs },
}

/// A single dispatched operation awaiting its handler's response.
pub struct Request {
    id: Uuid,
    name: String,
    payload: RequestPayload,
    responder: Mutex<Option<Completion<Value>>>,
}

impl Request {
    pub(crate) fn new(name: &str, payload: RequestPayload) -> (Self, Pending<Value>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            payload,
            responder: Mutex::new(Some(tx)),
        };
        (request, Pending::from_receiver(rx))
    }

    /// Unique id of this request.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn request_type(&self) -> RequestType {
        match self.payload {
            RequestPayload::Retrieve | RequestPayload::Update { .. } => RequestType::Property,
            RequestPayload::Invoke { .. } => RequestType::Action,
        }
    }

    /// Canonical name of the target interaction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// Value being written, for property updates.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            RequestPayload::Update { value } => Some(value),
            _ => None,
        }
    }

    /// Invocation arguments, for actions.
    #[must_use]
    pub fn args(&self) -> Option<&ActionArgs> {
        match &self.payload {
            RequestPayload::Invoke { args } => Some(args),
            _ => None,
        }
    }

    /// Whether a response has already been delivered.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.responder.lock().is_none()
    }

    /// Completes the request successfully. Returns `false` if it had already
    /// been completed, in which case `value` is discarded.
    pub fn respond(&self, value: impl Into<Value>) -> bool {
        self.complete(Ok(value.into()))
    }

    /// Completes the request with a handler failure. Returns `false` if it
    /// had already been completed.
    pub fn respond_with_error(&self, error: impl Into<anyhow::Error>) -> bool {
        self.complete(Err(ExposedThingError::Handler(error.into())))
    }

    fn complete(&self, outcome: Result<Value, ExposedThingError>) -> bool {
        let Some(tx) = self.responder.lock().take() else {
            debug!(request_id = %self.id, name = %self.name, "ignoring response to completed request");
            return false;
        };
        // The caller may have stopped waiting; that is not an error here.
        let _ = tx.send(outcome);
        true
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if self.responder.get_mut().is_some() {
            warn!(request_id = %self.id, name = %self.name, "request dropped without a response");
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("payload", &self.payload)
            .field("completed", &self.is_completed())
            .finish()
    }
}
