//! Change notifications published on the change bus and the stream keys
//! subscribers filter on.

use serde::{Deserialize, Serialize};
use wot_core::{InteractionKind, Value};

/// Which family of notifications a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestType {
    Property,
    Action,
    Event,
    Td,
}

/// Structural change applied to the interaction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TdChangeMethod {
    Add,
    Remove,
}

/// Payload of a TD change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TdChange {
    pub change_type: InteractionKind,
    pub method: TdChangeMethod,
    pub name: String,
}

/// Immutable record delivered to every matching subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeNotification {
    /// A property was written; carries the written value.
    PropertyChange { name: String, value: Value },
    /// An action invocation completed successfully.
    ActionInvocation { name: String, result: Value },
    /// An event was emitted.
    EventEmission { name: String, payload: Value },
    /// A property, action or event was added or removed.
    TdChange(TdChange),
}

impl ChangeNotification {
    /// The stream this notification is published on.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        match self {
            Self::PropertyChange { name, .. } => StreamKey::property(name),
            Self::ActionInvocation { name, .. } => StreamKey::action(name),
            Self::EventEmission { name, .. } => StreamKey::event(name),
            Self::TdChange(_) => StreamKey::td(),
        }
    }
}

/// Subscription filter: request type plus interaction name (`None` for the
/// thing-wide TD stream).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub request_type: RequestType,
    pub name: Option<String>,
}

impl StreamKey {
    #[must_use]
    pub fn property(name: &str) -> Self {
        Self::named(RequestType::Property, name)
    }

    #[must_use]
    pub fn action(name: &str) -> Self {
        Self::named(RequestType::Action, name)
    }

    #[must_use]
    pub fn event(name: &str) -> Self {
        Self::named(RequestType::Event, name)
    }

    #[must_use]
    pub fn td() -> Self {
        Self {
            request_type: RequestType::Td,
            name: None,
        }
    }

    fn named(request_type: RequestType, name: &str) -> Self {
        Self {
            request_type,
            name: Some(name.to_string()),
        }
    }
}
