//! Protocol-binding descriptors attached to interactions.

use serde::{Deserialize, Serialize};

/// Content type assumed when a form does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Protocol a form is served over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Coap,
    Mqtt,
    WebSocket,
}

/// Operation a form allows clients to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormOperation {
    ReadProperty,
    WriteProperty,
    ObserveProperty,
    InvokeAction,
    SubscribeEvent,
}

/// Communication metadata telling a client where and how an interaction is
/// reachable. Two forms with equal fields are the same form; an interaction
/// never holds duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub protocol: Protocol,
    pub href: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub op: Vec<FormOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

impl Form {
    /// Creates a form with the default content type and no operations.
    #[must_use]
    pub fn new(protocol: Protocol, href: impl Into<String>) -> Self {
        Self {
            protocol,
            href: href.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            op: Vec::new(),
            rel: None,
        }
    }

    /// Overrides the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Adds an allowed operation (ignored if already present).
    #[must_use]
    pub fn with_op(mut self, op: FormOperation) -> Self {
        if !self.op.contains(&op) {
            self.op.push(op);
        }
        self
    }

    /// Sets the link relation.
    #[must_use]
    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel = Some(rel.into());
        self
    }
}
