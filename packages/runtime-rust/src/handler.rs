//! Handler slots consulted by the dispatcher.
//!
//! Each operation kind has one thing-wide slot holding either the built-in
//! default or a custom handler. A handler installed for a single interaction
//! takes precedence over the thing-wide slot.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use wot_core::InteractionKind;

use crate::request::Request;

/// A custom handler. Receives the request and must eventually respond to it.
pub type RequestHandler = Arc<dyn Fn(Request) + Send + Sync>;

/// The three overridable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    RetrieveProperty,
    UpdateProperty,
    InvokeAction,
}

impl HandlerKind {
    /// The interaction namespace this kind of handler applies to.
    #[must_use]
    pub fn interaction_kind(self) -> InteractionKind {
        match self {
            Self::RetrieveProperty | Self::UpdateProperty => InteractionKind::Property,
            Self::InvokeAction => InteractionKind::Action,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::RetrieveProperty => 0,
            Self::UpdateProperty => 1,
            Self::InvokeAction => 2,
        }
    }
}

/// The handler that will serve a request.
#[derive(Clone)]
pub enum HandlerSlot {
    /// Built-in behaviour for the operation.
    Default,
    Custom(RequestHandler),
}

impl HandlerSlot {
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Thing-wide and per-interaction handler bindings.
///
/// Thing-wide slots are swapped atomically, so a dispatch in flight keeps the
/// handler it resolved while a replacement only affects later dispatches.
pub struct HandlerRegistry {
    global: [ArcSwap<HandlerSlot>; 3],
    scoped: DashMap<(HandlerKind, String), RequestHandler>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: std::array::from_fn(|_| ArcSwap::from_pointee(HandlerSlot::Default)),
            scoped: DashMap::new(),
        }
    }

    /// Replaces the thing-wide handler for `kind`.
    pub fn install(&self, kind: HandlerKind, handler: RequestHandler) {
        self.global[kind.index()].store(Arc::new(HandlerSlot::Custom(handler)));
    }

    /// Restores the built-in handler for `kind`.
    pub fn clear(&self, kind: HandlerKind) {
        self.global[kind.index()].store(Arc::new(HandlerSlot::Default));
    }

    /// Binds a handler to one interaction.
    pub fn install_scoped(&self, kind: HandlerKind, name: &str, handler: RequestHandler) {
        self.scoped.insert((kind, name.to_string()), handler);
    }

    /// Removes a per-interaction binding. Returns `true` if one existed.
    pub fn clear_scoped(&self, kind: HandlerKind, name: &str) -> bool {
        self.scoped.remove(&(kind, name.to_string())).is_some()
    }

    /// Drops every per-interaction binding of a removed interaction.
    pub fn clear_interaction(&self, interaction: InteractionKind, name: &str) {
        self.scoped
            .retain(|(kind, bound), _| kind.interaction_kind() != interaction || bound != name);
    }

    /// Resolves the handler serving `kind` on interaction `name`.
    #[must_use]
    pub fn resolve(&self, kind: HandlerKind, name: &str) -> HandlerSlot {
        if let Some(handler) = self.scoped.get(&(kind, name.to_string())) {
            return HandlerSlot::Custom(Arc::clone(handler.value()));
        }
        HandlerSlot::clone(&self.global[kind.index()].load())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("scoped", &self.scoped.len())
            .finish_non_exhaustive()
    }
}
