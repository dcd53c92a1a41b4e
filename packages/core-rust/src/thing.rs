//! The Thing: identity plus three insertion-ordered interaction namespaces.

use tracing::debug;

use crate::error::ThingError;
use crate::interaction::{Action, Event, Interaction, Property};
use crate::name::{clean_name, url_name};
use crate::semantic::{SemanticMetadata, SemanticTypes};
use crate::types::{InteractionKind, ThingId};

/// A physical or virtual entity described by its properties, actions and
/// events.
///
/// Names are unique within a namespace but may repeat across namespaces
/// (a property and an event can both be called `alarm`). Two names whose
/// URL-safe forms coincide count as duplicates, so a lookup by either the
/// exact name or the URL-safe form finds at most one interaction.
#[derive(Debug, Clone)]
pub struct Thing {
    id: ThingId,
    title: Option<String>,
    description: Option<String>,
    properties: Vec<Property>,
    actions: Vec<Action>,
    events: Vec<Event>,
    semantic_types: SemanticTypes,
    metadata: SemanticMetadata,
}

fn position<T: Interaction>(items: &[T], name: &str) -> Option<usize> {
    items.iter().position(|item| item.matches_name(name))
}

fn insert<T: Interaction>(
    thing: &ThingId,
    items: &mut Vec<T>,
    mut item: T,
) -> Result<(), ThingError> {
    let url = item.url_name();
    if items.iter().any(|existing| existing.url_name() == url) {
        return Err(ThingError::DuplicateName {
            kind: T::KIND,
            name: item.name().to_string(),
        });
    }
    debug!(thing = %thing, kind = %T::KIND, name = item.name(), "interaction registered");
    item.bind(thing.clone());
    items.push(item);
    Ok(())
}

fn take<T: Interaction>(items: &mut Vec<T>, name: &str) -> Option<T> {
    let removed = position(items, name).map(|idx| items.remove(idx))?;
    debug!(kind = %T::KIND, name = removed.name(), "interaction unregistered");
    Some(removed)
}

impl Thing {
    /// Creates an empty Thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::InvalidName`] if `id` is not a safe name.
    pub fn new(id: &str) -> Result<Self, ThingError> {
        Ok(Self {
            id: ThingId::from(clean_name(id)?.as_str()),
            title: None,
            description: None,
            properties: Vec::new(),
            actions: Vec::new(),
            events: Vec::new(),
            semantic_types: SemanticTypes::default(),
            metadata: SemanticMetadata::default(),
        })
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &ThingId {
        &self.id
    }

    /// URL-safe version of the id.
    #[must_use]
    pub fn url_name(&self) -> String {
        url_name(self.id.as_str())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn semantic_types(&self) -> &SemanticTypes {
        &self.semantic_types
    }

    pub fn semantic_types_mut(&mut self) -> &mut SemanticTypes {
        &mut self.semantic_types
    }

    #[must_use]
    pub fn semantic_metadata(&self) -> &SemanticMetadata {
        &self.metadata
    }

    pub fn semantic_metadata_mut(&mut self) -> &mut SemanticMetadata {
        &mut self.metadata
    }

    // --- properties ---

    /// Registers a property and binds it to this Thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::DuplicateName`] if a property with the same name
    /// already exists.
    pub fn add_property(&mut self, property: Property) -> Result<(), ThingError> {
        insert(&self.id, &mut self.properties, property)
    }

    /// Unregisters a property, returning it if it existed.
    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        take(&mut self.properties, name)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        position(&self.properties, name).map(|idx| &self.properties[idx])
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        position(&self.properties, name).map(move |idx| &mut self.properties[idx])
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    // --- actions ---

    /// Registers an action and binds it to this Thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::DuplicateName`] if an action with the same name
    /// already exists.
    pub fn add_action(&mut self, action: Action) -> Result<(), ThingError> {
        insert(&self.id, &mut self.actions, action)
    }

    /// Unregisters an action, returning it if it existed.
    pub fn remove_action(&mut self, name: &str) -> Option<Action> {
        take(&mut self.actions, name)
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        position(&self.actions, name).map(|idx| &self.actions[idx])
    }

    pub fn action_mut(&mut self, name: &str) -> Option<&mut Action> {
        position(&self.actions, name).map(move |idx| &mut self.actions[idx])
    }

    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    // --- events ---

    /// Registers an event and binds it to this Thing.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::DuplicateName`] if an event with the same name
    /// already exists.
    pub fn add_event(&mut self, event: Event) -> Result<(), ThingError> {
        insert(&self.id, &mut self.events, event)
    }

    /// Unregisters an event, returning it if it existed.
    pub fn remove_event(&mut self, name: &str) -> Option<Event> {
        take(&mut self.events, name)
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Event> {
        position(&self.events, name).map(|idx| &self.events[idx])
    }

    pub fn event_mut(&mut self, name: &str) -> Option<&mut Event> {
        position(&self.events, name).map(move |idx| &mut self.events[idx])
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Resolves `name` in the given namespace to its canonical name.
    #[must_use]
    pub fn resolve_name(&self, kind: InteractionKind, name: &str) -> Option<&str> {
        match kind {
            InteractionKind::Property => self.property(name).map(Interaction::name),
            InteractionKind::Action => self.action(name).map(Interaction::name),
            InteractionKind::Event => self.event(name).map(Interaction::name),
        }
    }

    /// Returns `true` if the namespace holds an interaction called `name`.
    #[must_use]
    pub fn contains(&self, kind: InteractionKind, name: &str) -> bool {
        self.resolve_name(kind, name).is_some()
    }
}
