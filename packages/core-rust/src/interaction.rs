//! Property, Action and Event definitions.
//!
//! All three share [`InteractionMeta`] (name, forms, semantic annotations,
//! owning Thing) and are reached generically through the [`Interaction`]
//! trait. Two definitions are equal when they belong to the same Thing and
//! share a name.

use std::hash::{Hash, Hasher};

use crate::action::ActionBehavior;
use crate::error::ThingError;
use crate::form::Form;
use crate::name::{clean_name, url_name};
use crate::schema::DataSchema;
use crate::semantic::{SemanticMetadata, SemanticTypes};
use crate::types::{InteractionKind, ThingId};

/// Fields common to every interaction.
#[derive(Debug, Clone)]
pub struct InteractionMeta {
    thing: Option<ThingId>,
    name: String,
    title: Option<String>,
    description: Option<String>,
    forms: Vec<Form>,
    semantic_types: SemanticTypes,
    metadata: SemanticMetadata,
}

impl InteractionMeta {
    fn new(name: &str) -> Result<Self, ThingError> {
        Ok(Self {
            thing: None,
            name: clean_name(name)?,
            title: None,
            description: None,
            forms: Vec::new(),
            semantic_types: SemanticTypes::default(),
            metadata: SemanticMetadata::default(),
        })
    }
}

/// Behaviour shared by all interaction definitions.
pub trait Interaction {
    /// Namespace this definition lives in.
    const KIND: InteractionKind;

    fn meta(&self) -> &InteractionMeta;

    fn meta_mut(&mut self) -> &mut InteractionMeta;

    fn name(&self) -> &str {
        &self.meta().name
    }

    /// URL-safe version of the name.
    fn url_name(&self) -> String {
        url_name(&self.meta().name)
    }

    /// Owning Thing, set once the definition is added to one.
    fn thing_id(&self) -> Option<&ThingId> {
        self.meta().thing.as_ref()
    }

    fn title(&self) -> Option<&str> {
        self.meta().title.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.meta().description.as_deref()
    }

    /// Forms in insertion order.
    fn forms(&self) -> &[Form] {
        &self.meta().forms
    }

    /// Appends a form.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::DuplicateForm`] if an equal form is already
    /// attached.
    fn add_form(&mut self, form: Form) -> Result<(), ThingError> {
        let meta = self.meta_mut();
        if meta.forms.contains(&form) {
            return Err(ThingError::DuplicateForm {
                interaction: meta.name.clone(),
                href: form.href,
            });
        }
        meta.forms.push(form);
        Ok(())
    }

    /// Removes a form. Returns `false` when it was not attached.
    fn remove_form(&mut self, form: &Form) -> bool {
        let forms = &mut self.meta_mut().forms;
        match forms.iter().position(|f| f == form) {
            Some(idx) => {
                forms.remove(idx);
                true
            }
            None => false,
        }
    }

    fn semantic_types(&self) -> &SemanticTypes {
        &self.meta().semantic_types
    }

    fn semantic_types_mut(&mut self) -> &mut SemanticTypes {
        &mut self.meta_mut().semantic_types
    }

    fn semantic_metadata(&self) -> &SemanticMetadata {
        &self.meta().metadata
    }

    fn semantic_metadata_mut(&mut self) -> &mut SemanticMetadata {
        &mut self.meta_mut().metadata
    }

    /// Binds the definition to its owning Thing.
    #[doc(hidden)]
    fn bind(&mut self, thing: ThingId) {
        self.meta_mut().thing = Some(thing);
    }

    /// Returns `true` if `name` is this definition's name or its URL-safe form.
    fn matches_name(&self, name: &str) -> bool {
        self.name() == name || self.url_name() == name
    }
}

/// Implements the shared trait, identity semantics and annotation builders.
macro_rules! interaction_common {
    ($ty:ident, $kind:expr) => {
        impl Interaction for $ty {
            const KIND: InteractionKind = $kind;

            fn meta(&self) -> &InteractionMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut InteractionMeta {
                &mut self.meta
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.meta.thing == other.meta.thing && self.meta.name == other.meta.name
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.meta.thing.hash(state);
                self.meta.name.hash(state);
            }
        }

        impl $ty {
            /// Sets the human-readable title.
            #[must_use]
            pub fn with_title(mut self, title: impl Into<String>) -> Self {
                self.meta.title = Some(title.into());
                self
            }

            /// Sets the description.
            #[must_use]
            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.meta.description = Some(description.into());
                self
            }

            /// Adds a semantic type URI.
            #[must_use]
            pub fn with_semantic_type(mut self, uri: impl Into<String>) -> Self {
                self.meta.semantic_types.add(uri);
                self
            }

            /// Adds a semantic metadata item.
            #[must_use]
            pub fn with_metadata(
                mut self,
                key: impl Into<String>,
                value: impl Into<crate::types::Value>,
            ) -> Self {
                self.meta.metadata.add(key, value);
                self
            }
        }
    };
}

/// Readable and optionally writable/observable state.
#[derive(Debug, Clone)]
pub struct Property {
    meta: InteractionMeta,
    schema: DataSchema,
    observable: bool,
    writable: bool,
}

impl Property {
    /// Creates a read-only, non-observable property.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::InvalidName`] if `name` is not a safe name.
    pub fn new(name: &str, schema: DataSchema) -> Result<Self, ThingError> {
        Ok(Self {
            meta: InteractionMeta::new(name)?,
            schema,
            observable: false,
            writable: false,
        })
    }

    #[must_use]
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    #[must_use]
    pub fn observable(mut self, observable: bool) -> Self {
        self.observable = observable;
        self
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    #[must_use]
    pub fn is_observable(&self) -> bool {
        self.observable
    }

    #[must_use]
    pub fn schema(&self) -> &DataSchema {
        &self.schema
    }
}

interaction_common!(Property, InteractionKind::Property);

/// A process that takes time to complete and may return a value.
#[derive(Debug, Clone)]
pub struct Action {
    meta: InteractionMeta,
    input: Option<DataSchema>,
    output: Option<DataSchema>,
    behavior: Option<ActionBehavior>,
}

impl Action {
    /// Creates an action with no schemas and no invocation function.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::InvalidName`] if `name` is not a safe name.
    pub fn new(name: &str) -> Result<Self, ThingError> {
        Ok(Self {
            meta: InteractionMeta::new(name)?,
            input: None,
            output: None,
            behavior: None,
        })
    }

    #[must_use]
    pub fn with_input(mut self, schema: DataSchema) -> Self {
        self.input = Some(schema);
        self
    }

    #[must_use]
    pub fn with_output(mut self, schema: DataSchema) -> Self {
        self.output = Some(schema);
        self
    }

    /// Sets the function run when no custom invoke handler applies.
    #[must_use]
    pub fn with_behavior(mut self, behavior: ActionBehavior) -> Self {
        self.behavior = Some(behavior);
        self
    }

    #[must_use]
    pub fn input(&self) -> Option<&DataSchema> {
        self.input.as_ref()
    }

    #[must_use]
    pub fn output(&self) -> Option<&DataSchema> {
        self.output.as_ref()
    }

    #[must_use]
    pub fn behavior(&self) -> Option<&ActionBehavior> {
        self.behavior.as_ref()
    }
}

interaction_common!(Action, InteractionKind::Action);

/// A notification source with a payload schema.
#[derive(Debug, Clone)]
pub struct Event {
    meta: InteractionMeta,
    schema: DataSchema,
}

impl Event {
    /// Creates an event definition.
    ///
    /// # Errors
    ///
    /// Returns [`ThingError::InvalidName`] if `name` is not a safe name.
    pub fn new(name: &str, schema: DataSchema) -> Result<Self, ThingError> {
        Ok(Self {
            meta: InteractionMeta::new(name)?,
            schema,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &DataSchema {
        &self.schema
    }
}

interaction_common!(Event, InteractionKind::Event);
