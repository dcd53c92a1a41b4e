use wot_core::{InteractionKind, ThingError};

/// Errors returned by exposed-thing operations.
///
/// Structural variants are returned synchronously, before any future
/// exists. `Handler` and `Abandoned` only ever arrive through a [`Pending`]
/// result.
///
/// [`Pending`]: crate::pending::Pending
#[derive(Debug, thiserror::Error)]
pub enum ExposedThingError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: InteractionKind, name: String },
    #[error("property is not writable: {name}")]
    NotWritable { name: String },
    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: InteractionKind, name: String },
    #[error("duplicate form {href} on interaction {interaction}")]
    DuplicateForm { interaction: String, href: String },
    #[error("invalid name {name:?}")]
    InvalidName { name: String },
    #[error("property is not observable: {name}")]
    NotObservable { name: String },
    #[error("invalid observe target: {reason}")]
    InvalidObserveTarget { reason: &'static str },
    #[error("handler failed: {0}")]
    Handler(#[from] anyhow::Error),
    #[error("handler dropped the request without responding")]
    Abandoned,
    #[error("write queue for property {name} is full")]
    Overloaded { name: String },
    #[error("thing {id} is no longer exposed")]
    NotExposed { id: String },
    #[error("a thing with id {id} is already exposed")]
    DuplicateThing { id: String },
    #[error("no exposed thing named {name}")]
    UnknownThing { name: String },
}

impl ExposedThingError {
    pub(crate) fn not_found(kind: InteractionKind, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }
}

impl From<ThingError> for ExposedThingError {
    fn from(err: ThingError) -> Self {
        match err {
            ThingError::InvalidName { name } => Self::InvalidName { name },
            ThingError::DuplicateName { kind, name } => Self::DuplicateName { kind, name },
            ThingError::DuplicateForm { interaction, href } => {
                Self::DuplicateForm { interaction, href }
            }
        }
    }
}
