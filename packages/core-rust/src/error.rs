use crate::types::InteractionKind;

/// Errors raised while building or mutating a Thing's interaction model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThingError {
    #[error("invalid name {name:?}: only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidName { name: String },
    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: InteractionKind, name: String },
    #[error("duplicate form {href} on interaction {interaction}")]
    DuplicateForm { interaction: String, href: String },
}
