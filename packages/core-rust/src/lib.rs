//! Thing model: interaction definitions, forms, data schemas, semantic
//! annotations and the value type shared with the runtime.

pub mod action;
pub mod error;
pub mod form;
pub mod interaction;
pub mod name;
pub mod schema;
pub mod semantic;
pub mod thing;
pub mod types;

pub use action::{ActionBehavior, BoxFuture};
pub use error::ThingError;
pub use form::{Form, FormOperation, Protocol, DEFAULT_CONTENT_TYPE};
pub use interaction::{Action, Event, Interaction, InteractionMeta, Property};
pub use schema::{DataSchema, DataType};
pub use semantic::{SemanticMetadata, SemanticTypes};
pub use thing::Thing;
pub use types::{ActionArgs, InteractionKind, ThingId, Value};
