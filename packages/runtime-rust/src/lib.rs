//! Exposed-thing runtime: property reads and writes, action invocation and
//! event emission dispatched to default or custom handlers, with change
//! notifications delivered to observers.

pub mod bus;
pub mod config;
pub mod error;
pub mod exposed;
pub mod group;
pub mod handler;
pub mod notification;
pub mod pending;
pub mod request;
pub mod worker;

pub use bus::{ChangeBus, NotificationStream, ObservableStream, Subscription};
pub use config::RuntimeConfig;
pub use error::ExposedThingError;
pub use exposed::ExposedThing;
pub use group::ExposedThingGroup;
pub use handler::{HandlerKind, RequestHandler};
pub use notification::{ChangeNotification, RequestType, StreamKey, TdChange, TdChangeMethod};
pub use pending::Pending;
pub use request::{Request, RequestPayload};
