//! The exposed-thing dispatcher.
//!
//! [`ExposedThing`] wraps a [`Thing`] definition with runtime state: the
//! property value store, handler bindings, the change bus and one serial
//! writer per written property. Dispatch calls validate synchronously and
//! hand back a [`Pending`] result that resolves once the responsible handler
//! completes. Custom handlers and immediate actions run on the runtime's
//! blocking pool, never on the caller's thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use wot_core::{
    Action, ActionArgs, ActionBehavior, BoxFuture, Event, Form, Interaction, InteractionKind,
    Property, Thing, ThingId, Value,
};

use crate::bus::{ChangeBus, ObservableStream};
use crate::config::RuntimeConfig;
use crate::error::ExposedThingError;
use crate::handler::{HandlerKind, HandlerRegistry, HandlerSlot, RequestHandler};
use crate::notification::{ChangeNotification, RequestType, StreamKey, TdChange, TdChangeMethod};
use crate::pending::Pending;
use crate::request::{Request, RequestPayload};
use crate::worker::{SerialWorker, SubmitError};

/// A Thing exposed for interaction.
///
/// Cheap to clone; clones share the same runtime state.
#[derive(Clone)]
pub struct ExposedThing {
    inner: Arc<Inner>,
}

struct Inner {
    id: ThingId,
    thing: RwLock<Thing>,
    values: DashMap<String, Value>,
    handlers: HandlerRegistry,
    bus: Arc<ChangeBus>,
    writers: DashMap<String, SerialWorker>,
    // Bumped whenever a property name is added or removed, so a write issued
    // against an earlier definition can tell it is stale.
    epochs: DashMap<String, u64>,
    next_epoch: AtomicU64,
    runtime: Handle,
    config: RuntimeConfig,
    exposed: AtomicBool,
}

impl ExposedThing {
    /// Exposes `thing` with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn new(thing: Thing) -> Self {
        Self::with_config(thing, RuntimeConfig::default())
    }

    /// Exposes `thing` with `config`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn with_config(thing: Thing, config: RuntimeConfig) -> Self {
        Self::with_handle(thing, config, Handle::current())
    }

    /// Exposes `thing`, running writers and deferred actions on `runtime`.
    #[must_use]
    pub fn with_handle(thing: Thing, config: RuntimeConfig, runtime: Handle) -> Self {
        let id = thing.id().clone();
        info!(
            thing = %id,
            properties = thing.properties().len(),
            actions = thing.actions().len(),
            events = thing.events().len(),
            "thing exposed"
        );
        Self {
            inner: Arc::new(Inner {
                id,
                thing: RwLock::new(thing),
                values: DashMap::new(),
                handlers: HandlerRegistry::new(),
                bus: ChangeBus::new(),
                writers: DashMap::new(),
                epochs: DashMap::new(),
                next_epoch: AtomicU64::new(0),
                runtime,
                config,
                exposed: AtomicBool::new(true),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ThingId {
        &self.inner.id
    }

    #[must_use]
    pub fn url_name(&self) -> String {
        wot_core::name::url_name(self.inner.id.as_str())
    }

    /// Snapshot of the current definition.
    #[must_use]
    pub fn thing(&self) -> Thing {
        self.inner.thing.read().clone()
    }

    /// Runs `f` against the current definition without cloning it.
    pub fn with_thing<R>(&self, f: impl FnOnce(&Thing) -> R) -> R {
        f(&self.inner.thing.read())
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_exposed(&self) -> bool {
        self.inner.exposed.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles share the same runtime state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Ends the exposure. Every subscription is disposed, property writers
    /// drain and stop, and later calls fail with `NotExposed`.
    pub fn destroy(&self) {
        if !self.inner.exposed.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.bus.clear();
        self.inner.writers.clear();
        info!(thing = %self.inner.id, "thing exposure ended");
    }

    // -- dispatch ----------------------------------------------------------

    /// Reads a property through its retrieve handler.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown property, `NotExposed` after `destroy`.
    pub fn get_property(&self, name: &str) -> Result<Pending<Value>, ExposedThingError> {
        self.ensure_exposed()?;
        let name = self.canonical_name(InteractionKind::Property, name)?;
        let span = self.dispatch_span("get_property", &name);
        let _entered = span.enter();

        match self.inner.handlers.resolve(HandlerKind::RetrieveProperty, &name) {
            HandlerSlot::Default => {
                let started = Instant::now();
                let value = self
                    .inner
                    .values
                    .get(&name)
                    .map(|entry| entry.value().clone())
                    .unwrap_or_default();
                let result = Ok(value);
                record_outcome(&span, started, &result);
                Ok(Pending::ready(result))
            }
            HandlerSlot::Custom(handler) => {
                let (request, pending) = Request::new(&name, RequestPayload::Retrieve);
                debug!(request_id = %request.id(), "dispatching to custom retrieve handler");
                self.inner.run_handler(span.clone(), handler, request);
                Ok(pending)
            }
        }
    }

    /// Writes a property through its update handler.
    ///
    /// Writes to one property are applied in the order they are issued. The
    /// returned result completes after the value is stored and the change is
    /// delivered to every current observer.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown property, `NotWritable` for a read-only one,
    /// `Overloaded` when the property's write queue is full, `NotExposed`
    /// after `destroy`.
    pub fn set_property(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<Pending<()>, ExposedThingError> {
        self.ensure_exposed()?;
        let (name, observable, epoch) = {
            let thing = self.inner.thing.read();
            let property = thing
                .property(name)
                .ok_or_else(|| ExposedThingError::not_found(InteractionKind::Property, name))?;
            if !property.is_writable() {
                return Err(ExposedThingError::NotWritable {
                    name: property.name().to_string(),
                });
            }
            let name = property.name().to_string();
            let epoch = self.inner.epoch(&name);
            (name, property.is_observable(), epoch)
        };
        let handler = self.inner.handlers.resolve(HandlerKind::UpdateProperty, &name);
        let value = value.into();

        let (completion, pending) = Pending::channel();
        let inner = Arc::clone(&self.inner);
        let property = name.clone();
        let job = async move {
            let started = Instant::now();
            let result = inner
                .apply_write(&property, epoch, value, observable, handler)
                .await;
            record_outcome(&Span::current(), started, &result);
            let _ = completion.send(result);
        }
        .instrument(self.dispatch_span("set_property", &name));

        self.inner
            .writer(&name)
            .try_submit(Box::pin(job))
            .map_err(|err| match err {
                SubmitError::Full => {
                    warn!(thing = %self.inner.id, property = %name, "property write queue full");
                    ExposedThingError::Overloaded { name: name.clone() }
                }
                SubmitError::Closed => self.inner.not_exposed(),
            })?;
        Ok(pending)
    }

    /// Invokes an action through its invoke handler.
    ///
    /// A successful invocation is published to the action's observers before
    /// the returned result resolves.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown action, `NotExposed` after `destroy`.
    pub fn invoke_action(
        &self,
        name: &str,
        args: ActionArgs,
    ) -> Result<Pending<Value>, ExposedThingError> {
        self.ensure_exposed()?;
        let (name, behavior) = {
            let thing = self.inner.thing.read();
            let action = thing
                .action(name)
                .ok_or_else(|| ExposedThingError::not_found(InteractionKind::Action, name))?;
            (action.name().to_string(), action.behavior().cloned())
        };
        let span = self.dispatch_span("invoke_action", &name);
        let started = Instant::now();

        let outcome: BoxFuture<Result<Value, ExposedThingError>> =
            match self.inner.handlers.resolve(HandlerKind::InvokeAction, &name) {
                HandlerSlot::Custom(handler) => {
                    let (request, pending) = Request::new(&name, RequestPayload::Invoke { args });
                    self.inner.run_handler(span.clone(), handler, request);
                    Box::pin(pending)
                }
                HandlerSlot::Default => match behavior {
                    Some(ActionBehavior::Deferred(run)) => {
                        let future = span.in_scope(|| run(args));
                        Box::pin(async move { future.await.map_err(ExposedThingError::Handler) })
                    }
                    Some(ActionBehavior::Immediate(run)) => {
                        let action_span = span.clone();
                        let task = self
                            .inner
                            .runtime
                            .spawn_blocking(move || action_span.in_scope(|| run(args)));
                        Box::pin(async move {
                            match task.await {
                                Ok(result) => result.map_err(ExposedThingError::Handler),
                                Err(err) => Err(ExposedThingError::Handler(anyhow::anyhow!(
                                    "action task failed: {err}"
                                ))),
                            }
                        })
                    }
                    None => {
                        let result = Err(ExposedThingError::Handler(anyhow::anyhow!(
                            "undefined action handler: {name}"
                        )));
                        record_outcome(&span, started, &result);
                        return Ok(Pending::ready(result));
                    }
                },
            };

        let (completion, pending) = Pending::channel();
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(
            async move {
                let result = inner.finish_invocation(&name, outcome.await);
                record_outcome(&Span::current(), started, &result);
                let _ = completion.send(result);
            }
            .instrument(span),
        );
        Ok(pending)
    }

    /// Publishes an event to its subscribers.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown event, `NotExposed` after `destroy`.
    pub fn emit_event(
        &self,
        name: &str,
        payload: impl Into<Value>,
    ) -> Result<(), ExposedThingError> {
        self.ensure_exposed()?;
        let name = self.canonical_name(InteractionKind::Event, name)?;
        let delivered = self.inner.bus.publish(&ChangeNotification::EventEmission {
            name: name.clone(),
            payload: payload.into(),
        });
        debug!(thing = %self.inner.id, event = %name, delivered, "event emitted");
        Ok(())
    }

    // -- handlers ----------------------------------------------------------

    /// Replaces the thing-wide property read handler.
    pub fn on_retrieve_property<F>(&self, handler: F)
    where
        F: Fn(Request) + Send + Sync + 'static,
    {
        self.install(HandlerKind::RetrieveProperty, Arc::new(handler));
    }

    /// Replaces the thing-wide property write handler.
    pub fn on_update_property<F>(&self, handler: F)
    where
        F: Fn(Request) + Send + Sync + 'static,
    {
        self.install(HandlerKind::UpdateProperty, Arc::new(handler));
    }

    /// Replaces the thing-wide action handler.
    pub fn on_invoke_action<F>(&self, handler: F)
    where
        F: Fn(Request) + Send + Sync + 'static,
    {
        self.install(HandlerKind::InvokeAction, Arc::new(handler));
    }

    /// Restores the built-in thing-wide handler for `kind`.
    pub fn clear_handler(&self, kind: HandlerKind) {
        self.inner.handlers.clear(kind);
        debug!(thing = %self.inner.id, ?kind, "handler reset to default");
    }

    /// Binds a read handler to one property.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown property, `NotExposed` after `destroy`.
    pub fn set_property_read_handler<F>(&self, name: &str, handler: F) -> Result<(), ExposedThingError>
    where
        F: Fn(Request) + Send + Sync + 'static,
    {
        self.install_scoped(HandlerKind::RetrieveProperty, name, Arc::new(handler))
    }

    /// Binds a write handler to one property.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown property, `NotExposed` after `destroy`.
    pub fn set_property_write_handler<F>(&self, name: &str, handler: F) -> Result<(), ExposedThingError>
    where
        F: Fn(Request) + Send + Sync + 'static,
    {
        self.install_scoped(HandlerKind::UpdateProperty, name, Arc::new(handler))
    }

    /// Binds an invoke handler to one action.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown action, `NotExposed` after `destroy`.
    pub fn set_action_handler<F>(&self, name: &str, handler: F) -> Result<(), ExposedThingError>
    where
        F: Fn(Request) + Send + Sync + 'static,
    {
        self.install_scoped(HandlerKind::InvokeAction, name, Arc::new(handler))
    }

    /// Removes a per-interaction handler. Returns `true` if one was bound.
    pub fn clear_interaction_handler(&self, kind: HandlerKind, name: &str) -> bool {
        let resolved = self
            .inner
            .thing
            .read()
            .resolve_name(kind.interaction_kind(), name)
            .map(str::to_string);
        resolved.is_some_and(|name| self.inner.handlers.clear_scoped(kind, &name))
    }

    fn install(&self, kind: HandlerKind, handler: RequestHandler) {
        self.inner.handlers.install(kind, handler);
        debug!(thing = %self.inner.id, ?kind, "custom handler installed");
    }

    fn install_scoped(
        &self,
        kind: HandlerKind,
        name: &str,
        handler: RequestHandler,
    ) -> Result<(), ExposedThingError> {
        self.ensure_exposed()?;
        let name = self.canonical_name(kind.interaction_kind(), name)?;
        self.inner.handlers.install_scoped(kind, &name, handler);
        debug!(thing = %self.inner.id, ?kind, interaction = %name, "scoped handler installed");
        Ok(())
    }

    // -- interaction registry ----------------------------------------------

    /// Adds a property with its initial value.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if a property with that name exists, `NotExposed`
    /// after `destroy`.
    pub fn add_property(
        &self,
        property: Property,
        initial_value: impl Into<Value>,
    ) -> Result<(), ExposedThingError> {
        self.ensure_exposed()?;
        let name = property.name().to_string();
        {
            let mut thing = self.inner.thing.write();
            thing.add_property(property)?;
            self.inner.values.insert(name.clone(), initial_value.into());
            self.inner.bump_epoch(&name);
        }
        self.publish_td_change(InteractionKind::Property, TdChangeMethod::Add, name);
        Ok(())
    }

    /// Removes a property, its stored value and its handlers. Returns the
    /// removed definition, or `None` if it was absent.
    ///
    /// # Errors
    ///
    /// `NotExposed` after `destroy`.
    pub fn remove_property(&self, name: &str) -> Result<Option<Property>, ExposedThingError> {
        self.ensure_exposed()?;
        let removed = {
            let mut thing = self.inner.thing.write();
            let removed = thing.remove_property(name);
            if let Some(property) = &removed {
                self.inner.values.remove(property.name());
                self.inner.writers.remove(property.name());
                self.inner.bump_epoch(property.name());
                self.inner
                    .handlers
                    .clear_interaction(InteractionKind::Property, property.name());
            }
            removed
        };
        if let Some(property) = &removed {
            self.publish_td_change(
                InteractionKind::Property,
                TdChangeMethod::Remove,
                property.name().to_string(),
            );
        }
        Ok(removed)
    }

    /// Adds an action.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if an action with that name exists, `NotExposed`
    /// after `destroy`.
    pub fn add_action(&self, action: Action) -> Result<(), ExposedThingError> {
        self.ensure_exposed()?;
        let name = action.name().to_string();
        self.inner.thing.write().add_action(action)?;
        self.publish_td_change(InteractionKind::Action, TdChangeMethod::Add, name);
        Ok(())
    }

    /// Removes an action and its handler. Returns the removed definition.
    ///
    /// # Errors
    ///
    /// `NotExposed` after `destroy`.
    pub fn remove_action(&self, name: &str) -> Result<Option<Action>, ExposedThingError> {
        self.ensure_exposed()?;
        let removed = {
            let mut thing = self.inner.thing.write();
            let removed = thing.remove_action(name);
            if let Some(action) = &removed {
                self.inner
                    .handlers
                    .clear_interaction(InteractionKind::Action, action.name());
            }
            removed
        };
        if let Some(action) = &removed {
            self.publish_td_change(
                InteractionKind::Action,
                TdChangeMethod::Remove,
                action.name().to_string(),
            );
        }
        Ok(removed)
    }

    /// Adds an event.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if an event with that name exists, `NotExposed`
    /// after `destroy`.
    pub fn add_event(&self, event: Event) -> Result<(), ExposedThingError> {
        self.ensure_exposed()?;
        let name = event.name().to_string();
        self.inner.thing.write().add_event(event)?;
        self.publish_td_change(InteractionKind::Event, TdChangeMethod::Add, name);
        Ok(())
    }

    /// Removes an event. Returns the removed definition.
    ///
    /// # Errors
    ///
    /// `NotExposed` after `destroy`.
    pub fn remove_event(&self, name: &str) -> Result<Option<Event>, ExposedThingError> {
        self.ensure_exposed()?;
        let removed = self.inner.thing.write().remove_event(name);
        if let Some(event) = &removed {
            self.publish_td_change(
                InteractionKind::Event,
                TdChangeMethod::Remove,
                event.name().to_string(),
            );
        }
        Ok(removed)
    }

    /// Attaches a form to an interaction. Form changes publish no TD change.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown interaction, `DuplicateForm` if an equal
    /// form is attached, `NotExposed` after `destroy`.
    pub fn add_form(
        &self,
        kind: InteractionKind,
        name: &str,
        form: Form,
    ) -> Result<(), ExposedThingError> {
        self.ensure_exposed()?;
        let mut thing = self.inner.thing.write();
        let added = match kind {
            InteractionKind::Property => thing.property_mut(name).map(|p| p.add_form(form)),
            InteractionKind::Action => thing.action_mut(name).map(|a| a.add_form(form)),
            InteractionKind::Event => thing.event_mut(name).map(|e| e.add_form(form)),
        };
        match added {
            Some(result) => result.map_err(ExposedThingError::from),
            None => Err(ExposedThingError::not_found(kind, name)),
        }
    }

    /// Detaches a form. Returns `false` if it was not attached.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown interaction, `NotExposed` after `destroy`.
    pub fn remove_form(
        &self,
        kind: InteractionKind,
        name: &str,
        form: &Form,
    ) -> Result<bool, ExposedThingError> {
        self.ensure_exposed()?;
        let mut thing = self.inner.thing.write();
        let removed = match kind {
            InteractionKind::Property => thing.property_mut(name).map(|p| p.remove_form(form)),
            InteractionKind::Action => thing.action_mut(name).map(|a| a.remove_form(form)),
            InteractionKind::Event => thing.event_mut(name).map(|e| e.remove_form(form)),
        };
        removed.ok_or_else(|| ExposedThingError::not_found(kind, name))
    }

    // -- observation -------------------------------------------------------

    /// Returns the stream of notifications for one interaction, or the TD
    /// change stream when `request_type` is [`RequestType::Td`].
    ///
    /// # Errors
    ///
    /// `InvalidObserveTarget` when a name is missing or given for the TD
    /// stream, `NotFound` for an unknown interaction, `NotObservable` for a
    /// property not marked observable, `NotExposed` after `destroy`.
    pub fn observe(
        &self,
        name: Option<&str>,
        request_type: RequestType,
    ) -> Result<ObservableStream, ExposedThingError> {
        self.ensure_exposed()?;
        let key = match (request_type, name) {
            (RequestType::Td, None) => StreamKey::td(),
            (RequestType::Td, Some(_)) => {
                return Err(ExposedThingError::InvalidObserveTarget {
                    reason: "the TD change stream takes no interaction name",
                })
            }
            (_, None) => {
                return Err(ExposedThingError::InvalidObserveTarget {
                    reason: "an interaction name is required",
                })
            }
            (RequestType::Property, Some(name)) => {
                let thing = self.inner.thing.read();
                let property = thing
                    .property(name)
                    .ok_or_else(|| ExposedThingError::not_found(InteractionKind::Property, name))?;
                if !property.is_observable() {
                    return Err(ExposedThingError::NotObservable {
                        name: property.name().to_string(),
                    });
                }
                StreamKey::property(property.name())
            }
            (RequestType::Action, Some(name)) => {
                StreamKey::action(&self.canonical_name(InteractionKind::Action, name)?)
            }
            (RequestType::Event, Some(name)) => {
                StreamKey::event(&self.canonical_name(InteractionKind::Event, name)?)
            }
        };
        Ok(ObservableStream::new(Arc::clone(&self.inner.bus), key))
    }

    /// Shorthand for `observe(Some(name), RequestType::Property)`.
    ///
    /// # Errors
    ///
    /// See [`ExposedThing::observe`].
    pub fn on_property_change(&self, name: &str) -> Result<ObservableStream, ExposedThingError> {
        self.observe(Some(name), RequestType::Property)
    }

    /// Shorthand for `observe(Some(name), RequestType::Event)`.
    ///
    /// # Errors
    ///
    /// See [`ExposedThing::observe`].
    pub fn on_event(&self, name: &str) -> Result<ObservableStream, ExposedThingError> {
        self.observe(Some(name), RequestType::Event)
    }

    /// Shorthand for `observe(Some(name), RequestType::Action)`.
    ///
    /// # Errors
    ///
    /// See [`ExposedThing::observe`].
    pub fn on_action_invocation(&self, name: &str) -> Result<ObservableStream, ExposedThingError> {
        self.observe(Some(name), RequestType::Action)
    }

    /// Shorthand for `observe(None, RequestType::Td)`.
    ///
    /// # Errors
    ///
    /// `NotExposed` after `destroy`.
    pub fn on_td_change(&self) -> Result<ObservableStream, ExposedThingError> {
        self.observe(None, RequestType::Td)
    }

    // -- helpers -----------------------------------------------------------

    fn ensure_exposed(&self) -> Result<(), ExposedThingError> {
        if self.is_exposed() {
            Ok(())
        } else {
            Err(self.inner.not_exposed())
        }
    }

    fn canonical_name(&self, kind: InteractionKind, name: &str) -> Result<String, ExposedThingError> {
        self.inner
            .thing
            .read()
            .resolve_name(kind, name)
            .map(str::to_string)
            .ok_or_else(|| ExposedThingError::not_found(kind, name))
    }

    fn publish_td_change(&self, change_type: InteractionKind, method: TdChangeMethod, name: String) {
        info!(thing = %self.inner.id, kind = %change_type, ?method, interaction = %name, "interaction set changed");
        self.inner.bus.publish(&ChangeNotification::TdChange(TdChange {
            change_type,
            method,
            name,
        }));
    }

    fn dispatch_span(&self, operation: &'static str, interaction: &str) -> Span {
        info_span!(
            "dispatch",
            thing = %self.inner.id,
            operation,
            interaction,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        )
    }
}

impl Inner {
    fn not_exposed(&self) -> ExposedThingError {
        ExposedThingError::NotExposed {
            id: self.id.to_string(),
        }
    }

    fn writer(&self, name: &str) -> SerialWorker {
        self.writers
            .entry(name.to_string())
            .or_insert_with(|| {
                SerialWorker::start(
                    &self.runtime,
                    format!("{}/{name}", self.id),
                    self.config.write_queue_capacity,
                )
            })
            .clone()
    }

    fn epoch(&self, name: &str) -> u64 {
        self.epochs.get(name).map_or(0, |epoch| *epoch)
    }

    fn bump_epoch(&self, name: &str) {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;
        self.epochs.insert(name.to_string(), epoch);
    }

    /// `true` while `name` still refers to the definition seen at `epoch`.
    fn is_current(&self, thing: &Thing, name: &str, epoch: u64) -> bool {
        thing.contains(InteractionKind::Property, name) && self.epoch(name) == epoch
    }

    fn run_handler(&self, span: Span, handler: RequestHandler, request: Request) {
        self.runtime.spawn_blocking(move || span.in_scope(|| handler(request)));
    }

    async fn apply_write(
        &self,
        name: &str,
        epoch: u64,
        value: Value,
        observable: bool,
        handler: HandlerSlot,
    ) -> Result<(), ExposedThingError> {
        if !self.exposed.load(Ordering::Acquire) {
            return Err(self.not_exposed());
        }
        let stale = || ExposedThingError::not_found(InteractionKind::Property, name);
        let changed = match handler {
            HandlerSlot::Default => {
                let thing = self.thing.read();
                if !self.is_current(&thing, name, epoch) {
                    return Err(stale());
                }
                let previous = self.values.insert(name.to_string(), value.clone());
                previous.as_ref() != Some(&value)
            }
            HandlerSlot::Custom(handler) => {
                let current = self.is_current(&self.thing.read(), name, epoch);
                if !current {
                    return Err(stale());
                }
                let (request, pending) =
                    Request::new(name, RequestPayload::Update { value: value.clone() });
                self.run_handler(Span::current(), handler, request);
                pending.await?;
                // The property may have been removed while the handler ran.
                let current = self.is_current(&self.thing.read(), name, epoch);
                if !current {
                    return Err(stale());
                }
                true
            }
        };
        if observable && (changed || self.config.publish_unchanged_values) {
            let delivered = self.bus.publish(&ChangeNotification::PropertyChange {
                name: name.to_string(),
                value,
            });
            debug!(delivered, "property change published");
        }
        Ok(())
    }

    fn finish_invocation(
        &self,
        name: &str,
        result: Result<Value, ExposedThingError>,
    ) -> Result<Value, ExposedThingError> {
        if let Ok(value) = &result {
            self.bus.publish(&ChangeNotification::ActionInvocation {
                name: name.to_string(),
                result: value.clone(),
            });
        }
        result
    }
}

impl std::fmt::Debug for ExposedThing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposedThing")
            .field("id", &self.inner.id)
            .field("exposed", &self.is_exposed())
            .finish_non_exhaustive()
    }
}

fn record_outcome<T>(span: &Span, started: Instant, result: &Result<T, ExposedThingError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(_) => "error",
    };
    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = started.elapsed().as_millis() as u64;
    span.record("duration_ms", duration_ms);
    span.record("outcome", outcome);
    debug!(parent: span, duration_ms, outcome, "dispatch complete");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use tokio::sync::mpsc;
    use wot_core::{DataSchema, DataType, Protocol};

    use super::*;
    use crate::bus::Subscription;
    use crate::test_support::{init_tracing, lamp, text_args};

    type Seen = Arc<Mutex<Vec<ChangeNotification>>>;

    fn record(stream: &ObservableStream) -> (Subscription, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = stream.subscribe(move |n| sink.lock().push(n.clone()));
        (sub, seen)
    }

    fn property_change(name: &str, value: impl Into<Value>) -> ChangeNotification {
        ChangeNotification::PropertyChange {
            name: name.to_string(),
            value: value.into(),
        }
    }

    fn td(change_type: InteractionKind, method: TdChangeMethod, name: &str) -> ChangeNotification {
        ChangeNotification::TdChange(TdChange {
            change_type,
            method,
            name: name.to_string(),
        })
    }

    // -- reads and writes ---------------------------------------------------

    #[tokio::test]
    async fn set_then_get_returns_written_value() {
        init_tracing();
        let exposed = ExposedThing::new(lamp());

        exposed.set_property("brightness", 42).unwrap().await.unwrap();

        let value = exposed.get_property("brightness").unwrap().await.unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[tokio::test]
    async fn unset_property_reads_null_and_initial_value_is_kept() {
        let exposed = ExposedThing::new(lamp());
        assert_eq!(exposed.get_property("on").unwrap().await.unwrap(), Value::Null);

        let serial = Property::new("serial", DataSchema::of(DataType::String)).unwrap();
        exposed.add_property(serial, "SN-1").unwrap();
        assert_eq!(
            exposed.get_property("serial").unwrap().await.unwrap(),
            Value::from("SN-1")
        );
    }

    #[tokio::test]
    async fn url_safe_names_resolve_to_the_property() {
        let exposed = ExposedThing::new(lamp());

        exposed.set_property("power-draw", 3.5).unwrap().await.unwrap();

        let value = exposed.get_property("Power_Draw").unwrap().await.unwrap();
        assert_eq!(value, Value::Float(3.5));
    }

    #[tokio::test]
    async fn sequential_sets_notify_in_order() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_property_change("brightness").unwrap());

        for v in 1..=5 {
            exposed.set_property("brightness", v).unwrap().await.unwrap();
        }

        let expected: Vec<_> = (1..=5).map(|v| property_change("brightness", v)).collect();
        assert_eq!(*seen.lock(), expected);
    }

    #[tokio::test]
    async fn write_completes_after_observers_are_notified() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_property_change("on").unwrap());

        exposed.set_property("on", true).unwrap().await.unwrap();

        assert_eq!(*seen.lock(), vec![property_change("on", true)]);
    }

    #[tokio::test]
    async fn non_observable_property_publishes_nothing() {
        let exposed = ExposedThing::new(lamp());
        let raw = ObservableStream::new(
            Arc::clone(&exposed.inner.bus),
            StreamKey::property("Power_Draw"),
        );
        let (_sub, seen) = record(&raw);

        exposed.set_property("Power_Draw", 1.0).unwrap().await.unwrap();

        assert!(seen.lock().is_empty());
        assert!(matches!(
            exposed.on_property_change("Power_Draw"),
            Err(ExposedThingError::NotObservable { ref name }) if name == "Power_Draw"
        ));
    }

    #[tokio::test]
    async fn unchanged_values_suppressed_when_configured() {
        let config = RuntimeConfig {
            publish_unchanged_values: false,
            ..RuntimeConfig::default()
        };
        let exposed = ExposedThing::with_config(lamp(), config);
        let (_sub, seen) = record(&exposed.on_property_change("on").unwrap());

        exposed.set_property("on", true).unwrap().await.unwrap();
        exposed.set_property("on", true).unwrap().await.unwrap();
        exposed.set_property("on", false).unwrap().await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![property_change("on", true), property_change("on", false)]
        );
    }

    #[tokio::test]
    async fn unchanged_values_published_by_default() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_property_change("on").unwrap());

        exposed.set_property("on", true).unwrap().await.unwrap();
        exposed.set_property("on", true).unwrap().await.unwrap();

        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn full_write_queue_overloads() {
        let config = RuntimeConfig {
            write_queue_capacity: 1,
            ..RuntimeConfig::default()
        };
        let exposed = ExposedThing::with_config(lamp(), config);

        // Nothing has yielded yet, so the writer has not taken the first job.
        let first = exposed.set_property("brightness", 1).unwrap();
        let second = exposed.set_property("brightness", 2);
        assert!(matches!(
            second,
            Err(ExposedThingError::Overloaded { ref name }) if name == "brightness"
        ));

        // Other properties have their own writers.
        let other = exposed.set_property("on", true).unwrap();

        first.await.unwrap();
        other.await.unwrap();
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::Int(1)
        );
    }

    // -- structural errors ------------------------------------------------

    #[tokio::test]
    async fn unknown_names_fail_synchronously() {
        let exposed = ExposedThing::new(lamp());

        assert!(matches!(
            exposed.get_property("missing"),
            Err(ExposedThingError::NotFound { kind: InteractionKind::Property, .. })
        ));
        assert!(matches!(
            exposed.set_property("missing", 1),
            Err(ExposedThingError::NotFound { kind: InteractionKind::Property, .. })
        ));
        assert!(matches!(
            exposed.invoke_action("missing", ActionArgs::new()),
            Err(ExposedThingError::NotFound { kind: InteractionKind::Action, .. })
        ));
        assert!(matches!(
            exposed.emit_event("missing", Value::Null),
            Err(ExposedThingError::NotFound { kind: InteractionKind::Event, .. })
        ));
        // Names are namespaced: an action name is not a property.
        assert!(exposed.get_property("shout").is_err());
    }

    #[tokio::test]
    async fn non_writable_set_leaves_state_untouched() {
        let exposed = ExposedThing::new(lamp());
        let serial = Property::new("serial", DataSchema::of(DataType::String))
            .unwrap()
            .observable(true);
        exposed.add_property(serial, "SN-1").unwrap();
        let (_sub, seen) = record(&exposed.on_property_change("serial").unwrap());

        let err = exposed.set_property("serial", "SN-2").unwrap_err();

        assert!(matches!(err, ExposedThingError::NotWritable { ref name } if name == "serial"));
        assert_eq!(
            exposed.get_property("serial").unwrap().await.unwrap(),
            Value::from("SN-1")
        );
        assert!(seen.lock().is_empty());
    }

    // -- custom handlers ----------------------------------------------------

    #[tokio::test]
    async fn custom_retrieve_handler_answers_until_replaced() {
        let exposed = ExposedThing::new(lamp());
        exposed.on_retrieve_property(|request| {
            request.respond(format!("custom:{}", request.name()));
        });

        exposed.set_property("brightness", 7).unwrap().await.unwrap();
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::from("custom:brightness")
        );

        exposed.on_retrieve_property(|request| {
            request.respond(0);
        });
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::Int(0)
        );

        exposed.clear_handler(HandlerKind::RetrieveProperty);
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::Int(7)
        );
    }

    #[tokio::test]
    async fn in_flight_request_keeps_its_handler() {
        let exposed = ExposedThing::new(lamp());
        let (tx, mut parked) = mpsc::unbounded_channel();
        exposed.on_retrieve_property(move |request| {
            let _ = tx.send(request);
        });

        let first = exposed.get_property("on").unwrap();
        let request = parked.recv().await.unwrap();

        exposed.on_retrieve_property(|request| {
            request.respond("second");
        });
        let second = exposed.get_property("on").unwrap();
        assert_eq!(second.await.unwrap(), Value::from("second"));

        request.respond("first");
        assert_eq!(first.await.unwrap(), Value::from("first"));
    }

    #[tokio::test]
    async fn second_response_is_ignored() {
        let exposed = ExposedThing::new(lamp());
        exposed.on_retrieve_property(|request| {
            assert!(request.respond(1));
            assert!(!request.respond(2));
        });

        assert_eq!(exposed.get_property("on").unwrap().await.unwrap(), Value::Int(1));
    }

    #[tokio::test]
    async fn dropped_request_resolves_abandoned() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_action_invocation("shout").unwrap());
        exposed.on_invoke_action(drop);

        let result = exposed.invoke_action("shout", text_args("hi")).unwrap().await;

        assert!(matches!(result, Err(ExposedThingError::Abandoned)));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn blocking_handlers_do_not_hold_up_dispatch() {
        let exposed = ExposedThing::new(lamp());
        let slow = |request: Request| {
            std::thread::sleep(Duration::from_millis(300));
            request.respond(1);
        };
        exposed.on_retrieve_property(slow);
        exposed.on_update_property(slow);
        exposed.on_invoke_action(slow);

        let started = Instant::now();
        let read = exposed.get_property("on").unwrap();
        let invoked = exposed.invoke_action("reboot", ActionArgs::new()).unwrap();
        let written = exposed.set_property("brightness", 2).unwrap();
        assert!(started.elapsed() < Duration::from_millis(150));

        assert_eq!(read.await.unwrap(), Value::Int(1));
        assert_eq!(invoked.await.unwrap(), Value::Int(1));
        written.await.unwrap();
    }

    #[tokio::test]
    async fn write_issued_before_removal_is_not_published_after_re_add() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_property_change("brightness").unwrap());
        let (tx, mut requests) = mpsc::unbounded_channel();
        exposed.on_update_property(move |request| {
            let _ = tx.send(request);
        });

        let stale = exposed.set_property("brightness", 1).unwrap();
        let parked = requests.recv().await.unwrap();

        let definition = exposed.remove_property("brightness").unwrap().unwrap();
        exposed.add_property(definition, Value::Null).unwrap();
        exposed.clear_handler(HandlerKind::UpdateProperty);
        exposed.set_property("brightness", 2).unwrap().await.unwrap();

        parked.respond(Value::Null);
        assert!(matches!(
            stale.await,
            Err(ExposedThingError::NotFound { kind: InteractionKind::Property, .. })
        ));
        assert_eq!(*seen.lock(), vec![property_change("brightness", 2)]);
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::Int(2)
        );
    }

    #[tokio::test]
    async fn custom_update_handler_publishes_after_response() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_property_change("brightness").unwrap());
        let (tx, mut requests) = mpsc::unbounded_channel();
        exposed.on_update_property(move |request| {
            let _ = tx.send(request);
        });

        let write = exposed.set_property("brightness", 80).unwrap();
        let request = requests.recv().await.unwrap();
        assert_eq!(request.value(), Some(&Value::Int(80)));
        assert!(seen.lock().is_empty());

        request.respond(Value::Null);
        write.await.unwrap();

        assert_eq!(*seen.lock(), vec![property_change("brightness", 80)]);
        // The custom handler owns storage; the default store is untouched.
        exposed.clear_handler(HandlerKind::UpdateProperty);
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn failing_update_handler_publishes_nothing() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_property_change("on").unwrap());
        exposed.on_update_property(|request| {
            request.respond_with_error(anyhow::anyhow!("relay locked"));
        });

        let err = exposed.set_property("on", true).unwrap().await.unwrap_err();

        assert_eq!(err.to_string(), "handler failed: relay locked");
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn scoped_handler_overrides_global() {
        let exposed = ExposedThing::new(lamp());
        exposed.on_retrieve_property(|request| {
            request.respond("global");
        });
        exposed
            .set_property_read_handler("model", |request| {
                request.respond("scoped");
            })
            .unwrap();

        assert_eq!(exposed.get_property("model").unwrap().await.unwrap(), Value::from("scoped"));
        assert_eq!(exposed.get_property("on").unwrap().await.unwrap(), Value::from("global"));

        assert!(exposed.clear_interaction_handler(HandlerKind::RetrieveProperty, "model"));
        assert_eq!(exposed.get_property("model").unwrap().await.unwrap(), Value::from("global"));

        assert!(matches!(
            exposed.set_action_handler("missing", drop),
            Err(ExposedThingError::NotFound { kind: InteractionKind::Action, .. })
        ));
    }

    #[tokio::test]
    async fn scoped_write_and_action_handlers() {
        let exposed = ExposedThing::new(lamp());
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);
        exposed
            .set_property_write_handler("on", move |request| {
                sink.lock().extend(request.value().cloned());
                request.respond(Value::Null);
            })
            .unwrap();
        exposed
            .set_action_handler("reboot", |request| {
                request.respond(format!("rebooting {}", request.args().map_or(0, ActionArgs::len)));
            })
            .unwrap();

        exposed.set_property("on", true).unwrap().await.unwrap();
        exposed.set_property("brightness", 5).unwrap().await.unwrap();
        let reply = exposed.invoke_action("reboot", ActionArgs::new()).unwrap().await.unwrap();

        assert_eq!(*written.lock(), vec![Value::Bool(true)]);
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::Int(5)
        );
        assert_eq!(reply, Value::from("rebooting 0"));
    }

    // -- actions and events -------------------------------------------------

    #[tokio::test]
    async fn immediate_and_deferred_actions_agree() {
        let exposed = ExposedThing::new(lamp());

        let now = exposed.invoke_action("shout", text_args("hello")).unwrap().await.unwrap();
        let later = exposed
            .invoke_action("shout_later", text_args("hello"))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(now, Value::from("HELLO"));
        assert_eq!(now, later);
    }

    #[tokio::test]
    async fn action_failure_propagates_as_handler_error() {
        let exposed = ExposedThing::new(lamp());

        let now = exposed.invoke_action("shout", ActionArgs::new()).unwrap().await;
        let later = exposed.invoke_action("shout_later", ActionArgs::new()).unwrap().await;

        for result in [now, later] {
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), "handler failed: missing text argument");
        }
    }

    #[tokio::test]
    async fn undefined_action_fails_with_handler_error() {
        let exposed = ExposedThing::new(lamp());

        let err = exposed
            .invoke_action("reboot", ActionArgs::new())
            .unwrap()
            .await
            .unwrap_err();

        assert!(matches!(err, ExposedThingError::Handler(_)));
        assert!(err.to_string().contains("undefined action handler"));
    }

    #[tokio::test]
    async fn successful_invocations_are_published() {
        let exposed = ExposedThing::new(lamp());
        let (_now, seen_now) = record(&exposed.on_action_invocation("shout").unwrap());
        let (_later, seen_later) = record(&exposed.on_action_invocation("shout_later").unwrap());

        exposed.invoke_action("shout", text_args("a")).unwrap().await.unwrap();
        exposed.invoke_action("shout_later", text_args("b")).unwrap().await.unwrap();
        let _ = exposed.invoke_action("shout", ActionArgs::new()).unwrap().await;

        assert_eq!(
            *seen_now.lock(),
            vec![ChangeNotification::ActionInvocation {
                name: "shout".to_string(),
                result: Value::from("A"),
            }]
        );
        assert_eq!(
            *seen_later.lock(),
            vec![ChangeNotification::ActionInvocation {
                name: "shout_later".to_string(),
                result: Value::from("B"),
            }]
        );
    }

    #[tokio::test]
    async fn event_reaches_active_subscribers_only() {
        let exposed = ExposedThing::new(lamp());
        let stream = exposed.on_event("overheat").unwrap();
        let (first, seen_first) = record(&stream);
        let (_second, seen_second) = record(&stream);

        exposed.emit_event("overheat", 81.5).unwrap();
        first.dispose();
        exposed.emit_event("overheat", 90.0).unwrap();

        let emission = |payload: f64| ChangeNotification::EventEmission {
            name: "overheat".to_string(),
            payload: Value::Float(payload),
        };
        assert_eq!(*seen_first.lock(), vec![emission(81.5)]);
        assert_eq!(*seen_second.lock(), vec![emission(81.5), emission(90.0)]);
    }

    #[tokio::test]
    async fn event_stream_delivers_through_channel() {
        let exposed = ExposedThing::new(lamp());
        let (sub, mut events) = exposed.on_event("overheat").unwrap().subscribe_channel();

        exposed.emit_event("overheat", 99).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap();
        assert_eq!(
            received,
            Some(ChangeNotification::EventEmission {
                name: "overheat".to_string(),
                payload: Value::Int(99),
            })
        );
        sub.dispose();
        assert_eq!(events.recv().await, None);
    }

    // -- interaction registry -------------------------------------------------

    #[tokio::test]
    async fn td_changes_for_every_add_and_remove() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_td_change().unwrap());

        let fan = Property::new("fan", DataSchema::of(DataType::Boolean)).unwrap();
        exposed.add_property(fan, false).unwrap();
        exposed.add_action(Action::new("blink").unwrap()).unwrap();
        exposed
            .add_event(Event::new("burnout", DataSchema::of(DataType::Null)).unwrap())
            .unwrap();
        assert!(exposed.remove_property("fan").unwrap().is_some());
        assert!(exposed.remove_action("blink").unwrap().is_some());
        assert!(exposed.remove_event("burnout").unwrap().is_some());
        // Absent removals are silent.
        assert!(exposed.remove_event("burnout").unwrap().is_none());

        assert_eq!(
            *seen.lock(),
            vec![
                td(InteractionKind::Property, TdChangeMethod::Add, "fan"),
                td(InteractionKind::Action, TdChangeMethod::Add, "blink"),
                td(InteractionKind::Event, TdChangeMethod::Add, "burnout"),
                td(InteractionKind::Property, TdChangeMethod::Remove, "fan"),
                td(InteractionKind::Action, TdChangeMethod::Remove, "blink"),
                td(InteractionKind::Event, TdChangeMethod::Remove, "burnout"),
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_add_fails_and_publishes_nothing() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_td_change().unwrap());

        let dup = Property::new("on", DataSchema::of(DataType::Boolean)).unwrap();
        let err = exposed.add_property(dup, true).unwrap_err();

        assert!(matches!(
            err,
            ExposedThingError::DuplicateName { kind: InteractionKind::Property, ref name } if name == "on"
        ));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn removing_property_clears_value_and_handlers() {
        let exposed = ExposedThing::new(lamp());
        exposed.set_property("brightness", 9).unwrap().await.unwrap();
        exposed
            .set_property_read_handler("brightness", |request| {
                request.respond("stale");
            })
            .unwrap();

        exposed.remove_property("brightness").unwrap();
        assert!(exposed.get_property("brightness").is_err());

        let again = Property::new("brightness", DataSchema::of(DataType::Integer))
            .unwrap()
            .writable(true);
        exposed.add_property(again, Value::Null).unwrap();
        assert_eq!(
            exposed.get_property("brightness").unwrap().await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn forms_are_unique_and_publish_no_td_change() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, seen) = record(&exposed.on_td_change().unwrap());
        let form = Form::new(Protocol::Http, "http://lamp.local/properties/on");

        exposed
            .add_form(InteractionKind::Property, "on", form.clone())
            .unwrap();
        assert!(matches!(
            exposed.add_form(InteractionKind::Property, "on", form.clone()),
            Err(ExposedThingError::DuplicateForm { .. })
        ));
        assert!(matches!(
            exposed.add_form(InteractionKind::Event, "on", form.clone()),
            Err(ExposedThingError::NotFound { kind: InteractionKind::Event, .. })
        ));
        assert_eq!(
            exposed.with_thing(|thing| thing.property("on").map(|p| p.forms().len())),
            Some(1)
        );

        assert!(exposed.remove_form(InteractionKind::Property, "on", &form).unwrap());
        assert!(!exposed.remove_form(InteractionKind::Property, "on", &form).unwrap());
        assert!(seen.lock().is_empty());
    }

    // -- observation ----------------------------------------------------------

    #[tokio::test]
    async fn observe_rejects_invalid_targets() {
        let exposed = ExposedThing::new(lamp());

        assert!(matches!(
            exposed.observe(None, RequestType::Property),
            Err(ExposedThingError::InvalidObserveTarget { .. })
        ));
        assert!(matches!(
            exposed.observe(Some("on"), RequestType::Td),
            Err(ExposedThingError::InvalidObserveTarget { .. })
        ));
        assert!(matches!(
            exposed.observe(Some("nope"), RequestType::Event),
            Err(ExposedThingError::NotFound { kind: InteractionKind::Event, .. })
        ));
        let stream = exposed.observe(Some("power-draw"), RequestType::Action);
        assert!(stream.is_err());

        let stream = exposed.observe(Some("overheat"), RequestType::Event).unwrap();
        assert_eq!(stream.key(), &StreamKey::event("overheat"));
    }

    // -- lifecycle --------------------------------------------------------------

    #[tokio::test]
    async fn destroy_ends_exposure() {
        let exposed = ExposedThing::new(lamp());
        let (_sub, mut changes) = exposed.on_property_change("on").unwrap().subscribe_channel();
        let queued = exposed.set_property("on", true).unwrap();

        exposed.destroy();
        exposed.destroy();

        assert!(!exposed.is_exposed());
        assert!(matches!(queued.await, Err(ExposedThingError::NotExposed { .. })));
        assert!(matches!(
            exposed.get_property("on"),
            Err(ExposedThingError::NotExposed { .. })
        ));
        assert!(matches!(
            exposed.emit_event("overheat", 1),
            Err(ExposedThingError::NotExposed { .. })
        ));
        assert!(matches!(
            exposed.on_td_change(),
            Err(ExposedThingError::NotExposed { .. })
        ));
        assert_eq!(changes.recv().await, None);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let exposed = ExposedThing::new(lamp());
        let other = exposed.clone();

        other.set_property("on", true).unwrap().await.unwrap();

        assert!(exposed.ptr_eq(&other));
        assert_eq!(exposed.get_property("on").unwrap().await.unwrap(), Value::Bool(true));
        assert_eq!(exposed.url_name(), "lamp");
    }

    #[test]
    fn with_handle_works_outside_the_runtime_context() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let exposed =
            ExposedThing::with_handle(lamp(), RuntimeConfig::default(), runtime.handle().clone());

        let write = exposed.set_property("brightness", 3).unwrap();
        runtime.block_on(write).unwrap();

        let read = exposed.get_property("brightness").unwrap();
        assert_eq!(runtime.block_on(read).unwrap(), Value::Int(3));
    }

    proptest! {
        #[test]
        fn written_values_read_back(values in proptest::collection::vec(any::<i64>(), 1..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async {
                let exposed = ExposedThing::new(lamp());
                for v in &values {
                    exposed.set_property("brightness", *v).unwrap().await.unwrap();
                    let read = exposed.get_property("brightness").unwrap().await.unwrap();
                    prop_assert_eq!(read, Value::Int(*v));
                }
                Ok(())
            })?;
        }

        #[test]
        fn pipelined_writes_notify_in_issue_order(values in proptest::collection::vec(any::<i64>(), 1..32)) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let exposed = ExposedThing::new(lamp());
                let (_sub, seen) = record(&exposed.on_property_change("brightness").unwrap());

                let pending: Vec<_> = values
                    .iter()
                    .map(|v| exposed.set_property("brightness", *v).unwrap())
                    .collect();
                for write in pending {
                    write.await.unwrap();
                }

                let expected: Vec<_> = values.iter().map(|v| property_change("brightness", *v)).collect();
                prop_assert_eq!(&*seen.lock(), &expected);
                Ok(())
            })?;
        }
    }
}
