//! Group of exposed things, addressed by id or URL-safe name.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::info;
use wot_core::{Interaction, Thing, ThingId};

use crate::config::RuntimeConfig;
use crate::error::ExposedThingError;
use crate::exposed::ExposedThing;

/// Registry of the things exposed by one runtime.
///
/// Things are found by id or by URL-safe id. Listing and teardown follow
/// exposure order.
pub struct ExposedThingGroup {
    by_id: DashMap<ThingId, ExposedThing>,
    order: RwLock<Vec<ThingId>>,
    config: RuntimeConfig,
    runtime: Handle,
}

impl ExposedThingGroup {
    /// Creates an empty group on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_handle(RuntimeConfig::default(), Handle::current())
    }

    /// Creates an empty group whose things use `config` and run on `runtime`.
    #[must_use]
    pub fn with_handle(config: RuntimeConfig, runtime: Handle) -> Self {
        Self {
            by_id: DashMap::new(),
            order: RwLock::new(Vec::new()),
            config,
            runtime,
        }
    }

    /// Exposes `thing` and registers it.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateThing` if a thing with the same id is exposed.
    pub fn expose(&self, thing: Thing) -> Result<ExposedThing, ExposedThingError> {
        match self.by_id.entry(thing.id().clone()) {
            Entry::Occupied(entry) => Err(ExposedThingError::DuplicateThing {
                id: entry.key().to_string(),
            }),
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                let exposed =
                    ExposedThing::with_handle(thing, self.config.clone(), self.runtime.clone());
                entry.insert(exposed.clone());
                self.order.write().push(id);
                Ok(exposed)
            }
        }
    }

    /// Finds a thing by id or URL-safe id.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ExposedThing> {
        if let Some(entry) = self.by_id.get(&ThingId::from(name)) {
            return Some(entry.value().clone());
        }
        self.by_id
            .iter()
            .find(|entry| entry.value().url_name() == name)
            .map(|entry| entry.value().clone())
    }

    /// Finds the thing that owns `interaction`.
    #[must_use]
    pub fn find_by_interaction<I: Interaction>(&self, interaction: &I) -> Option<ExposedThing> {
        let id = interaction.thing_id()?;
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    /// Destroys and unregisters a thing.
    ///
    /// # Errors
    ///
    /// Returns `UnknownThing` if no thing matches `name`.
    pub fn remove(&self, name: &str) -> Result<ExposedThing, ExposedThingError> {
        let found = self.find(name).ok_or_else(|| ExposedThingError::UnknownThing {
            name: name.to_string(),
        })?;
        let id = found.id().clone();
        let (_, exposed) = self
            .by_id
            .remove(&id)
            .ok_or_else(|| ExposedThingError::UnknownThing {
                name: name.to_string(),
            })?;
        self.order.write().retain(|entry| entry != &id);
        exposed.destroy();
        info!(thing = %id, "thing removed from group");
        Ok(exposed)
    }

    /// All exposed things in exposure order.
    #[must_use]
    pub fn exposed_things(&self) -> Vec<ExposedThing> {
        let order = self.order.read().clone();
        order
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Destroys every thing in reverse exposure order and empties the group.
    pub fn destroy_all(&self) {
        let order = std::mem::take(&mut *self.order.write());
        for id in order.iter().rev() {
            if let Some((_, exposed)) = self.by_id.remove(id) {
                exposed.destroy();
            }
        }
    }
}

impl Default for ExposedThingGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExposedThingGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposedThingGroup")
            .field("things", &*self.order.read())
            .finish_non_exhaustive()
    }
}
