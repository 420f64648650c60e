//! Per-mount bridge between a component and the state store.
//!
//! Each mount registers two slots: a persistent slot keyed by the widget id
//! holding the last mapping the frontend reported, and a trigger aggregator
//! slot holding the latest batch of `{event, value}` records. Dispatch uses
//! an explicit event-name to callback map fixed at construction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::backend::{SlotChange, SlotKind, SlotRegistration, StateStore};
use crate::error::{Result, StateError};
use crate::trigger::{decode_records, deserialize_aggregator, make_trigger_id, AGGREGATOR_EVENT};

/// Handler for one named state key or trigger event.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

type CallbackMap = BTreeMap<String, EventCallback>;

/// What a mount hands back to application code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentOutput {
    /// Frontend-reported state merged over the caller's defaults.
    pub state: BTreeMap<String, Value>,
    /// Latest value per event; none unless the current aggregator payload
    /// carried it.
    pub triggers: BTreeMap<String, Value>,
}

/// Slot wiring for one mounted component.
pub struct StateBridge {
    base_id: String,
    aggregator_id: String,
    callbacks: Arc<CallbackMap>,
    defaults: BTreeMap<String, Value>,
}

impl fmt::Debug for StateBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBridge")
            .field("base_id", &self.base_id)
            .field("events", &self.callbacks.keys().collect::<Vec<_>>())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl StateBridge {
    /// Build the bridge for mount `base_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownDefault`] if a default names no
    /// callback, or [`StateError::DelimiterCollision`] if `base_id` cannot
    /// form trigger ids.
    pub fn new(
        base_id: impl Into<String>,
        callbacks: impl IntoIterator<Item = (String, EventCallback)>,
        defaults: BTreeMap<String, Value>,
    ) -> Result<Self> {
        let base_id = base_id.into();
        let callbacks: CallbackMap = callbacks.into_iter().collect();

        if let Some(key) = defaults.keys().find(|key| !callbacks.contains_key(*key)) {
            return Err(StateError::UnknownDefault {
                key: key.clone(),
                available: callbacks.keys().cloned().collect(),
            });
        }

        let aggregator_id = make_trigger_id(&base_id, AGGREGATOR_EVENT)?;
        Ok(Self {
            base_id,
            aggregator_id,
            callbacks: Arc::new(callbacks),
            defaults,
        })
    }

    /// Id of the persistent state slot.
    #[must_use]
    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    /// Id of the trigger aggregator slot.
    #[must_use]
    pub fn aggregator_id(&self) -> &str {
        &self.aggregator_id
    }

    #[must_use]
    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    /// Register both slots and assemble the mount's output.
    ///
    /// # Errors
    ///
    /// Propagates [`StateError`] from the store.
    pub fn register(&self, store: &dyn StateStore) -> Result<ComponentOutput> {
        let state_callbacks = Arc::clone(&self.callbacks);
        let persistent = SlotRegistration::json(self.base_id.clone(), SlotKind::Persistent)
            .with_deserializer(Arc::new(deserialize_state))
            .with_on_change(Arc::new(move |change: &SlotChange| {
                dispatch_state(&state_callbacks, change);
            }));
        let reported = store.register(persistent)?;

        let trigger_callbacks = Arc::clone(&self.callbacks);
        let aggregator = SlotRegistration::json(self.aggregator_id.clone(), SlotKind::Trigger)
            .with_deserializer(Arc::new(deserialize_aggregator))
            .with_on_change(Arc::new(move |change: &SlotChange| {
                dispatch_triggers(&trigger_callbacks, change);
            }));
        let events = store.register(aggregator)?;

        let mut state = self.defaults.clone();
        if let Value::Object(reported) = reported {
            state.extend(reported);
        }

        let mut triggers: BTreeMap<String, Value> = self
            .callbacks
            .keys()
            .map(|event| (event.clone(), Value::Null))
            .collect();
        for record in decode_records(&events) {
            triggers.insert(record.event, record.value);
        }

        Ok(ComponentOutput { state, triggers })
    }
}

/// Frontend state is a mapping; anything else reads as empty.
fn deserialize_state(raw: Option<&str>) -> Value {
    match raw.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => Value::Object(map),
        Some(Ok(other)) => {
            tracing::debug!(value = %other, "Ignoring non-mapping component state");
            Value::Object(Map::new())
        }
        Some(Err(e)) => {
            tracing::debug!(error = %e, "Ignoring unparseable component state");
            Value::Object(Map::new())
        }
        None => Value::Object(Map::new()),
    }
}

fn dispatch_state(callbacks: &CallbackMap, change: &SlotChange) {
    for (key, callback) in callbacks {
        let Some(current) = change.current.get(key) else {
            continue;
        };
        if change.previous.get(key) != Some(current) {
            callback(current);
        }
    }
}

// One invocation per record, so repeated events in a batch each fire.
fn dispatch_triggers(callbacks: &CallbackMap, change: &SlotChange) {
    for record in decode_records(&change.current) {
        match callbacks.get(&record.event) {
            Some(callback) => callback(&record.value),
            None => tracing::trace!(event = record.event, "No callback for trigger event"),
        }
    }
}
