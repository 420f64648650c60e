//! State store contract.
//!
//! The host owns the store; the runtime only registers slots and reads the
//! value each registration returns. Values are JSON, with `Value::Null`
//! meaning "no value".

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error;

/// Turns the raw wire value (if any) into a slot value.
pub type Deserializer = Arc<dyn Fn(Option<&str>) -> Value + Send + Sync>;

/// Turns a slot value back into its wire form.
pub type Serializer = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Invoked by the store after an update cycle changes a slot.
pub type ChangeCallback = Arc<dyn Fn(&SlotChange) + Send + Sync>;

/// How the store treats a slot across update cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Keeps its last value until the frontend reports a new one.
    Persistent,
    /// Resets to none on every cycle that does not deliver it.
    Trigger,
}

/// Old and new value of a slot, handed to its [`ChangeCallback`].
#[derive(Debug, Clone, PartialEq)]
pub struct SlotChange {
    pub id: String,
    pub previous: Value,
    pub current: Value,
}

/// One slot a mount asks the store to track.
#[derive(Clone)]
pub struct SlotRegistration {
    pub id: String,
    pub kind: SlotKind,
    pub deserializer: Deserializer,
    pub serializer: Serializer,
    pub on_change: Option<ChangeCallback>,
}

impl fmt::Debug for SlotRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotRegistration")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("on_change", &self.on_change.is_some())
            .finish_non_exhaustive()
    }
}

impl SlotRegistration {
    /// Slot whose wire form is plain JSON text.
    #[must_use]
    pub fn json(id: impl Into<String>, kind: SlotKind) -> Self {
        Self {
            id: id.into(),
            kind,
            deserializer: Arc::new(|raw: Option<&str>| {
                raw.and_then(|text| serde_json::from_str(text).ok())
                    .unwrap_or(Value::Null)
            }),
            serializer: Arc::new(Value::to_string),
            on_change: None,
        }
    }

    #[must_use]
    pub fn with_deserializer(mut self, deserializer: Deserializer) -> Self {
        self.deserializer = deserializer;
        self
    }

    #[must_use]
    pub fn with_on_change(mut self, on_change: ChangeCallback) -> Self {
        self.on_change = Some(on_change);
        self
    }
}

/// Keyed value store shared by every mount.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn StateStore>`.
pub trait StateStore: Send + Sync {
    /// Register a slot and return its current value.
    ///
    /// Registering the same id twice within one rendering pass must be
    /// idempotent: the second call returns the current value and does not
    /// add a second registration.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on store failure.
    fn register(&self, registration: SlotRegistration) -> error::Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn StateStore) {}
    }

    #[test]
    fn json_slot_round_trips() {
        let slot = SlotRegistration::json("w", SlotKind::Persistent);
        let value = (slot.deserializer)(Some(r#"{"a":1}"#));
        assert_eq!(value, serde_json::json!({"a": 1}));
        assert_eq!((slot.serializer)(&value), r#"{"a":1}"#);
        assert_eq!((slot.deserializer)(None), Value::Null);
        assert_eq!((slot.deserializer)(Some("not json")), Value::Null);
    }
}
