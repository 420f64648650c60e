//! In-process [`StateStore`] for tests and single-process hosts.
//!
//! Uses a single `Mutex` for thread safety. Change callbacks run after the
//! lock is released so they may read the store.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::backend::{ChangeCallback, SlotChange, SlotKind, SlotRegistration, StateStore};
use crate::error::{self, StateError};

struct Slot {
    registration: SlotRegistration,
    value: Value,
    registered_pass: u64,
}

#[derive(Default)]
struct Inner {
    pass: u64,
    slots: HashMap<String, Slot>,
    /// Raw values delivered for ids not registered yet.
    unclaimed: HashMap<String, Option<String>>,
    pending: Vec<(String, Option<String>)>,
}

/// Store holding every slot in memory.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for MemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStateStore").finish_non_exhaustive()
    }
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Start a rendering pass. Registration is idempotent within one pass.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the store lock is poisoned.
    pub fn begin_pass(&self) -> error::Result<u64> {
        let mut inner = self.lock()?;
        inner.pass += 1;
        Ok(inner.pass)
    }

    /// Queue a raw value from the frontend for the next update cycle.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the store lock is poisoned.
    pub fn receive(&self, id: impl Into<String>, raw: Option<String>) -> error::Result<()> {
        self.lock()?.pending.push((id.into(), raw));
        Ok(())
    }

    /// Run one update cycle and return the ids whose callbacks fired.
    ///
    /// Queued values are written through each slot's deserializer. Trigger
    /// slots the cycle did not deliver reset to none. Persistent slots fire
    /// when their value changed; trigger slots fire whenever they were
    /// delivered a value that is not none.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the store lock is poisoned.
    pub fn apply_updates(&self) -> error::Result<Vec<String>> {
        let mut fire: Vec<(ChangeCallback, SlotChange)> = Vec::new();
        {
            let mut guard = self.lock()?;
            let inner = &mut *guard;
            let pending = std::mem::take(&mut inner.pending);
            let delivered: HashSet<String> = pending.iter().map(|(id, _)| id.clone()).collect();

            for (id, raw) in pending {
                let Some(slot) = inner.slots.get_mut(&id) else {
                    inner.unclaimed.insert(id, raw);
                    continue;
                };
                let current = (slot.registration.deserializer)(raw.as_deref());
                let previous = std::mem::replace(&mut slot.value, current.clone());
                let fires = match slot.registration.kind {
                    SlotKind::Persistent => previous != current,
                    SlotKind::Trigger => !current.is_null(),
                };
                if let (true, Some(callback)) = (fires, &slot.registration.on_change) {
                    fire.push((callback.clone(), SlotChange { id, previous, current }));
                }
            }

            for (id, slot) in &mut inner.slots {
                if slot.registration.kind == SlotKind::Trigger
                    && !delivered.contains(id)
                    && !slot.value.is_null()
                {
                    tracing::trace!(slot = id, "Resetting undelivered trigger");
                    slot.value = Value::Null;
                }
            }
        }

        let mut fired = Vec::with_capacity(fire.len());
        for (callback, change) in fire {
            callback(&change);
            fired.push(change.id);
        }
        Ok(fired)
    }

    /// Current deserialized value of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the store lock is poisoned.
    pub fn value(&self, id: &str) -> error::Result<Option<Value>> {
        Ok(self.lock()?.slots.get(id).map(|slot| slot.value.clone()))
    }

    /// Current value of `id` in its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the store lock is poisoned.
    pub fn serialized(&self, id: &str) -> error::Result<Option<String>> {
        Ok(self
            .lock()?
            .slots
            .get(id)
            .map(|slot| (slot.registration.serializer)(&slot.value)))
    }

    /// Number of registered slots.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the store lock is poisoned.
    pub fn slot_count(&self) -> error::Result<usize> {
        Ok(self.lock()?.slots.len())
    }
}

impl StateStore for MemoryStateStore {
    fn register(&self, registration: SlotRegistration) -> error::Result<Value> {
        let mut inner = self.lock()?;
        let pass = inner.pass;

        if let Some(slot) = inner.slots.get_mut(&registration.id) {
            if slot.registered_pass != pass {
                slot.registration = registration;
                slot.registered_pass = pass;
            }
            return Ok(slot.value.clone());
        }

        let raw = inner.unclaimed.remove(&registration.id).flatten();
        let value = (registration.deserializer)(raw.as_deref());
        tracing::trace!(slot = registration.id, pass, "Registered state slot");
        inner.slots.insert(
            registration.id.clone(),
            Slot {
                registration,
                value: value.clone(),
                registered_pass: pass,
            },
        );
        Ok(value)
    }
}
