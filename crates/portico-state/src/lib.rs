//! Component state for portico.
//!
//! Provides the [`StateStore`] contract the host implements, a
//! [`MemoryStateStore`] for tests and single-process hosts, trigger id and
//! record handling, and the per-mount [`StateBridge`] that turns frontend
//! state and trigger events into callback dispatch.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod bridge;
pub mod error;
pub mod memory;
pub mod trigger;

pub use backend::{ChangeCallback, SlotChange, SlotKind, SlotRegistration, StateStore};
pub use bridge::{ComponentOutput, EventCallback, StateBridge};
pub use error::{Result, StateError};
pub use memory::MemoryStateStore;
pub use trigger::{make_trigger_id, split_trigger_id, TriggerRecord, AGGREGATOR_EVENT, TRIGGER_DELIMITER};
