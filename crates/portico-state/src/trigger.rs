//! Trigger ids and trigger-aggregator payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StateError};

/// Joins a base mount id and an event name.
pub const TRIGGER_DELIMITER: &str = "__";

/// Event name of the per-mount trigger aggregator slot.
pub const AGGREGATOR_EVENT: &str = "events";

/// One frontend event as delivered in the aggregator slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub event: String,
    #[serde(default)]
    pub value: Value,
}

/// Derive the id of event `event` under mount `base`.
///
/// Splitting takes the last delimiter, so an event may not start with `_`
/// and neither part may contain the delimiter.
///
/// # Errors
///
/// Returns [`StateError::DelimiterCollision`] naming the offending part.
pub fn make_trigger_id(base: &str, event: &str) -> Result<String> {
    if base.contains(TRIGGER_DELIMITER) {
        return Err(StateError::DelimiterCollision {
            part: "base id",
            value: base.to_string(),
        });
    }
    if event.contains(TRIGGER_DELIMITER) || event.starts_with('_') {
        return Err(StateError::DelimiterCollision {
            part: "event name",
            value: event.to_string(),
        });
    }
    Ok(format!("{base}{TRIGGER_DELIMITER}{event}"))
}

/// Inverse of [`make_trigger_id`].
#[must_use]
pub fn split_trigger_id(id: &str) -> Option<(&str, &str)> {
    id.rsplit_once(TRIGGER_DELIMITER)
}

/// Deserialize a raw aggregator value.
///
/// Missing becomes none, JSON text is parsed, anything else is kept as a
/// string. A single record object is normalised to a one-element list.
#[must_use]
pub fn deserialize_aggregator(raw: Option<&str>) -> Value {
    let Some(text) = raw else {
        return Value::Null;
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(record)) => Value::Array(vec![Value::Object(record)]),
        Ok(value) => value,
        Err(_) => Value::String(text.to_string()),
    }
}

/// Well-formed records in an aggregator value, in delivery order.
#[must_use]
pub fn decode_records(value: &Value) -> Vec<TriggerRecord> {
    let items: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(_) => std::slice::from_ref(value),
        _ => &[],
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<TriggerRecord>(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed trigger record");
                None
            }
        })
        .collect()
}
