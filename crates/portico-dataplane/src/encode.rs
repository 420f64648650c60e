//! Payload encoding for the component boundary.
//!
//! Dispatch order:
//! 1. byte buffers pass through unchanged;
//! 2. a mapping has its first-level table values replaced by placeholders
//!    pointing at Arrow IPC blobs, while lists and tuples are never scanned;
//! 3. a top-level table becomes a single columnar blob;
//! 4. everything else is JSON.
//!
//! JSON that cannot be produced degrades to the JSON string of the value's
//! literal rendering.

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::ipc::encode_ipc;
use crate::payload::{classify, Payload, PayloadShape};

/// Key of the placeholder object standing in for an extracted table.
pub const ARROW_REF_KEY: &str = "__portico_arrow_ref__";

/// Wire form of an encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedPayload {
    Bytes(Vec<u8>),
    Json(String),
    Columnar(Vec<u8>),
    /// JSON with placeholders, plus the blobs they reference.
    Mixed {
        json: String,
        blobs: BTreeMap<String, Vec<u8>>,
    },
}

impl EncodedPayload {
    /// Short variant name for logs and diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::Columnar(_) => "columnar",
            Self::Mixed { .. } => "mixed",
        }
    }

    /// Bytes fed into content fingerprints such as widget ids.
    ///
    /// Blob reference ids are random, so a mixed payload fingerprints its
    /// JSON with the ids blanked, followed by the blobs in the order their
    /// placeholders appear.
    #[must_use]
    pub fn fingerprint_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) | Self::Columnar(bytes) => bytes.clone(),
            Self::Json(json) => json.as_bytes().to_vec(),
            Self::Mixed { json, blobs } => {
                let mut ordered: Vec<(usize, &String)> = blobs
                    .keys()
                    .filter_map(|id| json.find(id.as_str()).map(|pos| (pos, id)))
                    .collect();
                ordered.sort();

                let mut canonical = json.clone();
                for id in blobs.keys() {
                    canonical = canonical.replace(id.as_str(), "");
                }
                let mut out = canonical.into_bytes();
                for (_, id) in ordered {
                    out.extend_from_slice(&blobs[id]);
                }
                out
            }
        }
    }
}

/// Placeholder object for blob `ref_id`.
#[must_use]
pub fn placeholder(ref_id: &str) -> Value {
    let mut object = serde_json::Map::new();
    object.insert(ARROW_REF_KEY.to_string(), Value::String(ref_id.to_string()));
    Value::Object(object)
}

/// Encode a payload for the component boundary.
///
/// # Errors
///
/// Returns [`crate::DataPlaneError::Columnar`] if a table cannot be written
/// as Arrow IPC, or [`crate::DataPlaneError::Json`] if even the string
/// fallback fails to encode.
pub fn encode(payload: &Payload) -> Result<EncodedPayload> {
    match classify(payload) {
        PayloadShape::Bytes(bytes) => Ok(EncodedPayload::Bytes(bytes.to_vec())),
        PayloadShape::Mapping(map) => encode_mapping(payload, map),
        PayloadShape::Tabular(batch) => Ok(EncodedPayload::Columnar(encode_ipc(batch)?)),
        PayloadShape::Sequence(_) | PayloadShape::Other(_) => {
            Ok(EncodedPayload::Json(json_or_fallback(payload)?))
        }
    }
}

fn encode_mapping(payload: &Payload, map: &BTreeMap<String, Payload>) -> Result<EncodedPayload> {
    let tables: Vec<(&String, &RecordBatch)> = map
        .iter()
        .filter_map(|(key, value)| match value {
            Payload::Table(batch) => Some((key, batch)),
            _ => None,
        })
        .collect();
    if tables.is_empty() {
        return Ok(EncodedPayload::Json(json_or_fallback(payload)?));
    }

    let mut blobs = BTreeMap::new();
    let mut substituted = map.clone();
    for (key, batch) in tables {
        let ref_id = Uuid::new_v4().to_string();
        blobs.insert(ref_id.clone(), encode_ipc(batch)?);
        substituted.insert(
            key.clone(),
            Payload::map([(ARROW_REF_KEY, Payload::Text(ref_id))]),
        );
    }

    let json = json_or_fallback(&Payload::Map(substituted))?;
    tracing::trace!(blobs = blobs.len(), "Extracted tables from mapping payload");
    Ok(EncodedPayload::Mixed { json, blobs })
}

fn json_or_fallback(payload: &Payload) -> Result<String> {
    match payload.to_json() {
        Ok(value) => Ok(serde_json::to_string(&value)?),
        Err(reason) => {
            tracing::debug!(reason, "Payload not JSON-encodable; using its string form");
            Ok(serde_json::to_string(&payload.to_string())?)
        }
    }
}
