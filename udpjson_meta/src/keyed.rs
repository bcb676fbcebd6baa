//! Generic keyed-value decoder.
//!
//! Each datagram is one JSON object carrying an object id, an optional source
//! id and a value under configurable member names. Anything else is dropped
//! without error: the feed is best-effort and unrelated traffic on the same
//! group is expected.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use crate::cache::TtlCache;
use crate::config::DecoderConfig;

/// Why a datagram was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropReason {
    /// Payload is not valid JSON.
    #[error("invalid JSON")]
    InvalidJson,
    /// Root is not a JSON object.
    #[error("root is not an object")]
    RootNotObject,
    /// Object id member absent.
    #[error("object id missing")]
    MissingObjectId,
    /// Value member absent.
    #[error("value missing")]
    MissingValue,
    /// Object id present but not an unsigned 64-bit integer.
    #[error("object id not an unsigned integer")]
    InvalidObjectId,
}

/// One decoded (source, object, value) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedValue {
    /// Source id, 0 when absent or unusable.
    pub source_id: u32,
    /// Tracked object id.
    pub object_id: u64,
    /// Canonical string form of the value.
    pub value: String,
}

/// Decoder with configurable member names.
#[derive(Debug, Clone)]
pub struct KeyedValueDecoder {
    object_id_key: String,
    source_id_key: String,
    value_key: String,
}

impl Default for KeyedValueDecoder {
    fn default() -> Self {
        Self::new(&DecoderConfig::default())
    }
}

impl KeyedValueDecoder {
    /// Create a decoder reading the member names in `config`.
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            object_id_key: config.object_id_key.clone(),
            source_id_key: config.source_id_key.clone(),
            value_key: config.value_key.clone(),
        }
    }

    /// Decode one datagram.
    pub fn decode(&self, data: &[u8]) -> Result<KeyedValue, DropReason> {
        let root: Value = serde_json::from_slice(data).map_err(|_| DropReason::InvalidJson)?;
        let obj = root.as_object().ok_or(DropReason::RootNotObject)?;
        self.decode_object(obj)
    }

    /// Decode an already parsed JSON object.
    pub fn decode_object(&self, obj: &Map<String, Value>) -> Result<KeyedValue, DropReason> {
        let object_id = obj
            .get(&self.object_id_key)
            .ok_or(DropReason::MissingObjectId)?;
        let value = obj.get(&self.value_key).ok_or(DropReason::MissingValue)?;
        let object_id = parse_u64(object_id).ok_or(DropReason::InvalidObjectId)?;

        let source_id = obj
            .get(&self.source_id_key)
            .and_then(parse_u64)
            .and_then(|id| u32::try_from(id).ok())
            .unwrap_or(0);

        Ok(KeyedValue {
            source_id,
            object_id,
            value: render_value(value),
        })
    }

    /// Decode one datagram and write it into `cache`.
    ///
    /// Returns whether the cache was updated.
    pub fn apply(&self, data: &[u8], cache: &TtlCache) -> bool {
        match self.decode(data) {
            Ok(kv) => {
                cache.update(kv.source_id, kv.object_id, kv.value);
                true
            }
            Err(reason) => {
                trace!("Dropped datagram ({} bytes): {}", data.len(), reason);
                false
            }
        }
    }
}

/// Canonical string form of a JSON value.
///
/// Strings pass through, integers render in base 10, other numbers with six
/// decimals, booleans as `true`/`false`. Null, arrays and objects render as
/// compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                format!("{:.6}", n.as_f64().unwrap_or_default())
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Unsigned id from a JSON string, integer or float.
///
/// Negative, non-finite or out-of-range numbers and non-numeric strings are
/// rejected. Floats truncate toward zero.
fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(f64_to_u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(f64_to_u64))
        }
        _ => None,
    }
}

fn f64_to_u64(v: f64) -> Option<u64> {
    // 2^64 is exactly representable; anything at or above it does not fit.
    if v.is_finite() && v >= 0.0 && v < 18_446_744_073_709_551_616.0 {
        Some(v as u64)
    } else {
        None
    }
}
