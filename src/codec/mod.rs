//! codec — value encoding for snapshot entries.
//!
//! Every warmed value becomes an EncodedValue:
//! - Literal: a self-describing payload usable after a literal parse
//!   (null, bool, int, float, safe string), see codec::literal.
//! - Lazy: a marker-prefixed payload decoded on first access:
//!     "s:" disambiguated plain string
//!     "t:" compact tree form of a structured value
//!     "g:" graph form with backreferences (kept verbatim when the value
//!          graph shares nodes)
//!
//! The literal/lazy distinction travels as a flags byte, never by content
//! inspection. The canonical byte form of an entry, [flags u8][payload], is
//! what gets content-hashed for dedup and written to the value table.

pub mod literal;
pub mod tree;

use thiserror::Error;

use crate::errors::CacheError;
use crate::value::Value;

pub use literal::{encode_literal, is_ambiguous_string, parse_literal};
pub use tree::{decode_graph, decode_tree, encode_graph, encode_tree};

/// Bit 0 of the entry flags byte: payload requires a decode step.
pub const FLAG_LAZY: u8 = 0x01;

pub const MARKER_STR: &[u8; 2] = b"s:";
pub const MARKER_TREE: &[u8; 2] = b"t:";
pub const MARKER_GRAPH: &[u8; 2] = b"g:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedValue {
    Literal(Vec<u8>),
    Lazy(Vec<u8>),
}

impl EncodedValue {
    pub fn is_lazy(&self) -> bool {
        matches!(self, EncodedValue::Lazy(_))
    }

    pub fn flags(&self) -> u8 {
        match self {
            EncodedValue::Literal(_) => 0,
            EncodedValue::Lazy(_) => FLAG_LAZY,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            EncodedValue::Literal(p) | EncodedValue::Lazy(p) => p,
        }
    }

    /// Rebuild from on-disk parts. Unknown flag bits are a shape error; the
    /// loader treats them as corruption.
    pub fn from_parts(flags: u8, payload: Vec<u8>) -> Option<EncodedValue> {
        match flags {
            0 => Some(EncodedValue::Literal(payload)),
            FLAG_LAZY => Some(EncodedValue::Lazy(payload)),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload truncated")]
    Truncated,
    #[error("unknown tag 0x{0:02x}")]
    BadTag(u8),
    #[error("backreference to unknown node {0}")]
    BadBackref(u32),
    #[error("invalid utf-8 in payload")]
    BadUtf8,
    #[error("trailing bytes after value")]
    TrailingBytes,
    #[error("malformed varint")]
    BadVarint,
    #[error("payload nested deeper than the decode limit ({0})")]
    TooDeep(u32),
    #[error("missing or unknown payload marker")]
    BadMarker,
    #[error("malformed literal payload")]
    BadLiteral,
}

/// Encode one value for the snapshot. Pure, no I/O. `key` is only used to
/// name the offending entry in errors.
pub fn encode_value(key: &str, v: &Value, max_depth: u32) -> Result<EncodedValue, CacheError> {
    match v {
        Value::Str(s) if is_ambiguous_string(s) => {
            // Stored untagged, these bytes would parse as a tagged literal on
            // load. Wrap so the loader unwraps them back to the same string.
            let mut payload = Vec::with_capacity(2 + s.len());
            payload.extend_from_slice(MARKER_STR);
            payload.extend_from_slice(s.as_bytes());
            Ok(EncodedValue::Lazy(payload))
        }
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {
            Ok(EncodedValue::Literal(encode_literal(v)))
        }
        Value::Array(_) | Value::Map(_) => {
            let graph = tree::encode_graph(v, max_depth)
                .map_err(|e| CacheError::non_serializable(key, e.to_string()))?;
            let (marker, body) = if graph.had_backrefs {
                // Shared nodes: keep the graph bytes verbatim, re-packing
                // would invalidate the node ids the backreferences carry.
                (MARKER_GRAPH, graph.bytes)
            } else {
                let packed = tree::encode_tree(v, max_depth)
                    .map_err(|e| CacheError::non_serializable(key, e.to_string()))?;
                (MARKER_TREE, packed)
            };
            let mut payload = Vec::with_capacity(2 + body.len());
            payload.extend_from_slice(marker);
            payload.extend_from_slice(&body);
            Ok(EncodedValue::Lazy(payload))
        }
    }
}

/// Decode a lazy payload. Dispatches on the 2-byte marker.
pub fn decode_lazy(payload: &[u8], max_depth: u32) -> Result<Value, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::BadMarker);
    }
    let (marker, body) = payload.split_at(2);
    if marker == MARKER_STR {
        std::str::from_utf8(body)
            .map(Value::str)
            .map_err(|_| DecodeError::BadUtf8)
    } else if marker == MARKER_TREE {
        decode_tree(body, max_depth)
    } else if marker == MARKER_GRAPH {
        decode_graph(body, max_depth)
    } else {
        Err(DecodeError::BadMarker)
    }
}

/// Decode any encoded value back to its input form. One decode per call; the
/// decoded form is not cached at this layer.
pub fn decode_value(enc: &EncodedValue, max_depth: u32) -> Result<Value, DecodeError> {
    match enc {
        EncodedValue::Literal(p) => parse_literal(p).ok_or(DecodeError::BadLiteral),
        EncodedValue::Lazy(p) => decode_lazy(p, max_depth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_DEPTH;
    use std::sync::Arc;

    fn roundtrip(v: &Value) -> Value {
        let enc = encode_value("k", v, DEFAULT_MAX_DEPTH).unwrap();
        decode_value(&enc, DEFAULT_MAX_DEPTH).unwrap()
    }

    #[test]
    fn scalars_stay_literal() {
        for v in [
            Value::Null,
            Value::Bool(false),
            Value::Int(7),
            Value::Float(1.25),
            Value::str("hello"),
        ] {
            let enc = encode_value("k", &v, DEFAULT_MAX_DEPTH).unwrap();
            assert!(!enc.is_lazy(), "{:?} must be literal", v);
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn ambiguous_strings_wrap_and_unwrap() {
        for s in ["N", "T", "F", "Iabcdefgh", "D\x00\x00\x00\x00\x00\x00\x00\x00"] {
            let v = Value::str(s);
            let enc = encode_value("k", &v, DEFAULT_MAX_DEPTH).unwrap();
            assert!(enc.is_lazy(), "{:?} must be wrapped", s);
            assert!(enc.payload().starts_with(MARKER_STR));
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn structured_values_pick_tree_or_graph() {
        let plain = Value::Array(vec![Arc::new(Value::Int(1)), Arc::new(Value::Int(2))]);
        let enc = encode_value("k", &plain, DEFAULT_MAX_DEPTH).unwrap();
        assert!(enc.payload().starts_with(MARKER_TREE));
        assert_eq!(roundtrip(&plain), plain);

        let shared = Arc::new(Value::Array(vec![Arc::new(Value::Int(1))]));
        let sharing = Value::Array(vec![shared.clone(), shared]);
        let enc = encode_value("k", &sharing, DEFAULT_MAX_DEPTH).unwrap();
        assert!(enc.payload().starts_with(MARKER_GRAPH));
        assert_eq!(roundtrip(&sharing), sharing);
    }

    #[test]
    fn literal_and_lazy_never_share_canonical_form() {
        // Same payload bytes, different flags byte: distinct canonical forms.
        let lit = EncodedValue::Literal(b"s:x".to_vec());
        let lazy = EncodedValue::Lazy(b"s:x".to_vec());
        assert_eq!(lit.payload(), lazy.payload());
        assert_ne!(lit.flags(), lazy.flags());
    }

    #[test]
    fn from_parts_rejects_unknown_flags() {
        assert!(EncodedValue::from_parts(0, vec![b'N']).is_some());
        assert!(EncodedValue::from_parts(FLAG_LAZY, b"s:x".to_vec()).is_some());
        assert!(EncodedValue::from_parts(0x02, vec![]).is_none());
        assert!(EncodedValue::from_parts(0x03, vec![]).is_none());
    }

    #[test]
    fn decode_failure_on_garbage() {
        assert!(decode_lazy(b"", DEFAULT_MAX_DEPTH).is_err());
        assert!(decode_lazy(b"x", DEFAULT_MAX_DEPTH).is_err());
        assert!(decode_lazy(b"q:abc", DEFAULT_MAX_DEPTH).is_err());
        assert!(decode_lazy(b"t:", DEFAULT_MAX_DEPTH).is_err());
    }
}
