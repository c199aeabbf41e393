//! codec/literal — self-describing literal byte forms.
//!
//! Layout (payload of a non-lazy entry):
//! - b"N"            null
//! - b"T" / b"F"     bool
//! - b'I' + i64 LE   integer (exact round-trip)
//! - b'D' + f64 bits LE  float (bit-exact round-trip, no decimal formatting)
//! - anything else   the string's UTF-8 bytes, untagged
//!
//! Untagged strings keep the common case at zero overhead, which makes a few
//! shapes ambiguous: a string equal to "N"/"T"/"F", or any 9-byte string
//! starting with 'I' or 'D', would parse as a tagged literal. The encoder must
//! never store those shapes untagged; it wraps them as an "s:" lazy payload
//! instead (see codec::encode_value).

use byteorder::{ByteOrder, LittleEndian};

use crate::value::Value;

pub const LIT_NULL: u8 = b'N';
pub const LIT_TRUE: u8 = b'T';
pub const LIT_FALSE: u8 = b'F';
pub const LIT_INT: u8 = b'I';
pub const LIT_FLOAT: u8 = b'D';

/// Tagged scalar forms are 1 byte (null/bool) or 1 + 8 bytes (int/float).
const TAGGED_SCALAR_LEN: usize = 9;

/// Encode a scalar as its literal payload. Strings must be pre-checked with
/// [`is_ambiguous_string`]; structured values have no literal form.
pub fn encode_literal(v: &Value) -> Vec<u8> {
    match v {
        Value::Null => vec![LIT_NULL],
        Value::Bool(true) => vec![LIT_TRUE],
        Value::Bool(false) => vec![LIT_FALSE],
        Value::Int(i) => {
            let mut buf = vec![0u8; TAGGED_SCALAR_LEN];
            buf[0] = LIT_INT;
            LittleEndian::write_i64(&mut buf[1..], *i);
            buf
        }
        Value::Float(f) => {
            let mut buf = vec![0u8; TAGGED_SCALAR_LEN];
            buf[0] = LIT_FLOAT;
            LittleEndian::write_u64(&mut buf[1..], f.to_bits());
            buf
        }
        Value::Str(s) => s.as_bytes().to_vec(),
        Value::Array(_) | Value::Map(_) => unreachable!("structured values have no literal form"),
    }
}

/// Parse a literal payload back into a Value. Returns None for payloads that
/// are neither a tagged scalar nor valid UTF-8 (possible only for corrupted
/// snapshot content).
pub fn parse_literal(payload: &[u8]) -> Option<Value> {
    match payload {
        [LIT_NULL] => return Some(Value::Null),
        [LIT_TRUE] => return Some(Value::Bool(true)),
        [LIT_FALSE] => return Some(Value::Bool(false)),
        _ => {}
    }
    if payload.len() == TAGGED_SCALAR_LEN {
        match payload[0] {
            LIT_INT => return Some(Value::Int(LittleEndian::read_i64(&payload[1..]))),
            LIT_FLOAT => {
                return Some(Value::Float(f64::from_bits(LittleEndian::read_u64(
                    &payload[1..],
                ))))
            }
            _ => {}
        }
    }
    std::str::from_utf8(payload).ok().map(Value::str)
}

/// True when storing `s` untagged would collide with one of the tagged forms.
pub fn is_ambiguous_string(s: &str) -> bool {
    let b = s.as_bytes();
    match b.len() {
        1 => matches!(b[0], LIT_NULL | LIT_TRUE | LIT_FALSE),
        TAGGED_SCALAR_LEN => matches!(b[0], LIT_INT | LIT_FLOAT),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_literals_roundtrip() {
        for v in [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(0),
            Value::Int(i64::MIN),
            Value::Int(i64::MAX),
            Value::Float(0.1),
            Value::Float(-0.0),
            Value::Float(f64::MAX),
            Value::str(""),
            Value::str("plain"),
            Value::str("I"), // 1-byte 'I' is not a valid tagged form
        ] {
            let payload = encode_literal(&v);
            let back = parse_literal(&payload).expect("literal must parse");
            assert_eq!(back, v, "roundtrip mismatch for {:?}", v);
        }
    }

    #[test]
    fn float_bits_survive_exactly() {
        let f = f64::from_bits(0x7ff8_0000_0000_0001); // a NaN payload
        let payload = encode_literal(&Value::Float(f));
        match parse_literal(&payload) {
            Some(Value::Float(back)) => assert_eq!(back.to_bits(), f.to_bits()),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn ambiguous_shapes_detected() {
        assert!(is_ambiguous_string("N"));
        assert!(is_ambiguous_string("T"));
        assert!(is_ambiguous_string("F"));
        assert!(is_ambiguous_string("Iabcdefgh"));
        assert!(is_ambiguous_string("D12345678"));

        assert!(!is_ambiguous_string(""));
        assert!(!is_ambiguous_string("n"));
        assert!(!is_ambiguous_string("NO"));
        assert!(!is_ambiguous_string("I")); // wrong length for a tagged int
        assert!(!is_ambiguous_string("Xabcdefgh"));
        assert!(!is_ambiguous_string("Iabcdefghi")); // 10 bytes
    }

    #[test]
    fn ambiguous_shape_really_collides() {
        // The reason the wrap is mandatory: untagged "N" would come back null.
        let stored = "N".as_bytes();
        assert_eq!(parse_literal(stored), Some(Value::Null));
    }
}
