//! codec/tree — structured-value codecs behind the lazy-payload markers.
//!
//! Two encodings of the same tag set:
//! - compact "tree" form: varint-packed lengths/counts and zigzag ints. No
//!   backreferences; this is the dense form used whenever the value graph has
//!   no internal sharing.
//! - "graph" form: fixed-width (u32/u64 LE) fields plus TAG_BACKREF nodes that
//!   reference an earlier array/map by id. Node ids are assigned pre-order to
//!   every array/map on both sides. A value with shared nodes must keep this
//!   form verbatim: re-packing fields to varints would shift the id sequence
//!   the backreferences depend on.
//!
//! Tags:
//!   0x00 null, 0x01 false, 0x02 true, 0x03 int, 0x04 float,
//!   0x05 str, 0x06 array, 0x07 map, 0x08 backref (graph form only)

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use super::DecodeError;
use crate::value::Value;

pub const TAG_NULL: u8 = 0x00;
pub const TAG_FALSE: u8 = 0x01;
pub const TAG_TRUE: u8 = 0x02;
pub const TAG_INT: u8 = 0x03;
pub const TAG_FLOAT: u8 = 0x04;
pub const TAG_STR: u8 = 0x05;
pub const TAG_ARRAY: u8 = 0x06;
pub const TAG_MAP: u8 = 0x07;
pub const TAG_BACKREF: u8 = 0x08;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("value graph deeper than the configured limit ({0})")]
    TooDeep(u32),
    #[error("field of {0} bytes exceeds the u32 length limit")]
    Oversize(usize),
}

// ---------------------- compact tree form ----------------------

pub fn encode_tree(v: &Value, max_depth: u32) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    write_tree(v, &mut out, 0, max_depth)?;
    Ok(out)
}

fn write_tree(v: &Value, out: &mut Vec<u8>, depth: u32, max_depth: u32) -> Result<(), EncodeError> {
    match v {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Int(i) => {
            out.push(TAG_INT);
            write_uvarint(out, zigzag(*i));
        }
        Value::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STR);
            write_uvarint(out, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            if depth >= max_depth {
                return Err(EncodeError::TooDeep(max_depth));
            }
            out.push(TAG_ARRAY);
            write_uvarint(out, items.len() as u64);
            for it in items {
                write_tree(it, out, depth + 1, max_depth)?;
            }
        }
        Value::Map(pairs) => {
            if depth >= max_depth {
                return Err(EncodeError::TooDeep(max_depth));
            }
            out.push(TAG_MAP);
            write_uvarint(out, pairs.len() as u64);
            for (k, it) in pairs {
                write_uvarint(out, k.len() as u64);
                out.extend_from_slice(k.as_bytes());
                write_tree(it, out, depth + 1, max_depth)?;
            }
        }
    }
    Ok(())
}

pub fn decode_tree(body: &[u8], max_depth: u32) -> Result<Value, DecodeError> {
    let mut cur = Cursor::new(body);
    let v = read_tree(&mut cur, 0, max_depth)?;
    if cur.position() != body.len() as u64 {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(v)
}

fn read_tree(cur: &mut Cursor<&[u8]>, depth: u32, max_depth: u32) -> Result<Value, DecodeError> {
    let tag = read_u8(cur)?;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_FALSE => Ok(Value::Bool(false)),
        TAG_TRUE => Ok(Value::Bool(true)),
        TAG_INT => Ok(Value::Int(unzigzag(read_uvarint(cur)?))),
        TAG_FLOAT => Ok(Value::Float(f64::from_bits(read_u64(cur)?))),
        TAG_STR => {
            let declared = read_uvarint(cur)?;
            let len = checked_len(cur, declared)?;
            Ok(Value::Str(read_string(cur, len)?))
        }
        TAG_ARRAY => {
            if depth >= max_depth {
                return Err(DecodeError::TooDeep(max_depth));
            }
            let declared = read_uvarint(cur)?;
            let count = checked_len(cur, declared)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(Arc::new(read_tree(cur, depth + 1, max_depth)?));
            }
            Ok(Value::Array(items))
        }
        TAG_MAP => {
            if depth >= max_depth {
                return Err(DecodeError::TooDeep(max_depth));
            }
            let declared = read_uvarint(cur)?;
            let count = checked_len(cur, declared)?;
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let kdeclared = read_uvarint(cur)?;
                let klen = checked_len(cur, kdeclared)?;
                let key = read_string(cur, klen)?;
                pairs.push((key, Arc::new(read_tree(cur, depth + 1, max_depth)?)));
            }
            Ok(Value::Map(pairs))
        }
        other => Err(DecodeError::BadTag(other)),
    }
}

// ---------------------- graph form ----------------------

pub struct GraphPayload {
    pub bytes: Vec<u8>,
    /// True when at least one shared node was encoded as a backreference. The
    /// caller must then keep these bytes verbatim instead of re-packing.
    pub had_backrefs: bool,
}

pub fn encode_graph(v: &Value, max_depth: u32) -> Result<GraphPayload, EncodeError> {
    let mut enc = GraphEncoder {
        out: Vec::new(),
        ids: HashMap::new(),
        next_id: 0,
        had_backrefs: false,
        max_depth,
    };
    enc.write_node(v, 0)?;
    Ok(GraphPayload {
        bytes: enc.out,
        had_backrefs: enc.had_backrefs,
    })
}

struct GraphEncoder {
    out: Vec<u8>,
    /// Arc pointer identity -> node id, for array/map nodes already written.
    ids: HashMap<usize, u32>,
    next_id: u32,
    had_backrefs: bool,
    max_depth: u32,
}

impl GraphEncoder {
    fn write_node(&mut self, v: &Value, depth: u32) -> Result<(), EncodeError> {
        match v {
            Value::Null => self.out.push(TAG_NULL),
            Value::Bool(false) => self.out.push(TAG_FALSE),
            Value::Bool(true) => self.out.push(TAG_TRUE),
            Value::Int(i) => {
                self.out.push(TAG_INT);
                let _ = self.out.write_i64::<LittleEndian>(*i);
            }
            Value::Float(f) => {
                self.out.push(TAG_FLOAT);
                let _ = self.out.write_u64::<LittleEndian>(f.to_bits());
            }
            Value::Str(s) => {
                self.out.push(TAG_STR);
                self.write_len(s.len())?;
                self.out.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                if depth >= self.max_depth {
                    return Err(EncodeError::TooDeep(self.max_depth));
                }
                self.next_id += 1; // this node consumes the next pre-order id
                self.out.push(TAG_ARRAY);
                self.write_len(items.len())?;
                for it in items {
                    self.write_child(it, depth + 1)?;
                }
            }
            Value::Map(pairs) => {
                if depth >= self.max_depth {
                    return Err(EncodeError::TooDeep(self.max_depth));
                }
                self.next_id += 1;
                self.out.push(TAG_MAP);
                self.write_len(pairs.len())?;
                for (k, it) in pairs {
                    self.write_len(k.len())?;
                    self.out.extend_from_slice(k.as_bytes());
                    self.write_child(it, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn write_child(&mut self, child: &Arc<Value>, depth: u32) -> Result<(), EncodeError> {
        if child.is_structured() {
            let ptr = Arc::as_ptr(child) as usize;
            if let Some(&id) = self.ids.get(&ptr) {
                self.out.push(TAG_BACKREF);
                let _ = self.out.write_u32::<LittleEndian>(id);
                self.had_backrefs = true;
                return Ok(());
            }
            // Register before descending: write_node assigns exactly this id.
            self.ids.insert(ptr, self.next_id);
        }
        self.write_node(child, depth)
    }

    fn write_len(&mut self, len: usize) -> Result<(), EncodeError> {
        let v = u32::try_from(len).map_err(|_| EncodeError::Oversize(len))?;
        let _ = self.out.write_u32::<LittleEndian>(v);
        Ok(())
    }
}

pub fn decode_graph(body: &[u8], max_depth: u32) -> Result<Value, DecodeError> {
    let mut cur = Cursor::new(body);
    let mut dec = GraphDecoder {
        nodes: Vec::new(),
        max_depth,
    };
    let tag = read_u8(&mut cur)?;
    let v = match tag {
        TAG_ARRAY | TAG_MAP => {
            // The root consumes slot 0 but is never a backref target: the
            // encoder only registers Arc-held children.
            dec.nodes.push(None);
            dec.read_structured_body(&mut cur, tag, 0)?
        }
        TAG_BACKREF => return Err(DecodeError::BadTag(tag)),
        other => dec.read_scalar(&mut cur, other)?,
    };
    if cur.position() != body.len() as u64 {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(v)
}

struct GraphDecoder {
    /// Node id -> finished node, in pre-order. None while under construction.
    nodes: Vec<Option<Arc<Value>>>,
    max_depth: u32,
}

impl GraphDecoder {
    fn read_scalar(&mut self, cur: &mut Cursor<&[u8]>, tag: u8) -> Result<Value, DecodeError> {
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_FALSE => Ok(Value::Bool(false)),
            TAG_TRUE => Ok(Value::Bool(true)),
            TAG_INT => Ok(Value::Int(read_i64(cur)?)),
            TAG_FLOAT => Ok(Value::Float(f64::from_bits(read_u64(cur)?))),
            TAG_STR => {
                let declared = read_u32(cur)? as u64;
                let len = checked_len(cur, declared)?;
                Ok(Value::Str(read_string(cur, len)?))
            }
            other => Err(DecodeError::BadTag(other)),
        }
    }

    fn read_structured_body(
        &mut self,
        cur: &mut Cursor<&[u8]>,
        tag: u8,
        depth: u32,
    ) -> Result<Value, DecodeError> {
        if depth >= self.max_depth {
            return Err(DecodeError::TooDeep(self.max_depth));
        }
        let declared = read_u32(cur)? as u64;
        let count = checked_len(cur, declared)?;
        if tag == TAG_ARRAY {
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(self.read_child(cur, depth + 1)?);
            }
            Ok(Value::Array(items))
        } else {
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let kdeclared = read_u32(cur)? as u64;
                let klen = checked_len(cur, kdeclared)?;
                let key = read_string(cur, klen)?;
                pairs.push((key, self.read_child(cur, depth + 1)?));
            }
            Ok(Value::Map(pairs))
        }
    }

    fn read_child(&mut self, cur: &mut Cursor<&[u8]>, depth: u32) -> Result<Arc<Value>, DecodeError> {
        let tag = read_u8(cur)?;
        match tag {
            TAG_BACKREF => {
                let id = read_u32(cur)?;
                self.nodes
                    .get(id as usize)
                    .and_then(|slot| slot.clone())
                    .ok_or(DecodeError::BadBackref(id))
            }
            TAG_ARRAY | TAG_MAP => {
                let slot = self.nodes.len();
                self.nodes.push(None);
                let v = self.read_structured_body(cur, tag, depth)?;
                let node = Arc::new(v);
                self.nodes[slot] = Some(node.clone());
                Ok(node)
            }
            other => Ok(Arc::new(self.read_scalar(cur, other)?)),
        }
    }
}

// ---------------------- byte-level helpers ----------------------

fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

fn write_uvarint(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

fn read_uvarint(cur: &mut Cursor<&[u8]>) -> Result<u64, DecodeError> {
    let mut out: u64 = 0;
    let mut shift = 0u32;
    loop {
        let b = read_u8(cur)?;
        if shift == 63 && b > 1 {
            return Err(DecodeError::BadVarint);
        }
        out |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(out);
        }
        shift += 7;
        if shift > 63 {
            return Err(DecodeError::BadVarint);
        }
    }
}

fn read_u8(cur: &mut Cursor<&[u8]>) -> Result<u8, DecodeError> {
    cur.read_u8().map_err(|_| DecodeError::Truncated)
}

fn read_u32(cur: &mut Cursor<&[u8]>) -> Result<u32, DecodeError> {
    cur.read_u32::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated)
}

fn read_u64(cur: &mut Cursor<&[u8]>) -> Result<u64, DecodeError> {
    cur.read_u64::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated)
}

fn read_i64(cur: &mut Cursor<&[u8]>) -> Result<i64, DecodeError> {
    cur.read_i64::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated)
}

/// Bound a declared length/count by the bytes actually remaining, so a
/// corrupted payload cannot force a huge allocation.
fn checked_len(cur: &Cursor<&[u8]>, declared: u64) -> Result<usize, DecodeError> {
    let remaining = (cur.get_ref().len() as u64).saturating_sub(cur.position());
    if declared > remaining {
        return Err(DecodeError::Truncated);
    }
    Ok(declared as usize)
}

fn read_string(cur: &mut Cursor<&[u8]>, len: usize) -> Result<String, DecodeError> {
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf).map_err(|_| DecodeError::Truncated)?;
    String::from_utf8(buf).map_err(|_| DecodeError::BadUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_DEPTH;

    fn arc(v: Value) -> Arc<Value> {
        Arc::new(v)
    }

    fn sample_tree() -> Value {
        Value::Map(vec![
            ("id".to_string(), arc(Value::Int(-42))),
            ("pi".to_string(), arc(Value::Float(3.14159))),
            (
                "tags".to_string(),
                arc(Value::Array(vec![
                    arc(Value::str("a")),
                    arc(Value::str("b")),
                    arc(Value::Null),
                ])),
            ),
            ("ok".to_string(), arc(Value::Bool(true))),
        ])
    }

    #[test]
    fn tree_roundtrip() {
        let v = sample_tree();
        let bytes = encode_tree(&v, DEFAULT_MAX_DEPTH).unwrap();
        let back = decode_tree(&bytes, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn tree_rejects_backref_tag() {
        let body = vec![TAG_BACKREF, 0, 0, 0, 0];
        assert!(matches!(
            decode_tree(&body, DEFAULT_MAX_DEPTH),
            Err(DecodeError::BadTag(TAG_BACKREF))
        ));
    }

    #[test]
    fn tree_rejects_trailing_bytes() {
        let mut bytes = encode_tree(&sample_tree(), DEFAULT_MAX_DEPTH).unwrap();
        bytes.push(0xFF);
        assert!(matches!(
            decode_tree(&bytes, DEFAULT_MAX_DEPTH),
            Err(DecodeError::TrailingBytes)
        ));
    }

    #[test]
    fn graph_roundtrip_without_sharing_has_no_backrefs() {
        let v = sample_tree();
        let g = encode_graph(&v, DEFAULT_MAX_DEPTH).unwrap();
        assert!(!g.had_backrefs);
        let back = decode_graph(&g.bytes, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn graph_preserves_sharing() {
        let shared = arc(Value::Array(vec![arc(Value::Int(1)), arc(Value::Int(2))]));
        let v = Value::Map(vec![
            ("a".to_string(), shared.clone()),
            ("b".to_string(), shared.clone()),
        ]);
        let g = encode_graph(&v, DEFAULT_MAX_DEPTH).unwrap();
        assert!(g.had_backrefs, "second occurrence must encode as a backref");

        let back = decode_graph(&g.bytes, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(back, v);
        match back {
            Value::Map(pairs) => {
                assert!(
                    Arc::ptr_eq(&pairs[0].1, &pairs[1].1),
                    "sharing must survive the roundtrip"
                );
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn graph_compact_is_denser_for_unshared_values() {
        let v = sample_tree();
        let g = encode_graph(&v, DEFAULT_MAX_DEPTH).unwrap();
        let t = encode_tree(&v, DEFAULT_MAX_DEPTH).unwrap();
        assert!(
            t.len() < g.bytes.len(),
            "tree form ({}) must be denser than graph form ({})",
            t.len(),
            g.bytes.len()
        );
    }

    #[test]
    fn depth_cap_enforced() {
        let mut v = Value::Array(vec![arc(Value::Int(0))]);
        for _ in 0..200 {
            v = Value::Array(vec![arc(v)]);
        }
        assert!(matches!(
            encode_tree(&v, DEFAULT_MAX_DEPTH),
            Err(EncodeError::TooDeep(_))
        ));
        assert!(matches!(
            encode_graph(&v, DEFAULT_MAX_DEPTH),
            Err(EncodeError::TooDeep(_))
        ));
        // A raised limit admits the same value.
        assert!(encode_tree(&v, 512).is_ok());
    }

    #[test]
    fn varint_extremes_roundtrip() {
        for i in [0i64, -1, 1, i64::MIN, i64::MAX, 300, -300] {
            let bytes = encode_tree(&Value::Int(i), DEFAULT_MAX_DEPTH).unwrap();
            assert_eq!(decode_tree(&bytes, DEFAULT_MAX_DEPTH).unwrap(), Value::Int(i));
        }
    }

    #[test]
    fn bad_backref_id_rejected() {
        // array with one child: backref to a node id that never completed
        let mut body = vec![TAG_ARRAY];
        body.extend_from_slice(&1u32.to_le_bytes());
        body.push(TAG_BACKREF);
        body.extend_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            decode_graph(&body, DEFAULT_MAX_DEPTH),
            Err(DecodeError::BadBackref(7))
        ));
    }
}
