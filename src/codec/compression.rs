//! Compression Codec
//!
//! Two stages, applied in this order on write and reversed on read:
//!
//! 1. Structural packing. Object keys are interned into a dictionary and every
//!    distinct key sequence ("shape") is stored once, so an array of rows with the
//!    same columns carries its column names a single time. The packed form is
//!    plain JSON: `[keys, shapes, root]`.
//! 2. zlib over the packed text, emitted as standard base64.
//!
//! In `root`, scalars are stored as-is and containers become arrays whose first
//! element is a tag: `0` for an array (`[0, item, ...]`), `n >= 1` for an object
//! of shape `n - 1` (`[n, value, ...]`).

use std::collections::HashMap;
use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::CodecError;

/// Tag marking a packed array.
const ARRAY_TAG: u64 = 0;

// == Compress ==
/// Packs and deflates a JSON value into a base64 string.
pub fn compress(value: &Value) -> Result<String, CodecError> {
    let packed = Packer::default().pack(value);
    let text = serde_json::to_vec(&packed)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&text)?;
    let deflated = encoder.finish()?;

    Ok(BASE64.encode(deflated))
}

// == Decompress ==
/// Reverses [`compress`]. Corrupt base64, a failed zlib checksum, or a packed
/// value that does not follow the encoding are all errors. The input is
/// decoded exactly as given.
pub fn decompress(encoded: &str) -> Result<Value, CodecError> {
    let deflated = BASE64.decode(encoded)?;

    let mut decoder = ZlibDecoder::new(deflated.as_slice());
    let mut text = Vec::new();
    decoder.read_to_end(&mut text)?;

    let packed = parse_packed(&text)?;
    Unpacker::parse(&packed)?.unpack(packed_root(&packed)?)
}

/// Parses the packed text without serde_json's nesting cap. Packing wraps the
/// value one level deeper than the caller's JSON, so the default limit would
/// reject values that `compress` accepted. The stack grows on demand instead.
fn parse_packed(text: &[u8]) -> Result<Value, CodecError> {
    let mut de = serde_json::Deserializer::from_slice(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

// == Packer ==
#[derive(Default)]
struct Packer {
    keys: Vec<String>,
    key_ids: HashMap<String, u64>,
    shapes: Vec<Vec<u64>>,
    shape_ids: HashMap<Vec<u64>, u64>,
}

impl Packer {
    fn pack(mut self, value: &Value) -> Value {
        let root = self.pack_value(value);
        let shapes = self
            .shapes
            .into_iter()
            .map(|shape| Value::Array(shape.into_iter().map(Value::from).collect()))
            .collect();
        let keys = self.keys.into_iter().map(Value::String).collect();
        Value::Array(vec![Value::Array(keys), Value::Array(shapes), root])
    }

    fn pack_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Array(items) => {
                let mut packed = Vec::with_capacity(items.len() + 1);
                packed.push(Value::from(ARRAY_TAG));
                packed.extend(items.iter().map(|item| self.pack_value(item)));
                Value::Array(packed)
            }
            Value::Object(map) => {
                let shape: Vec<u64> = map.keys().map(|key| self.intern_key(key)).collect();
                let shape_id = self.intern_shape(shape);
                let mut packed = Vec::with_capacity(map.len() + 1);
                packed.push(Value::from(shape_id + 1));
                packed.extend(map.values().map(|item| self.pack_value(item)));
                Value::Array(packed)
            }
            scalar => scalar.clone(),
        }
    }

    fn intern_key(&mut self, key: &str) -> u64 {
        if let Some(id) = self.key_ids.get(key) {
            return *id;
        }
        let id = self.keys.len() as u64;
        self.keys.push(key.to_string());
        self.key_ids.insert(key.to_string(), id);
        id
    }

    fn intern_shape(&mut self, shape: Vec<u64>) -> u64 {
        if let Some(id) = self.shape_ids.get(&shape) {
            return *id;
        }
        let id = self.shapes.len() as u64;
        self.shapes.push(shape.clone());
        self.shape_ids.insert(shape, id);
        id
    }
}

// == Unpacker ==
struct Unpacker<'a> {
    shapes: Vec<Vec<&'a str>>,
}

fn malformed(msg: impl Into<String>) -> CodecError {
    CodecError::MalformedPacked(msg.into())
}

fn packed_root(packed: &Value) -> Result<&Value, CodecError> {
    match packed.as_array().map(Vec::as_slice) {
        Some([_, _, root]) => Ok(root),
        _ => Err(malformed("expected [keys, shapes, root]")),
    }
}

impl<'a> Unpacker<'a> {
    fn parse(packed: &'a Value) -> Result<Self, CodecError> {
        let (keys, shapes) = match packed.as_array().map(Vec::as_slice) {
            Some([Value::Array(keys), Value::Array(shapes), _]) => (keys, shapes),
            _ => return Err(malformed("expected [keys, shapes, root]")),
        };

        let keys = keys
            .iter()
            .map(|key| key.as_str().ok_or_else(|| malformed("dictionary key is not a string")))
            .collect::<Result<Vec<&str>, _>>()?;

        let shapes = shapes
            .iter()
            .map(|shape| {
                let ids = shape
                    .as_array()
                    .ok_or_else(|| malformed("shape is not an array"))?;
                let mut names: Vec<&str> = Vec::with_capacity(ids.len());
                for id in ids {
                    let name = id
                        .as_u64()
                        .and_then(|id| keys.get(id as usize).copied())
                        .ok_or_else(|| malformed("shape references an unknown key"))?;
                    if names.contains(&name) {
                        return Err(malformed(format!("shape repeats key {name:?}")));
                    }
                    names.push(name);
                }
                Ok(names)
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(Self { shapes })
    }

    fn unpack(&self, value: &Value) -> Result<Value, CodecError> {
        let items = match value {
            Value::Array(items) => items,
            scalar => return Ok(scalar.clone()),
        };
        let (tag, rest) = items
            .split_first()
            .ok_or_else(|| malformed("container without tag"))?;
        let tag = tag
            .as_u64()
            .ok_or_else(|| malformed("container tag is not an unsigned integer"))?;

        if tag == ARRAY_TAG {
            return rest
                .iter()
                .map(|item| self.unpack(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }

        let shape = self
            .shapes
            .get((tag - 1) as usize)
            .ok_or_else(|| malformed(format!("unknown shape {}", tag - 1)))?;
        if shape.len() != rest.len() {
            return Err(malformed(format!(
                "shape has {} keys but object has {} values",
                shape.len(),
                rest.len()
            )));
        }

        let mut map = Map::with_capacity(shape.len());
        for (key, item) in shape.iter().zip(rest) {
            map.insert((*key).to_string(), self.unpack(item)?);
        }
        Ok(Value::Object(map))
    }
}
