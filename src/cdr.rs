// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// CDR message encoding
//
// Serializes a structured JSON value against a parsed message layout using
// XCDR1 little-endian rules: a 4-byte encapsulation header, natural
// alignment relative to the payload start, u32 length-prefixed
// NUL-terminated strings, and u32 count-prefixed sequences. Fields missing
// from the value encode as type defaults; ISO-8601 text coerces into 64-bit
// integer fields as epoch nanoseconds.

use crate::msgdef::{Arity, FieldType, MessageDef, MessageLayout, PrimitiveType};
use anyhow::{bail, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::DateTime;
use serde_json::Value;

/// CDR little-endian encapsulation identifier.
const ENCAPSULATION: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

pub fn encode_message(layout: &MessageLayout, message: &Value) -> Result<Vec<u8>> {
    let mut writer = CdrWriter::new();
    encode_fields(&layout.root, message, layout, &mut writer)?;
    Ok(writer.into_bytes())
}

struct CdrWriter {
    buf: Vec<u8>,
}

impl CdrWriter {
    fn new() -> Self {
        Self {
            buf: ENCAPSULATION.to_vec(),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Alignment is relative to the payload origin, after the encapsulation
    /// header.
    fn align(&mut self, n: usize) {
        let pos = self.buf.len() - ENCAPSULATION.len();
        let pad = (n - pos % n) % n;
        self.buf.extend(std::iter::repeat(0u8).take(pad));
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.align(4);
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32 + 1);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }
}

fn encode_fields(
    def: &MessageDef,
    value: &Value,
    layout: &MessageLayout,
    writer: &mut CdrWriter,
) -> Result<()> {
    for field in &def.fields {
        let field_value = value.get(&field.name).unwrap_or(&Value::Null);
        match field.arity {
            Arity::Scalar => encode_single(field, field_value, layout, writer)?,
            Arity::Sequence => {
                let items = sequence_items(field, field_value)?;
                writer.write_u32(items.len() as u32);
                for item in &items {
                    encode_single(field, item, layout, writer)?;
                }
            }
            Arity::Array(n) => {
                let items = sequence_items(field, field_value)?;
                for i in 0..n {
                    encode_single(field, items.get(i).unwrap_or(&Value::Null), layout, writer)?;
                }
            }
        }
    }
    Ok(())
}

/// Materialize the element list of an array/sequence field. A byte sequence
/// may also arrive as a base64 string.
fn sequence_items(
    field: &crate::msgdef::FieldDef,
    value: &Value,
) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) if field.ty == FieldType::Primitive(PrimitiveType::Uint8) => {
            let bytes = BASE64.decode(s).unwrap_or_else(|_| s.clone().into_bytes());
            Ok(bytes.into_iter().map(|b| Value::from(b)).collect())
        }
        other => bail!(
            "field '{}' expects a sequence, got {}",
            field.name,
            type_label(other)
        ),
    }
}

fn encode_single(
    field: &crate::msgdef::FieldDef,
    value: &Value,
    layout: &MessageLayout,
    writer: &mut CdrWriter,
) -> Result<()> {
    match &field.ty {
        FieldType::Primitive(p) => encode_primitive(&field.name, *p, value, writer),
        FieldType::Complex(key) => {
            let def = layout
                .resolve(key)
                .ok_or_else(|| anyhow::anyhow!("unresolved type '{}'", key))?;
            let empty = Value::Object(serde_json::Map::new());
            let object = match value {
                Value::Null => &empty,
                Value::Object(_) => value,
                other => bail!(
                    "field '{}' expects an object for '{}', got {}",
                    field.name,
                    key,
                    type_label(other)
                ),
            };
            encode_fields(def, object, layout, writer)
        }
    }
}

fn encode_primitive(
    name: &str,
    ty: PrimitiveType,
    value: &Value,
    writer: &mut CdrWriter,
) -> Result<()> {
    match ty {
        PrimitiveType::Bool => writer.write_u8(u8::from(as_bool(value))),
        PrimitiveType::Int8 => writer.write_u8(as_i64(name, value, false)? as u8),
        PrimitiveType::Uint8 => writer.write_u8(as_i64(name, value, false)? as u8),
        PrimitiveType::Int16 | PrimitiveType::Uint16 => {
            writer.align(2);
            let v = as_i64(name, value, false)? as u16;
            writer.write_bytes(&v.to_le_bytes());
        }
        PrimitiveType::Int32 | PrimitiveType::Uint32 => {
            writer.align(4);
            let v = as_i64(name, value, false)? as u32;
            writer.write_bytes(&v.to_le_bytes());
        }
        PrimitiveType::Int64 | PrimitiveType::Uint64 => {
            writer.align(8);
            let v = as_i64(name, value, true)? as u64;
            writer.write_bytes(&v.to_le_bytes());
        }
        PrimitiveType::Float32 => {
            writer.align(4);
            writer.write_bytes(&(as_f64(name, value)? as f32).to_le_bytes());
        }
        PrimitiveType::Float64 => {
            writer.align(8);
            writer.write_bytes(&as_f64(name, value)?.to_le_bytes());
        }
        PrimitiveType::String => writer.write_string(&as_string(value)),
    }
    Ok(())
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

/// Integer coercion; 64-bit targets additionally accept ISO-8601 text as
/// epoch nanoseconds (temporal columns map to int64 on this backend).
fn as_i64(name: &str, value: &Value, temporal: bool) -> Result<i64> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u as i64))
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| anyhow::anyhow!("field '{}' has a non-integer value", name)),
        Value::String(s) => {
            if let Ok(v) = s.parse::<i64>() {
                return Ok(v);
            }
            if temporal {
                if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    return Ok(ts
                        .timestamp_nanos_opt()
                        .unwrap_or_else(|| ts.timestamp() * 1_000_000_000));
                }
            }
            bail!("field '{}' cannot encode '{}' as an integer", name, s)
        }
        other => bail!(
            "field '{}' cannot encode {} as an integer",
            name,
            type_label(other)
        ),
    }
}

fn as_f64(name: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("field '{}' has a non-numeric value", name)),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("field '{}' cannot encode '{}' as a float", name, s)),
        other => bail!(
            "field '{}' cannot encode {} as a float",
            name,
            type_label(other)
        ),
    }
}

fn as_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
