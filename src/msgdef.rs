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

// ROS 2 message definition parsing
//
// Parses concatenated message-definition text (the `ros2msg` schema encoding:
// a root definition followed by dependency sections separated by `===` lines
// with `MSG: pkg/Name` headers) into an encoding layout. Comments and
// constants are tolerated; structurally invalid text is a fatal error.

use crate::error::ConvertError;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
    String,
}

impl PrimitiveType {
    /// CDR alignment of the primitive (strings align on their length prefix).
    pub fn alignment(self) -> usize {
        match self {
            PrimitiveType::Bool | PrimitiveType::Int8 | PrimitiveType::Uint8 => 1,
            PrimitiveType::Int16 | PrimitiveType::Uint16 => 2,
            PrimitiveType::Int32
            | PrimitiveType::Uint32
            | PrimitiveType::Float32
            | PrimitiveType::String => 4,
            PrimitiveType::Int64 | PrimitiveType::Uint64 | PrimitiveType::Float64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimitiveType),
    /// Normalized `pkg/Name` key into the layout's type table.
    Complex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Scalar,
    /// Fixed-size array `T[N]`: exactly N elements, no count prefix.
    Array(usize),
    /// Unbounded `T[]` or bounded `T[<=N]` sequence: u32 count prefix.
    Sequence,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub arity: Arity,
}

#[derive(Debug, Clone, Default)]
pub struct MessageDef {
    pub fields: Vec<FieldDef>,
}

/// Parsed layout: the root definition plus every dependency section keyed by
/// normalized type name.
#[derive(Debug, Clone)]
pub struct MessageLayout {
    pub root: MessageDef,
    pub types: HashMap<String, MessageDef>,
}

impl MessageLayout {
    pub fn resolve(&self, key: &str) -> Option<&MessageDef> {
        self.types.get(key)
    }
}

/// Normalize `pkg/msg/Name` and `pkg/Name` to `pkg/Name`.
pub fn normalize_type_name(name: &str) -> String {
    name.replacen("/msg/", "/", 1)
}

pub fn parse_message_definition(
    schema_name: &str,
    text: &str,
) -> Result<MessageLayout, ConvertError> {
    let malformed = |detail: String| ConvertError::MalformedMessageDefinition {
        schema: schema_name.to_string(),
        detail,
    };

    let mut root: Option<MessageDef> = None;
    let mut types: HashMap<String, MessageDef> = HashMap::new();

    let mut section_name: Option<String> = None;
    let mut fields: Vec<FieldDef> = Vec::new();
    let mut flush =
        |name: &mut Option<String>, fields: &mut Vec<FieldDef>, root: &mut Option<MessageDef>| {
            let def = MessageDef {
                fields: std::mem::take(fields),
            };
            match name.take() {
                Some(n) => {
                    types.insert(normalize_type_name(&n), def);
                }
                // A fieldless unnamed section never becomes the root, so
                // whitespace/comment-only text stays an empty definition.
                None if !def.fields.is_empty() => *root = Some(def),
                None => {}
            }
        };

    let mut seen_separator = false;
    for raw_line in text.lines() {
        let line = strip_comment(raw_line).trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line.chars().all(|c| c == '=') && line.len() >= 3 {
            flush(&mut section_name, &mut fields, &mut root);
            seen_separator = true;
            continue;
        }
        if let Some(name) = line.strip_prefix("MSG:") {
            if !seen_separator && root.is_none() && fields.is_empty() {
                // MSG header without a preceding separator is tolerated only
                // for dependency sections.
                return Err(malformed("definition starts with a MSG header".into()));
            }
            section_name = Some(name.trim().to_string());
            seen_separator = false;
            continue;
        }
        if let Some(field) = parse_field_line(&line).map_err(&malformed)? {
            fields.push(field);
        }
    }
    flush(&mut section_name, &mut fields, &mut root);

    let root = root.ok_or_else(|| malformed("empty definition".into()))?;

    // builtin_interfaces types are known even without a dependency section.
    types
        .entry("builtin_interfaces/Time".to_string())
        .or_insert_with(builtin_time);
    types
        .entry("builtin_interfaces/Duration".to_string())
        .or_insert_with(builtin_time);

    // Every complex reference must resolve.
    let layout = MessageLayout { root, types };
    let mut pending: Vec<&MessageDef> = vec![&layout.root];
    pending.extend(layout.types.values());
    for def in pending {
        for field in &def.fields {
            if let FieldType::Complex(key) = &field.ty {
                if !layout.types.contains_key(key) {
                    return Err(malformed(format!(
                        "field '{}' references undefined type '{}'",
                        field.name, key
                    )));
                }
            }
        }
    }
    Ok(layout)
}

fn builtin_time() -> MessageDef {
    MessageDef {
        fields: vec![
            FieldDef {
                name: "sec".into(),
                ty: FieldType::Primitive(PrimitiveType::Int32),
                arity: Arity::Scalar,
            },
            FieldDef {
                name: "nanosec".into(),
                ty: FieldType::Primitive(PrimitiveType::Uint32),
                arity: Arity::Scalar,
            },
        ],
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Parse one field line. Returns Ok(None) for constant declarations.
fn parse_field_line(line: &str) -> Result<Option<FieldDef>, String> {
    let mut parts = line.split_whitespace();
    let type_token = parts
        .next()
        .ok_or_else(|| format!("invalid field line '{}'", line))?;
    let name_token = parts
        .next()
        .ok_or_else(|| format!("field '{}' is missing a name", line))?;

    // Constants (`uint8 LEVEL_DEBUG=1` or `uint8 LEVEL = 1`) carry no wire
    // data. The `=` must sit at or after the name; `<=` bounds in the type
    // token (`string<=64`, `string[<=10]`) are not constants.
    if name_token.contains('=') {
        return Ok(None);
    }
    if parts.next().is_some_and(|t| t.starts_with('=')) {
        return Ok(None);
    }

    let (base, arity) = split_array_suffix(type_token)?;
    let ty = match primitive_type(base) {
        Some(p) => FieldType::Primitive(p),
        None => {
            if !base.contains('/') {
                return Err(format!("unknown type '{}' in field '{}'", base, line));
            }
            FieldType::Complex(normalize_type_name(base))
        }
    };

    if name_token.is_empty()
        || !name_token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!("invalid field name '{}'", name_token));
    }

    Ok(Some(FieldDef {
        name: name_token.to_string(),
        ty,
        arity,
    }))
}

fn split_array_suffix(token: &str) -> Result<(&str, Arity), String> {
    match token.find('[') {
        None => Ok((token, Arity::Scalar)),
        Some(idx) => {
            let base = &token[..idx];
            let suffix = &token[idx..];
            let inner = suffix
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(|| format!("invalid array suffix '{}'", suffix))?;
            if inner.is_empty() || inner.starts_with("<=") {
                Ok((base, Arity::Sequence))
            } else {
                let n: usize = inner
                    .parse()
                    .map_err(|_| format!("invalid array size '{}'", inner))?;
                Ok((base, Arity::Array(n)))
            }
        }
    }
}

fn primitive_type(token: &str) -> Option<PrimitiveType> {
    // Bounded strings (`string<=N`) encode like plain strings.
    let token = token.split("<=").next().unwrap_or(token);
    match token {
        "bool" => Some(PrimitiveType::Bool),
        "int8" => Some(PrimitiveType::Int8),
        "uint8" | "byte" | "char" | "octet" => Some(PrimitiveType::Uint8),
        "int16" => Some(PrimitiveType::Int16),
        "uint16" => Some(PrimitiveType::Uint16),
        "int32" => Some(PrimitiveType::Int32),
        "uint32" => Some(PrimitiveType::Uint32),
        "int64" => Some(PrimitiveType::Int64),
        "uint64" => Some(PrimitiveType::Uint64),
        "float32" => Some(PrimitiveType::Float32),
        "float64" => Some(PrimitiveType::Float64),
        "string" | "wstring" => Some(PrimitiveType::String),
        _ => None,
    }
}
