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

// ROS 2 typed backend
//
// Schemas are ROS 2 message-definition text (encoding `ros2msg`), messages
// are CDR-encoded payloads on channels with message encoding `cdr`. Schema
// names and field names are sanitized into valid ROS 2 identifiers, so the
// returned field keys map original column names onto their renamed fields.

use super::{ConvertedRow, ConverterBackend, FieldKeys, FileAttachment};
use crate::catalog::{self, ROS2_TIME_DEPENDENCY};
use crate::cdr;
use crate::error::ConvertError;
use crate::msgdef::{parse_message_definition, MessageLayout};
use crate::registry::RegisteredSchema;
use crate::table::{Cell, ColumnType, DataTable};
use anyhow::Result;
use mcap::records::MessageHeader;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::io::{Seek, Write};
use tracing::debug;

pub struct Ros2Backend<W: Write + Seek> {
    writer: mcap::Writer<W>,
    /// Parsed layout per registered schema, required to CDR-encode.
    layouts: HashMap<u16, MessageLayout>,
    channels: HashMap<(String, u16), u16>,
}

impl<W: Write + Seek> Ros2Backend<W> {
    pub fn new(writer: W) -> Result<Self> {
        Ok(Self {
            writer: mcap::WriteOptions::new().profile("ros2").create(writer)?,
            layouts: HashMap::new(),
            channels: HashMap::new(),
        })
    }

    fn channel_for(&mut self, topic: &str, schema_id: u16) -> Result<u16> {
        if let Some(id) = self.channels.get(&(topic.to_string(), schema_id)) {
            return Ok(*id);
        }
        if !self.layouts.contains_key(&schema_id) {
            return Err(ConvertError::InvalidSchemaId {
                topic: topic.to_string(),
                schema: schema_id.to_string(),
            }
            .into());
        }
        let channel_id = self
            .writer
            .add_channel(schema_id, topic, "cdr", &BTreeMap::new())?;
        self.channels
            .insert((topic.to_string(), schema_id), channel_id);
        Ok(channel_id)
    }

    fn register_definition(&mut self, schema_name: &str, text: &str) -> Result<u16> {
        let layout = parse_message_definition(schema_name, text)?;
        let schema_id = self
            .writer
            .add_schema(schema_name, "ros2msg", text.as_bytes())?;
        self.layouts.insert(schema_id, layout);
        Ok(schema_id)
    }
}

/// Rewrite an arbitrary name (usually a topic) into a valid `pkg/Msg` ROS 2
/// schema name: everything up to the last `/` becomes a lowercased
/// snake-case package, the last segment becomes PascalCase.
pub fn sanitize_schema_name(name: &str) -> String {
    let (package, msg) = match name.rfind('/') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("", name),
    };
    let invalid = Regex::new(r"[^a-zA-Z0-9]").unwrap();
    let package = invalid.replace_all(package, "_").to_lowercase();

    let invalid_field = Regex::new(r"[^a-zA-Z0-9_]").unwrap();
    let msg = invalid_field.replace_all(msg, "_");
    let msg: String = msg
        .split('_')
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect();

    format!("{package}/{msg}")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Rewrite a column name into a valid ROS 2 field name.
pub fn sanitize_field_name(name: &str) -> String {
    let invalid = Regex::new(r"[^a-zA-Z0-9_]").unwrap();
    invalid.replace_all(name, "_").to_lowercase()
}

/// ROS 2 field type for a column. Object columns sample their first
/// non-null value: text stays `string`, a sequence becomes an element-typed
/// unbounded array, an empty column defaults to `string[]`.
fn ros2_field_type(dtype: ColumnType, sample: Option<&Cell>) -> String {
    match dtype {
        ColumnType::Integer => "int64".to_string(),
        ColumnType::Float => "float64".to_string(),
        ColumnType::Boolean => "bool".to_string(),
        // Epoch nanoseconds; ISO-8601 text is coerced at encode time
        ColumnType::Timestamp => "int64".to_string(),
        ColumnType::Categorical | ColumnType::Text => "string".to_string(),
        ColumnType::Object => match sample {
            None => "string[]".to_string(),
            Some(Cell::Text(_)) => "string".to_string(),
            Some(Cell::Sequence(items)) => {
                let element = match items.first() {
                    Some(Value::Number(n)) if n.is_i64() || n.is_u64() => "int64",
                    Some(Value::Number(_)) => "float64",
                    Some(Value::Bool(_)) => "bool",
                    _ => "string",
                };
                format!("{element}[]")
            }
            Some(_) => "string".to_string(),
        },
    }
}

impl<W: Write + Seek> ConverterBackend for Ros2Backend<W> {
    fn register_generic_schema(
        &mut self,
        schema_name: &str,
        table: &DataTable,
        exclude: &[String],
    ) -> Result<RegisteredSchema> {
        let mut lines = vec!["builtin_interfaces/Time timestamp".to_string()];
        let mut pairs = Vec::new();
        for column in &table.columns {
            if exclude.contains(&column.name) {
                continue;
            }
            let field = sanitize_field_name(&column.name);
            // The leading time field owns this name
            if field == "timestamp" {
                continue;
            }
            lines.push(format!(
                "{} {}",
                ros2_field_type(column.dtype, column.first_non_null()),
                field
            ));
            pairs.push((column.name.clone(), field));
        }
        let text = format!("{}\n{}", lines.join("\n"), ROS2_TIME_DEPENDENCY);
        let schema_id = self.register_definition(schema_name, &text)?;
        debug!(
            "Registered generic ROS 2 schema '{}' ({} fields)",
            schema_name,
            pairs.len()
        );
        Ok(RegisteredSchema {
            schema_id,
            field_keys: Some(FieldKeys::Renamed(pairs)),
        })
    }

    fn register_named_schema(&mut self, schema_name: &str) -> Result<RegisteredSchema> {
        let text = catalog::ros2_msgdef(schema_name)
            .ok_or_else(|| ConvertError::UnknownSchema(schema_name.to_string()))?;
        let schema_id = self.register_definition(schema_name, text)?;
        Ok(RegisteredSchema {
            schema_id,
            field_keys: None,
        })
    }

    fn write_messages(
        &mut self,
        topic: &str,
        schema_id: u16,
        rows: &mut dyn Iterator<Item = Result<ConvertedRow>>,
    ) -> Result<usize> {
        let channel_id = self.channel_for(topic, schema_id)?;
        let layout = self.layouts.get(&schema_id).cloned().ok_or_else(|| {
            ConvertError::InvalidSchemaId {
                topic: topic.to_string(),
                schema: schema_id.to_string(),
            }
        })?;
        let mut written = 0;
        for (idx, row) in rows.enumerate() {
            let row = row?;
            let payload = cdr::encode_message(&layout, &row.message)?;
            self.writer.write_to_known_channel(
                &MessageHeader {
                    channel_id,
                    sequence: idx as u32,
                    log_time: row.log_time_ns,
                    publish_time: row.publish_time_ns,
                },
                &payload,
            )?;
            written += 1;
        }
        Ok(written)
    }

    fn attach(&mut self, attachment: FileAttachment) -> Result<()> {
        self.writer.attach(&mcap::Attachment {
            log_time: attachment.log_time_ns,
            create_time: attachment.create_time_ns,
            name: attachment.name,
            media_type: attachment.media_type,
            data: Cow::Owned(attachment.data),
        })?;
        Ok(())
    }

    fn add_metadata(&mut self, name: &str, metadata: &BTreeMap<String, String>) -> Result<()> {
        self.writer.write_metadata(&mcap::records::Metadata {
            name: name.to_string(),
            metadata: metadata.clone(),
        })?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.finish()?;
        Ok(())
    }

    fn format_name(&self) -> &str {
        "ros2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use std::io::Cursor;

    fn backend() -> Ros2Backend<Cursor<Vec<u8>>> {
        Ros2Backend::new(Cursor::new(Vec::new())).unwrap()
    }

    #[test]
    fn test_sanitize_schema_name() {
        assert_eq!(
            sanitize_schema_name("/robot/gps-data/location"),
            "_robot_gps_data/Location"
        );
        assert_eq!(sanitize_schema_name("sensors/imu reading"), "sensors/ImuReading");
        assert_eq!(sanitize_schema_name("plain"), "/Plain");
    }

    #[test]
    fn test_sanitize_field_name() {
        assert_eq!(sanitize_field_name("My Col.1"), "my_col_1");
        assert_eq!(sanitize_field_name("already_ok"), "already_ok");
    }

    #[test]
    fn test_ros2_field_types() {
        assert_eq!(ros2_field_type(ColumnType::Integer, None), "int64");
        assert_eq!(ros2_field_type(ColumnType::Timestamp, None), "int64");
        assert_eq!(ros2_field_type(ColumnType::Object, None), "string[]");
        let seq = Cell::Sequence(vec![Value::from(1.5)]);
        assert_eq!(ros2_field_type(ColumnType::Object, Some(&seq)), "float64[]");
        assert_eq!(
            ros2_field_type(ColumnType::Object, Some(&Cell::Text("x".into()))),
            "string"
        );
    }

    #[test]
    fn test_generic_schema_renames_fields() {
        let mut backend = backend();
        let table = DataTable::new(vec![
            Column::new("GPS Lat".to_string(), vec![Cell::Float(1.0)]),
            Column::new("count".to_string(), vec![Cell::Int(3)]),
        ]);
        let entry = backend
            .register_generic_schema("sensors/GpsData", &table, &[])
            .unwrap();
        match entry.field_keys.as_ref().unwrap() {
            FieldKeys::Renamed(pairs) => {
                assert_eq!(
                    pairs,
                    &vec![
                        ("GPS Lat".to_string(), "gps_lat".to_string()),
                        ("count".to_string(), "count".to_string()),
                    ]
                );
            }
            other => panic!("expected renamed keys, got {other:?}"),
        }
    }

    #[test]
    fn test_named_schema_from_catalog() {
        let mut backend = backend();
        assert!(backend
            .register_named_schema("foxglove_msgs/msg/CompressedImage")
            .is_ok());
        let err = backend.register_named_schema("nonexistent/Msg").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::UnknownSchema(_))
        ));
    }

    #[test]
    fn test_write_against_unknown_schema_fails() {
        let mut backend = backend();
        let err = backend
            .write_messages("/t", 9, &mut std::iter::empty())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::InvalidSchemaId { .. })
        ));
    }
}
