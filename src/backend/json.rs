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

// Generic JSON backend
//
// Schemas are JSON-schema documents generated from inferred column types or
// taken from the bundled Foxglove catalog; messages are UTF-8 JSON payloads
// on channels with message encoding `json`.

use super::{ConvertedRow, ConverterBackend, FieldKeys, FileAttachment};
use crate::catalog;
use crate::error::ConvertError;
use crate::registry::RegisteredSchema;
use crate::table::{Cell, ColumnType, DataTable};
use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mcap::records::MessageHeader;
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::io::{Seek, Write};
use tracing::debug;

pub struct JsonBackend<W: Write + Seek> {
    writer: mcap::Writer<W>,
    /// Registered schema handles, by id. A write against an unknown id is a
    /// pipeline bug and fails fast.
    schema_names: HashMap<u16, String>,
    /// Channel table keyed by `(topic, schema_id)`: the same topic written
    /// with two schemas lands on two channels.
    channels: HashMap<(String, u16), u16>,
}

impl<W: Write + Seek> JsonBackend<W> {
    pub fn new(writer: W) -> Result<Self> {
        Ok(Self {
            writer: mcap::Writer::new(writer)?,
            schema_names: HashMap::new(),
            channels: HashMap::new(),
        })
    }

    fn channel_for(&mut self, topic: &str, schema_id: u16) -> Result<u16> {
        if let Some(id) = self.channels.get(&(topic.to_string(), schema_id)) {
            return Ok(*id);
        }
        if !self.schema_names.contains_key(&schema_id) {
            return Err(ConvertError::InvalidSchemaId {
                topic: topic.to_string(),
                schema: schema_id.to_string(),
            }
            .into());
        }
        let channel_id =
            self.writer
                .add_channel(schema_id, topic, "json", &BTreeMap::new())?;
        self.channels
            .insert((topic.to_string(), schema_id), channel_id);
        Ok(channel_id)
    }
}

/// JSON-schema fragment for one column, from its inferred type. Object
/// columns sample their first non-null value: a scalar string stays
/// `string`, a homogeneous sequence becomes a typed array, anything else
/// falls back to `string`.
fn column_property(dtype: ColumnType, sample: Option<&Cell>) -> Value {
    match dtype {
        ColumnType::Integer => json!({"type": "integer"}),
        ColumnType::Float => json!({"type": "number"}),
        ColumnType::Boolean => json!({"type": "boolean"}),
        // Serialized as ISO-8601 text
        ColumnType::Timestamp => json!({"type": "string"}),
        ColumnType::Categorical | ColumnType::Text => json!({"type": "string"}),
        ColumnType::Object => match sample {
            Some(Cell::Sequence(items)) => {
                let item_type = match items.first() {
                    Some(Value::Number(n)) if n.is_i64() || n.is_u64() => "integer",
                    Some(Value::Number(_)) => "number",
                    Some(Value::Bool(_)) => "boolean",
                    _ => "string",
                };
                json!({"type": "array", "items": {"type": item_type}})
            }
            _ => json!({"type": "string"}),
        },
    }
}

fn time_property() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sec": {"type": "integer", "minimum": 0},
            "nsec": {"type": "integer", "minimum": 0, "maximum": 999999999}
        }
    })
}

/// A `data` field holding an array of byte-range integers is re-encoded as
/// a base64 string, mirroring how binary payloads travel through JSON.
fn base64_data_field(message: &mut Value) {
    let Some(obj) = message.as_object_mut() else {
        return;
    };
    let Some(Value::Array(items)) = obj.get("data") else {
        return;
    };
    let mut bytes = Vec::with_capacity(items.len());
    for item in items {
        match item.as_u64() {
            Some(b) if b <= 255 => bytes.push(b as u8),
            _ => return,
        }
    }
    obj.insert("data".to_string(), Value::String(BASE64.encode(bytes)));
}

impl<W: Write + Seek> ConverterBackend for JsonBackend<W> {
    fn register_generic_schema(
        &mut self,
        schema_name: &str,
        table: &DataTable,
        exclude: &[String],
    ) -> Result<RegisteredSchema> {
        let columns: Vec<_> = table
            .columns
            .iter()
            .filter(|c| !exclude.contains(&c.name))
            .collect();
        let mut properties = Map::new();
        // Every generated schema carries a leading time field so messages
        // stay time-indexable even without a template.
        properties.insert("timestamp".to_string(), time_property());
        for column in &columns {
            if column.name == "timestamp" {
                continue;
            }
            properties.insert(
                column.name.clone(),
                column_property(column.dtype, column.first_non_null()),
            );
        }
        let schema = json!({"type": "object", "properties": Value::Object(properties)});
        let data = serde_json::to_vec(&schema)?;
        let schema_id = self.writer.add_schema(schema_name, "jsonschema", &data)?;
        self.schema_names.insert(schema_id, schema_name.to_string());
        debug!(
            "Registered generic JSON schema '{}' ({} columns)",
            schema_name,
            columns.len()
        );

        let keys = columns.iter().map(|c| c.name.clone()).collect();
        Ok(RegisteredSchema {
            schema_id,
            field_keys: Some(FieldKeys::Columns(keys)),
        })
    }

    fn register_named_schema(&mut self, schema_name: &str) -> Result<RegisteredSchema> {
        let Some(short) = schema_name.strip_prefix("foxglove.") else {
            return Err(ConvertError::UnknownSchema(schema_name.to_string()).into());
        };
        let data = catalog::foxglove_jsonschema(short)
            .ok_or_else(|| ConvertError::UnknownSchema(schema_name.to_string()))?;
        let registered_name = format!("foxglove.{short}");
        let schema_id =
            self.writer
                .add_schema(&registered_name, "jsonschema", data.as_bytes())?;
        self.schema_names.insert(schema_id, registered_name);
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
        let mut written = 0;
        for row in rows {
            let mut row = row?;
            base64_data_field(&mut row.message);
            let payload = serde_json::to_vec(&row.message)?;
            self.writer.write_to_known_channel(
                &MessageHeader {
                    channel_id,
                    sequence: 0,
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
        "json"
    }
}
