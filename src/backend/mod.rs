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

// Writer backends
//
// A backend owns the MCAP output file and everything format-specific about
// it: schema generation, channel management, and message encoding. The two
// implementations are interchangeable behind `ConverterBackend`; the
// pipeline never branches on the output format after construction.

pub mod json;
pub mod ros2;

use crate::error::ConvertError;
use crate::registry::RegisteredSchema;
use crate::table::DataTable;
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub use json::JsonBackend;
pub use ros2::Ros2Backend;

/// How row columns map onto schema fields of a generically generated schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKeys {
    /// Field names equal column names.
    Columns(Vec<String>),
    /// `(column, field)` pairs where field names were sanitized away from
    /// the column names.
    Renamed(Vec<(String, String)>),
}

impl FieldKeys {
    /// Ordered `(column, field)` pairs.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        match self {
            FieldKeys::Columns(names) => {
                names.iter().map(|n| (n.as_str(), n.as_str())).collect()
            }
            FieldKeys::Renamed(pairs) => pairs
                .iter()
                .map(|(c, f)| (c.as_str(), f.as_str()))
                .collect(),
        }
    }
}

/// One converted message, ready to be encoded and written.
#[derive(Debug, Clone)]
pub struct ConvertedRow {
    pub message: Value,
    pub log_time_ns: u64,
    pub publish_time_ns: u64,
}

/// A file embedded into the output as an MCAP attachment.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub name: String,
    pub media_type: String,
    pub log_time_ns: u64,
    pub create_time_ns: u64,
    pub data: Vec<u8>,
}

/// Format-specific MCAP writer.
///
/// Schema registration hands back opaque handles; `write_messages` streams
/// one file's rows onto one topic. Implementations keep their own channel
/// table keyed by `(topic, schema)` so two files writing the same topic
/// with different schemas land on distinct channels.
pub trait ConverterBackend {
    /// Generate a schema from the table's inferred column types and register
    /// it under `schema_name`. Columns in `exclude` are left out of the
    /// schema and of the returned field keys; templates still see them.
    fn register_generic_schema(
        &mut self,
        schema_name: &str,
        table: &DataTable,
        exclude: &[String],
    ) -> Result<RegisteredSchema>;

    /// Register a schema from the predefined catalog.
    fn register_named_schema(&mut self, schema_name: &str) -> Result<RegisteredSchema>;

    /// Encode and write a stream of converted rows onto `topic`. Returns the
    /// number of messages written. Any row error aborts the stream.
    fn write_messages(
        &mut self,
        topic: &str,
        schema_id: u16,
        rows: &mut dyn Iterator<Item = Result<ConvertedRow>>,
    ) -> Result<usize>;

    /// Embed a file verbatim as an attachment.
    fn attach(&mut self, attachment: FileAttachment) -> Result<()>;

    /// Write a named key-value metadata record.
    fn add_metadata(&mut self, name: &str, metadata: &BTreeMap<String, String>) -> Result<()>;

    /// Finalize the MCAP file (summary section, footer). Must be called
    /// exactly once, after all writes.
    fn finish(&mut self) -> Result<()>;

    /// Backend identifier, matching the configured writer format.
    fn format_name(&self) -> &str;
}

/// Create the backend selected by the configured writer format.
///
/// The format is validated before the output file is created, so a bad
/// format never leaves an empty file behind.
pub fn backend_for_format(
    format: &str,
    output_path: &Path,
) -> Result<Box<dyn ConverterBackend>> {
    match format {
        "json" | "ros2" => {}
        other => return Err(ConvertError::UnsupportedWriterFormat(other.to_string()).into()),
    }
    let file = File::create(output_path)?;
    let writer = BufWriter::new(file);
    match format {
        "json" => Ok(Box::new(JsonBackend::new(writer)?)),
        "ros2" => Ok(Box::new(Ros2Backend::new(writer)?)),
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_field_keys_pairs() {
        let columns = FieldKeys::Columns(vec!["lat".into(), "lon".into()]);
        assert_eq!(columns.pairs(), vec![("lat", "lat"), ("lon", "lon")]);

        let renamed = FieldKeys::Renamed(vec![("my col".into(), "my_col".into())]);
        assert_eq!(renamed.pairs(), vec![("my col", "my_col")]);
    }

    #[test]
    fn test_unsupported_format_fails_before_creating_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mcap");
        let result = backend_for_format("parquet", &output);
        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_known_formats_create_backends() {
        let dir = tempdir().unwrap();
        let json = backend_for_format("json", &dir.path().join("a.mcap")).unwrap();
        assert_eq!(json.format_name(), "json");
        let ros2 = backend_for_format("ros2", &dir.path().join("b.mcap")).unwrap();
        assert_eq!(ros2.format_name(), "ros2");
    }
}
