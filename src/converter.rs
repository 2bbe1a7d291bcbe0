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

// Conversion orchestrator
//
// Single-threaded, single-pass: each matched file is fully loaded, converted
// and written before the next one starts, one row at a time. Any fatal error
// aborts the run and leaves the partially written output behind.

use crate::backend::{backend_for_format, ConvertedRow, ConverterBackend, FieldKeys};
use crate::config::{
    load_config, load_converter_functions, ConversionConfig, ConverterSpec, OtherMapping,
};
use crate::error::ConvertError;
use crate::media;
use crate::pattern::{resolve_files, FilePattern};
use crate::registry::SchemaRegistry;
use crate::table::{load_table, DataTable};
use crate::template::{ConverterFunction, SubstitutionEngine, TemplateEngine};
use crate::timestamp::resolve_row_times;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// Rows kept per table when test mode is on.
const TEST_MODE_ROWS: usize = 5;

pub struct McapConverter {
    config: ConversionConfig,
    functions: BTreeMap<String, ConverterFunction>,
    engine: Box<dyn TemplateEngine>,
    registry: SchemaRegistry,
}

impl McapConverter {
    pub fn new(
        config: ConversionConfig,
        functions: BTreeMap<String, ConverterFunction>,
    ) -> Self {
        Self {
            config,
            functions,
            engine: Box::new(SubstitutionEngine::new()),
            registry: SchemaRegistry::new(),
        }
    }

    /// Load configuration and converter functions from YAML files. A missing
    /// converter-function file leaves the function table empty.
    pub fn from_paths(config_path: &Path, functions_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        Self::from_config(config, functions_path)
    }

    /// Pair an already-loaded configuration with the converter-function file.
    pub fn from_config(config: ConversionConfig, functions_path: &Path) -> Result<Self> {
        let mut functions = BTreeMap::new();
        if functions_path.exists() {
            let file = load_converter_functions(functions_path)?;
            info!(
                "Loaded {} converter function definitions",
                file.functions.len()
            );
            for (name, definition) in file.functions {
                functions.insert(name.clone(), ConverterFunction::new(name, definition));
            }
        } else {
            warn!(
                "Converter functions file {} does not exist",
                functions_path.display()
            );
        }
        Ok(Self::new(config, functions))
    }

    /// Replace the bundled template engine.
    pub fn with_engine(mut self, engine: Box<dyn TemplateEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Convert every file matched under `input_path` into one MCAP file at
    /// `output_path`. `test_mode` limits each table to its first rows.
    pub fn convert(
        &mut self,
        input_path: &Path,
        output_path: &Path,
        topic_prefix: &str,
        test_mode: bool,
    ) -> Result<()> {
        info!("Input directory: {}", input_path.display());
        info!("Output MCAP: {}", output_path.display());

        // The writer format is validated before the output file is created
        let mut backend = backend_for_format(&self.config.writer_format, output_path)?;

        info!("{}", "=".repeat(60));
        info!("MCAP Conversion Plan");
        info!("{}", "=".repeat(60));
        info!("Tabular mappings:      {}", self.config.tabular_mappings.len());
        info!("Other mappings:        {}", self.config.other_mappings.len());
        info!("Attachments:           {}", self.config.attachments.len());
        info!("Metadata:              {}", self.config.metadata.len());
        info!("{}", "=".repeat(60));

        self.process_tabular_mappings(backend.as_mut(), input_path, topic_prefix, test_mode)?;
        self.process_other_mappings(backend.as_mut(), input_path, topic_prefix)?;
        self.process_attachments(backend.as_mut(), input_path)?;
        self.process_metadata(backend.as_mut(), input_path)?;

        info!("Finalizing MCAP file...");
        backend.finish()?;

        let size = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
        info!("Conversion completed successfully");
        info!("Output file: {}", output_path.display());
        info!("File size: {:.2} MB", size as f64 / (1024.0 * 1024.0));
        Ok(())
    }

    fn process_tabular_mappings(
        &mut self,
        backend: &mut dyn ConverterBackend,
        input_path: &Path,
        topic_prefix: &str,
        test_mode: bool,
    ) -> Result<()> {
        let mappings = self.config.tabular_mappings.clone();
        for mapping in &mappings {
            let pattern = FilePattern::new(
                &mapping.matching.file_pattern,
                mapping.matching.exclude_file_pattern.as_deref(),
            )?;
            for file in resolve_files(input_path, &pattern)? {
                let relative = relative_path_string(&file, input_path);
                let mut table = load_table(&file)
                    .with_context(|| format!("Failed to load table from {}", file.display()))?;
                table.sanitize_column_names();

                if test_mode {
                    let original_rows = table.row_count();
                    table.truncate_rows(TEST_MODE_ROWS);
                    debug!(
                        "Converting {} with {} rows (test mode: limited from {} rows)",
                        relative,
                        table.row_count(),
                        original_rows
                    );
                } else {
                    debug!("Converting {} with {} rows", relative, table.row_count());
                }

                for spec in &mapping.converter_functions {
                    debug!("Processing converter function: {}", spec.function_name);
                    self.convert_table(backend, &table, spec, &relative, topic_prefix)?;
                }
            }
        }
        Ok(())
    }

    /// Run one converter spec against one loaded table, producing one channel.
    fn convert_table(
        &mut self,
        backend: &mut dyn ConverterBackend,
        table: &DataTable,
        spec: &ConverterSpec,
        relative_path: &str,
        topic_prefix: &str,
    ) -> Result<()> {
        let function = self
            .functions
            .get(&spec.function_name)
            .ok_or_else(|| ConvertError::UnknownConverterFunction {
                name: spec.function_name.clone(),
                available: self.functions.keys().cloned().collect(),
            })?;

        let topic = format!(
            "{}{}/{}",
            topic_prefix,
            clean_string(relative_path),
            spec.topic_suffix
        );

        let entry = match &spec.schema_name {
            None => {
                let schema_name = generic_schema_name(&self.config.writer_format, &topic);
                let exclude = spec.exclude_columns.clone().unwrap_or_default();
                self.registry.resolve(&schema_name, || {
                    backend.register_generic_schema(&schema_name, table, &exclude)
                })?
            }
            Some(name) => self
                .registry
                .resolve(name, || backend.register_named_schema(name))?,
        };
        let schema_id = entry.schema_id;
        let field_keys = entry.field_keys.clone();

        let engine = self.engine.as_ref();
        let mut rows = (0..table.row_count()).map(|row_idx| -> Result<ConvertedRow> {
            let bindings = table.row_bindings(row_idx);
            let mut message = function.convert_row(engine, &bindings)?;
            if let Some(keys) = &field_keys {
                copy_columns(&mut message, keys, table, row_idx, &spec.function_name)?;
            }
            let (log_time_ns, publish_time_ns) =
                resolve_row_times(engine, function, &bindings, &message)?;
            Ok(ConvertedRow {
                message,
                log_time_ns,
                publish_time_ns,
            })
        });

        let written = backend.write_messages(&topic, schema_id, &mut rows)?;
        debug!("Wrote {} messages to {}", written, topic);
        Ok(())
    }

    fn process_other_mappings(
        &mut self,
        backend: &mut dyn ConverterBackend,
        input_path: &Path,
        topic_prefix: &str,
    ) -> Result<()> {
        let mappings = self.config.other_mappings.clone();
        for mapping in &mappings {
            let pattern = FilePattern::new(
                &mapping.matching().file_pattern,
                mapping.matching().exclude_file_pattern.as_deref(),
            )?;
            for file in resolve_files(input_path, &pattern)? {
                let relative = relative_path_string(&file, input_path);
                debug!("Processing other mapping: {}", relative);

                let stem = Path::new(&relative)
                    .with_extension("")
                    .to_string_lossy()
                    .into_owned();
                let topic = format!(
                    "{}{}/{}",
                    topic_prefix,
                    clean_string(&stem),
                    mapping.topic_suffix()
                );

                let schema_name = mapping.schema_name(&self.config.writer_format);
                let entry = self
                    .registry
                    .resolve(&schema_name, || backend.register_named_schema(&schema_name))?;
                let schema_id = entry.schema_id;

                let rows = match mapping {
                    OtherMapping::CompressedImage { format, frame_id, .. } => {
                        media::compressed_image_rows(&file, format, frame_id)?
                    }
                    OtherMapping::CompressedVideo { format, frame_id, .. } => {
                        media::compressed_video_rows(&file, format, frame_id)?
                    }
                };
                let written =
                    backend.write_messages(&topic, schema_id, &mut rows.into_iter().map(Ok))?;
                debug!("Wrote {} frames to {}", written, topic);
            }
        }
        Ok(())
    }

    fn process_attachments(
        &mut self,
        backend: &mut dyn ConverterBackend,
        input_path: &Path,
    ) -> Result<()> {
        for mapping in &self.config.attachments {
            let pattern = FilePattern::new(
                &mapping.matching.file_pattern,
                mapping.matching.exclude_file_pattern.as_deref(),
            )?;
            for file in resolve_files(input_path, &pattern)? {
                let relative = relative_path_string(&file, input_path);
                let data = std::fs::read(&file)?;
                let stat = std::fs::metadata(&file)?;
                let log_time_ns = system_time_ns(stat.modified().ok());
                let create_time_ns = system_time_ns(stat.created().ok().or(stat.modified().ok()));
                let media_type = mapping
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| media::infer_media_type(&file).to_string());

                debug!("Attaching {} ({} bytes)", relative, data.len());
                backend.attach(crate::backend::FileAttachment {
                    name: relative,
                    media_type,
                    log_time_ns,
                    create_time_ns,
                    data,
                })?;
            }
        }
        Ok(())
    }

    fn process_metadata(
        &mut self,
        backend: &mut dyn ConverterBackend,
        input_path: &Path,
    ) -> Result<()> {
        for mapping in &self.config.metadata {
            let pattern = FilePattern::new(
                &mapping.matching.file_pattern,
                mapping.matching.exclude_file_pattern.as_deref(),
            )?;
            for file in resolve_files(input_path, &pattern)? {
                let relative = relative_path_string(&file, input_path);
                let content = std::fs::read_to_string(&file)?;
                let metadata = parse_metadata_lines(&content, &mapping.separator);
                debug!("Metadata {} with {} entries", relative, metadata.len());
                backend.add_metadata(&relative, &metadata)?;
            }
        }
        Ok(())
    }
}

/// Compose the copied column values over the template output. The template
/// must have produced a JSON object for there to be anything to merge into.
fn copy_columns(
    message: &mut serde_json::Value,
    keys: &FieldKeys,
    table: &DataTable,
    row_idx: usize,
    function_name: &str,
) -> Result<()> {
    let obj = message.as_object_mut().ok_or_else(|| {
        anyhow!(
            "Converter function '{}' must produce a JSON object for a generated schema",
            function_name
        )
    })?;
    for (column, field) in keys.pairs() {
        obj.insert(field.to_string(), table.cell_json(row_idx, column));
    }
    Ok(())
}

/// Strip spaces, dots and hyphens; used to flatten a relative path into a
/// topic segment.
fn clean_string(s: &str) -> String {
    let re = Regex::new(r"[ .-]").unwrap();
    re.replace_all(s, "").to_string()
}

/// Schema name for a generically generated schema, derived from the topic.
fn generic_schema_name(writer_format: &str, topic: &str) -> String {
    if writer_format == "ros2" {
        crate::backend::ros2::sanitize_schema_name(topic)
    } else {
        format!("table.{}", topic.replace('/', "."))
    }
}

fn relative_path_string(file: &Path, root: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative.to_string_lossy().replace('\\', "/")
}

fn system_time_ns(time: Option<std::time::SystemTime>) -> u64 {
    time.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Parse line-oriented `key<sep>value` text. The separator splits each line
/// once, so values may contain it; lines without the separator are skipped.
fn parse_metadata_lines(content: &str, separator: &str) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    for line in content.lines() {
        if let Some((key, value)) = line.trim().split_once(separator) {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_string_strips_separators() {
        assert_eq!(clean_string("data/gps log-01.csv"), "data/gpslog01csv");
    }

    #[test]
    fn test_generic_schema_name_per_format() {
        assert_eq!(
            generic_schema_name("json", "/robot/gps/location"),
            "table..robot.gps.location"
        );
        assert_eq!(
            generic_schema_name("ros2", "/robot/gps/location"),
            "_robot_gps/Location"
        );
    }

    #[test]
    fn test_parse_metadata_lines() {
        let content = "name: rover\nmission: survey: alpha\nmalformed line\n";
        let metadata = parse_metadata_lines(content, ": ");
        assert_eq!(metadata.get("name"), Some(&"rover".to_string()));
        // The separator splits once, the rest of the line is the value
        assert_eq!(metadata.get("mission"), Some(&"survey: alpha".to_string()));
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn test_from_config_tolerates_missing_functions_file() {
        let dir = tempfile::tempdir().unwrap();
        let converter = McapConverter::from_config(
            ConversionConfig::default(),
            &dir.path().join("no_such_functions.yaml"),
        )
        .unwrap();
        assert!(converter.functions.is_empty());
    }

    #[test]
    fn test_unknown_converter_function_is_fatal() {
        let config = ConversionConfig::default();
        let mut converter = McapConverter::new(config, BTreeMap::new());
        let table = DataTable::default();
        let spec = ConverterSpec {
            function_name: "missing".to_string(),
            schema_name: None,
            topic_suffix: "data".to_string(),
            exclude_columns: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let mut backend =
            backend_for_format("json", &dir.path().join("out.mcap")).unwrap();
        let err = converter
            .convert_table(backend.as_mut(), &table, &spec, "a.csv", "")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::UnknownConverterFunction { .. })
        ));
    }

    #[test]
    fn test_copy_columns_requires_object() {
        let table = DataTable::default();
        let keys = FieldKeys::Columns(vec![]);
        let mut message = json!([1, 2]);
        assert!(copy_columns(&mut message, &keys, &table, 0, "f").is_err());
    }
}
