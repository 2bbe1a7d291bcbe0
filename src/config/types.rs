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

// Configuration types for tabular-mcap

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main conversion configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Output writer format: "json" or "ros2"
    #[serde(default = "default_writer_format")]
    pub writer_format: String,

    /// Tabular file mappings, processed in declaration order
    #[serde(default)]
    pub tabular_mappings: Vec<TabularMapping>,

    /// Image/video mappings
    #[serde(default)]
    pub other_mappings: Vec<OtherMapping>,

    /// Files embedded verbatim as attachments
    #[serde(default)]
    pub attachments: Vec<AttachmentMapping>,

    /// Line-oriented key/value metadata files
    #[serde(default)]
    pub metadata: Vec<MetadataMapping>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            writer_format: default_writer_format(),
            tabular_mappings: Vec::new(),
            other_mappings: Vec::new(),
            attachments: Vec::new(),
            metadata: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Glob-based file matching shared by every mapping kind
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileMatching {
    /// Glob pattern resolved against the input root (e.g. "**/*.csv")
    pub file_pattern: String,

    /// Optional regex excluding matches, applied to the root-relative path
    #[serde(default)]
    pub exclude_file_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TabularMapping {
    #[serde(flatten)]
    pub matching: FileMatching,

    /// Converter functions applied to each matched file, one topic per entry
    #[serde(default)]
    pub converter_functions: Vec<ConverterSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConverterSpec {
    /// Name of a function from the converter-function file
    pub function_name: String,

    /// Predefined schema name; when absent a schema is generated from the
    /// table's column types
    #[serde(default)]
    pub schema_name: Option<String>,

    /// Appended to the file-derived topic name
    pub topic_suffix: String,

    /// Columns left out of generated schemas (templates still see them)
    #[serde(default)]
    pub exclude_columns: Option<Vec<String>>,
}

/// Image/video mapping variants, tagged by `type`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum OtherMapping {
    #[serde(rename = "compressed_image")]
    CompressedImage {
        #[serde(flatten)]
        matching: FileMatching,
        topic_suffix: String,
        frame_id: String,
        #[serde(default = "default_image_format")]
        format: String,
    },
    #[serde(rename = "compressed_video")]
    CompressedVideo {
        #[serde(flatten)]
        matching: FileMatching,
        topic_suffix: String,
        frame_id: String,
        #[serde(default = "default_video_format")]
        format: String,
    },
}

impl OtherMapping {
    pub fn matching(&self) -> &FileMatching {
        match self {
            OtherMapping::CompressedImage { matching, .. } => matching,
            OtherMapping::CompressedVideo { matching, .. } => matching,
        }
    }

    pub fn topic_suffix(&self) -> &str {
        match self {
            OtherMapping::CompressedImage { topic_suffix, .. } => topic_suffix,
            OtherMapping::CompressedVideo { topic_suffix, .. } => topic_suffix,
        }
    }

    pub fn frame_id(&self) -> &str {
        match self {
            OtherMapping::CompressedImage { frame_id, .. } => frame_id,
            OtherMapping::CompressedVideo { frame_id, .. } => frame_id,
        }
    }

    pub fn format(&self) -> &str {
        match self {
            OtherMapping::CompressedImage { format, .. } => format,
            OtherMapping::CompressedVideo { format, .. } => format,
        }
    }

    /// Catalog schema name, backend-specific spelling.
    pub fn schema_name(&self, writer_format: &str) -> String {
        let message = match self {
            OtherMapping::CompressedImage { .. } => "CompressedImage",
            OtherMapping::CompressedVideo { .. } => "CompressedVideo",
        };
        if writer_format == "ros2" {
            format!("foxglove_msgs/msg/{message}")
        } else {
            format!("foxglove.{message}")
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AttachmentMapping {
    #[serde(flatten)]
    pub matching: FileMatching,

    /// Attachment media type; inferred from the file extension when absent
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetadataMapping {
    #[serde(flatten)]
    pub matching: FileMatching,

    /// Key/value separator within each line
    pub separator: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One converter function definition from the converter-function file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConverterFunctionDefinition {
    /// Declared schema the template targets; informational only
    #[serde(default)]
    pub schema_name: Option<String>,

    /// Row template producing one JSON message
    #[serde(default = "default_template")]
    pub template: String,

    /// Template producing the log time in nanoseconds; when absent the time
    /// is taken from the message's own timestamp fields
    #[serde(default)]
    pub log_time_template: Option<String>,

    /// Template producing the publish time in nanoseconds; defaults to the
    /// log time
    #[serde(default)]
    pub publish_time_template: Option<String>,
}

/// Top-level shape of the converter-function file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConverterFunctionFile {
    /// Function definitions by name; ordered for deterministic iteration
    #[serde(default)]
    pub functions: BTreeMap<String, ConverterFunctionDefinition>,
}

fn default_writer_format() -> String {
    "json".to_string()
}

fn default_image_format() -> String {
    "jpeg".to_string()
}

fn default_video_format() -> String {
    "h264".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_template() -> String {
    "{}".to_string()
}
