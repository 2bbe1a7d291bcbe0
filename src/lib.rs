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

// Tabular and multimedia data to MCAP converter
//
// Given a declarative set of file-matching rules, this crate:
// - Loads tabular files into typed in-memory tables
// - Infers message schemas from column types or resolves them from a
//   bundled catalog
// - Converts each row into a schema-conformant message via templates
// - Derives log/publish timestamps per message
// - Writes everything through one of two interchangeable MCAP backends
//   (generic JSON or typed ROS 2/CDR), plus attachments and metadata

pub mod backend;
pub mod catalog;
pub mod cdr;
pub mod config;
pub mod converter;
pub mod error;
pub mod media;
pub mod msgdef;
pub mod pattern;
pub mod registry;
pub mod table;
pub mod template;
pub mod timestamp;

// Re-export main types
pub use backend::{backend_for_format, ConvertedRow, ConverterBackend, FieldKeys};
pub use config::{load_config, load_converter_functions, ConversionConfig};
pub use converter::McapConverter;
pub use error::ConvertError;
pub use registry::{RegisteredSchema, SchemaRegistry};
pub use table::{load_table, DataTable};
pub use template::{ConverterFunction, SubstitutionEngine, TemplateEngine};
