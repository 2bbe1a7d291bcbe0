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

// Error taxonomy for the conversion pipeline
//
// Every variant here aborts the run when it surfaces. Recoverable situations
// (unknown file extension, unknown column value type) never become errors;
// they fall back with a logged warning instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The configuration names a writer format the pipeline cannot encode.
    /// Raised before the output file is opened.
    #[error("writer format '{0}' is not supported (supported: json, ros2)")]
    UnsupportedWriterFormat(String),

    /// A converter spec references a function name absent from the
    /// converter-function file.
    #[error("unknown converter function: {name}. Available functions: {available:?}")]
    UnknownConverterFunction {
        name: String,
        available: Vec<String>,
    },

    /// A named schema lookup missed the predefined catalog.
    #[error("no predefined schema named '{0}'")]
    UnknownSchema(String),

    /// A converted message carried neither a template-derived time nor a
    /// `timestamp` / `header.stamp` field.
    #[error("no timestamp found in message")]
    MissingTimestamp,

    /// A channel was opened with a zero or unregistered schema handle.
    #[error("channel '{topic}' expected a registered schema, got '{schema}'")]
    InvalidSchemaId { topic: String, schema: String },

    /// Message definition text failed structural parsing.
    #[error("malformed message definition for '{schema}': {detail}")]
    MalformedMessageDefinition { schema: String, detail: String },

    /// An optional decoding capability is missing from this build.
    #[error("{what} requires {dependency}, which is not available")]
    MissingCapability { what: String, dependency: String },
}
