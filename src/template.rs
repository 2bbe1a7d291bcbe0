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

// Templated row conversion
//
// A template maps one row's column values to an arbitrary JSON object. The
// engine is an injected capability behind the `TemplateEngine` trait so the
// pipeline stays engine-agnostic; the bundled engine performs strict
// `{{ column }}` substitution. Values are inserted in their plain form
// (strings unquoted, everything else as JSON text), so templates quote string
// fields themselves:
//
// ```text
// {"lat": {{ lat }}, "name": "{{ name }}"}
// ```

use crate::config::ConverterFunctionDefinition;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// Column values of one row, bound by name. Null cells are present as
/// explicit nulls.
pub type RowBindings = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("undefined variable '{0}' in template")]
    UndefinedVariable(String),

    #[error("template output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("template output '{0}' is not a nanosecond integer")]
    NotNanoseconds(String),
}

/// Pure row-to-text rendering capability.
pub trait TemplateEngine {
    fn render(&self, template: &str, bindings: &RowBindings) -> Result<String, TemplateError>;
}

/// Bundled engine: replaces `{{ column }}` placeholders with the bound value.
/// Unknown columns are an error, never silently empty.
pub struct SubstitutionEngine {
    placeholder: Regex,
}

impl SubstitutionEngine {
    pub fn new() -> Self {
        Self {
            placeholder: Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap(),
        }
    }
}

impl Default for SubstitutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for SubstitutionEngine {
    fn render(&self, template: &str, bindings: &RowBindings) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in self.placeholder.captures_iter(template) {
            let whole = caps.get(0).unwrap();
            let name = &caps[1];
            let value = bindings
                .get(name)
                .ok_or_else(|| TemplateError::UndefinedVariable(name.to_string()))?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(&plain_form(value));
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }
}

/// Strings are inserted raw, everything else as JSON text (`null` for nulls).
fn plain_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A loaded converter function: immutable definition shared read-only across
/// all rows and files that reference it.
#[derive(Debug, Clone)]
pub struct ConverterFunction {
    pub name: String,
    pub definition: ConverterFunctionDefinition,
}

impl ConverterFunction {
    pub fn new(name: String, definition: ConverterFunctionDefinition) -> Self {
        Self { name, definition }
    }

    /// Render the row template and parse the result as JSON. Failures are
    /// fatal for the row and logged with the offending row's data.
    pub fn convert_row(
        &self,
        engine: &dyn TemplateEngine,
        bindings: &RowBindings,
    ) -> Result<Value, TemplateError> {
        let rendered = engine
            .render(&self.definition.template, bindings)
            .map_err(|e| {
                let row = Value::Object(bindings.clone());
                error!(
                    "Error rendering converter function '{}': {}. Row data: {}",
                    self.name, e, row
                );
                e
            })?;
        serde_json::from_str(&rendered).map_err(|e| {
            error!(
                "Converter function '{}' produced invalid JSON: {}. Template result: {}",
                self.name, e, rendered
            );
            TemplateError::InvalidJson(e)
        })
    }

    /// Render a time template and parse it as integer nanoseconds.
    pub fn render_time_ns(
        &self,
        engine: &dyn TemplateEngine,
        template: &str,
        bindings: &RowBindings,
    ) -> Result<u64, TemplateError> {
        let rendered = engine.render(template, bindings)?;
        let trimmed = rendered.trim();
        if let Ok(ns) = trimmed.parse::<u64>() {
            return Ok(ns);
        }
        // Tolerate a float rendering of a whole nanosecond count
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() && f >= 0.0 {
                return Ok(f as u64);
            }
        }
        Err(TemplateError::NotNanoseconds(trimmed.to_string()))
    }
}
