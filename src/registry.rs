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

// Schema registry
//
// Deduplicates schema handles by logical name for one conversion run. A
// logical name maps to exactly one backend handle for the run's lifetime:
// the first `resolve` call invokes the generator and caches the result,
// every later call returns the cached entry without re-invoking it, even if
// the caller's column set differs. Schema drift across files sharing a name
// is therefore silently ignored.

use crate::backend::FieldKeys;
use anyhow::Result;
use std::collections::HashMap;

/// One registered schema: the backend handle plus, for generically generated
/// schemas, the ordered field key map used by column-copy conversion.
#[derive(Debug, Clone)]
pub struct RegisteredSchema {
    pub schema_id: u16,
    pub field_keys: Option<FieldKeys>,
}

#[derive(Default)]
pub struct SchemaRegistry {
    entries: HashMap<String, RegisteredSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `logical_name`, invoking `generator` only on the first call
    /// for that name.
    pub fn resolve<F>(&mut self, logical_name: &str, generator: F) -> Result<&RegisteredSchema>
    where
        F: FnOnce() -> Result<RegisteredSchema>,
    {
        if !self.entries.contains_key(logical_name) {
            let entry = generator()?;
            self.entries.insert(logical_name.to_string(), entry);
        }
        Ok(&self.entries[logical_name])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, logical_name: &str) -> bool {
        self.entries.contains_key(logical_name)
    }
}
