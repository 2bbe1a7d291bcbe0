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

// Timestamp resolution
//
// Derives `(log_time_ns, publish_time_ns)` for a converted message, first
// match wins:
//   1. the converter function's `log_time_template`, rendered against the row
//   2. a `timestamp.sec` / `timestamp.nsec` pair in the message
//   3. a nested `header.stamp.sec` / `header.stamp.nanosec` pair
//   4. otherwise the row fails with a fatal "no timestamp" error
//
// The publish time uses `publish_time_template` when present, else it equals
// the log time.

use crate::error::ConvertError;
use crate::template::{ConverterFunction, RowBindings, TemplateEngine};
use anyhow::Result;
use serde_json::Value;

pub fn resolve_row_times(
    engine: &dyn TemplateEngine,
    function: &ConverterFunction,
    bindings: &RowBindings,
    message: &Value,
) -> Result<(u64, u64)> {
    let log_time_ns = match &function.definition.log_time_template {
        Some(template) => function.render_time_ns(engine, template, bindings)?,
        None => stamp_from_message(message).ok_or(ConvertError::MissingTimestamp)?,
    };
    let publish_time_ns = match &function.definition.publish_time_template {
        Some(template) => function.render_time_ns(engine, template, bindings)?,
        None => log_time_ns,
    };
    Ok((log_time_ns, publish_time_ns))
}

/// Extract nanoseconds from the message's own time fields.
pub fn stamp_from_message(message: &Value) -> Option<u64> {
    if let Some(stamp) = message.get("timestamp") {
        return seconds_pair(stamp, "sec", "nsec");
    }
    if let Some(stamp) = message.get("header").and_then(|h| h.get("stamp")) {
        return seconds_pair(stamp, "sec", "nanosec");
    }
    None
}

fn seconds_pair(stamp: &Value, sec_key: &str, nsec_key: &str) -> Option<u64> {
    let sec = stamp.get(sec_key)?.as_i64()?;
    let nsec = stamp.get(nsec_key)?.as_i64()?;
    Some(
        (sec.max(0) as u64)
            .saturating_mul(1_000_000_000)
            .saturating_add(nsec.max(0) as u64),
    )
}
