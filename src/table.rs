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

// In-memory table with typed columns
//
// Loads tabular files (CSV/TSV/TXT via the csv crate, JSON/JSONL via
// serde_json) into a column-oriented table. An unrecognized extension falls
// back to a CSV load attempt with a warning rather than failing.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// One table cell. `Null` covers both missing values and NaN.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<FixedOffset>),
    /// Sequence-valued cell, kept in JSON form (sequences only arrive from
    /// JSON rows).
    Sequence(Vec<Value>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Portable JSON form: temporal values become ISO-8601 text, sequences
    /// stay arrays (even when empty), null stays an explicit null.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Timestamp(ts) => Value::String(ts.to_rfc3339()),
            Cell::Sequence(items) => Value::Array(items.clone()),
        }
    }
}

/// Declared value type of a column, inferred from its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Categorical,
    Text,
    /// Mixed or sequence-valued column; disambiguated downstream by sampling
    /// the first non-null value.
    Object,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: String, cells: Vec<Cell>) -> Self {
        let dtype = infer_column_type(&cells);
        Self { name, dtype, cells }
    }

    pub fn first_non_null(&self) -> Option<&Cell> {
        self.cells.iter().find(|c| !c.is_null())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataTable {
    pub columns: Vec<Column>,
}

impl DataTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.cells.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cell value as JSON, `Null` when the column is absent.
    pub fn cell_json(&self, row: usize, column: &str) -> Value {
        self.column(column)
            .and_then(|c| c.cells.get(row))
            .map(Cell::to_json)
            .unwrap_or(Value::Null)
    }

    /// All column values of one row, bound by name. Null cells are bound as
    /// explicit nulls, never omitted.
    pub fn row_bindings(&self, row: usize) -> serde_json::Map<String, Value> {
        self.columns
            .iter()
            .map(|c| {
                let value = c.cells.get(row).map(Cell::to_json).unwrap_or(Value::Null);
                (c.name.clone(), value)
            })
            .collect()
    }

    /// Keep only the first `n` rows (test mode).
    pub fn truncate_rows(&mut self, n: usize) {
        for column in &mut self.columns {
            column.cells.truncate(n);
        }
    }

    /// Replace separator characters (space, dot, hyphen) with `_`, then strip
    /// everything outside `[A-Za-z0-9_]`.
    pub fn sanitize_column_names(&mut self) {
        let separators = Regex::new(r"[ .-]").unwrap();
        let invalid = Regex::new(r"[^A-Za-z0-9_]").unwrap();
        for column in &mut self.columns {
            let replaced = separators.replace_all(&column.name, "_");
            column.name = invalid.replace_all(&replaced, "").to_string();
        }
    }
}

fn infer_column_type(cells: &[Cell]) -> ColumnType {
    let mut ty: Option<ColumnType> = None;
    for cell in cells {
        let cur = match cell {
            Cell::Null => continue,
            Cell::Bool(_) => ColumnType::Boolean,
            Cell::Int(_) => ColumnType::Integer,
            Cell::Float(_) => ColumnType::Float,
            Cell::Text(_) => ColumnType::Text,
            Cell::Timestamp(_) => ColumnType::Timestamp,
            Cell::Sequence(_) => ColumnType::Object,
        };
        ty = Some(match (ty, cur) {
            (None, t) => t,
            (Some(t), u) if t == u => t,
            // Int/float mixes widen to float; everything else degrades to
            // an object column resolved by sampling.
            (Some(ColumnType::Integer), ColumnType::Float)
            | (Some(ColumnType::Float), ColumnType::Integer) => ColumnType::Float,
            _ => ColumnType::Object,
        });
    }
    ty.unwrap_or(ColumnType::Text)
}

/// Load tabular data from `path`, dispatching on the file extension.
pub fn load_table(path: &Path) -> Result<DataTable> {
    let suffix = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match suffix.as_str() {
        "csv" | "txt" => load_delimited(path, b','),
        "tsv" => load_delimited(path, b'\t'),
        "json" => load_json(path, false),
        "jsonl" => load_json(path, true),
        other => {
            warn!(
                "Unknown file extension '{}' for {}. Attempting to read as CSV",
                other,
                path.display()
            );
            load_delimited(path, b',')
        }
    }
}

fn load_delimited(path: &Path, delimiter: u8) -> Result<DataTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to open tabular file {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.with_context(|| format!("Failed to parse {}", path.display()))?;
        for (i, field) in record.iter().enumerate() {
            if i < cells.len() {
                cells[i].push(parse_scalar(field));
            }
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, data)| Column::new(name, data))
        .collect();
    Ok(DataTable::new(columns))
}

fn load_json(path: &Path, lines: bool) -> Result<DataTable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let rows: Vec<Value> = if lines {
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("Failed to parse JSON line"))
            .collect::<Result<_>>()?
    } else {
        match serde_json::from_str(&text).context("Failed to parse JSON file")? {
            Value::Array(items) => items,
            other => vec![other],
        }
    };

    // Column order follows first appearance across rows.
    let mut names: Vec<String> = Vec::new();
    for row in &rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let data = rows
                .iter()
                .map(|row| match row {
                    Value::Object(map) => map.get(&name).map(json_to_cell).unwrap_or(Cell::Null),
                    _ => Cell::Null,
                })
                .collect();
            Column::new(name, data)
        })
        .collect();
    Ok(DataTable::new(columns))
}

fn json_to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Int(i)
            } else {
                n.as_f64().map(Cell::Float).unwrap_or(Cell::Null)
            }
        }
        Value::String(s) => Cell::Text(s.clone()),
        Value::Array(items) => Cell::Sequence(items.clone()),
        Value::Object(_) => Cell::Text(value.to_string()),
    }
}

/// Parse one delimited-text field into a typed cell.
fn parse_scalar(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Null;
    }
    match trimmed {
        "true" | "True" | "TRUE" => return Cell::Bool(true),
        "false" | "False" | "FALSE" => return Cell::Bool(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_nan() {
            return Cell::Null;
        }
        return Cell::Float(f);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Cell::Timestamp(ts);
    }
    Cell::Text(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str, ext: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join(format!("data.{}", ext))).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        dir
    }

    #[test]
    fn test_csv_type_inference() {
        let dir = write_temp("lat,lon,name,ok,ts\n1.0,2,alpha,true,2024-01-01T00:00:00Z\n", "csv");
        let table = load_table(&dir.path().join("data.csv")).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column("lat").unwrap().dtype, ColumnType::Float);
        assert_eq!(table.column("lon").unwrap().dtype, ColumnType::Integer);
        assert_eq!(table.column("name").unwrap().dtype, ColumnType::Text);
        assert_eq!(table.column("ok").unwrap().dtype, ColumnType::Boolean);
        assert_eq!(table.column("ts").unwrap().dtype, ColumnType::Timestamp);
    }

    #[test]
    fn test_empty_fields_are_null() {
        let dir = write_temp("a,b\n1,\n,2\n", "csv");
        let table = load_table(&dir.path().join("data.csv")).unwrap();
        assert_eq!(table.column("a").unwrap().cells[1], Cell::Null);
        assert_eq!(table.column("b").unwrap().cells[0], Cell::Null);
        // Nulls do not affect the inferred type
        assert_eq!(table.column("a").unwrap().dtype, ColumnType::Integer);
    }

    #[test]
    fn test_int_float_mix_widens() {
        let dir = write_temp("x\n1\n2.5\n", "csv");
        let table = load_table(&dir.path().join("data.csv")).unwrap();
        assert_eq!(table.column("x").unwrap().dtype, ColumnType::Float);
    }

    #[test]
    fn test_jsonl_sequences() {
        let dir = write_temp("{\"v\": [1, 2, 3]}\n{\"v\": []}\n", "jsonl");
        let table = load_table(&dir.path().join("data.jsonl")).unwrap();
        let col = table.column("v").unwrap();
        assert_eq!(col.dtype, ColumnType::Object);
        assert_eq!(col.cells[1], Cell::Sequence(vec![]));
    }

    #[test]
    fn test_sanitize_column_names() {
        let mut table = DataTable::new(vec![
            Column::new("GPS Lat.deg".into(), vec![]),
            Column::new("speed-m/s".into(), vec![]),
        ]);
        table.sanitize_column_names();
        assert_eq!(table.columns[0].name, "GPS_Lat_deg");
        assert_eq!(table.columns[1].name, "speed_ms");
    }

    #[test]
    fn test_unknown_extension_falls_back_to_csv() {
        let dir = write_temp("a\n1\n", "dat");
        let table = load_table(&dir.path().join("data.dat")).unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_truncate_rows() {
        let dir = write_temp("a\n1\n2\n3\n4\n5\n6\n7\n", "csv");
        let mut table = load_table(&dir.path().join("data.csv")).unwrap();
        table.truncate_rows(5);
        assert_eq!(table.row_count(), 5);
    }

    #[test]
    fn test_row_bindings_include_explicit_null() {
        let dir = write_temp("a,b\n1,\n", "csv");
        let table = load_table(&dir.path().join("data.csv")).unwrap();
        let bindings = table.row_bindings(0);
        assert_eq!(bindings.get("b"), Some(&Value::Null));
    }
}
