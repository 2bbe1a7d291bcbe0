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

// File matching for mapping rules
//
// `file_pattern` uses glob semantics (`*` stays within one path segment,
// `**` crosses segments, `?` matches one character). `exclude_file_pattern`
// is a regular expression anchored at the start of the file's root-relative
// path. Matching is always performed against the root-relative path with
// `/` separators, never against the basename alone.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

pub struct FilePattern {
    include: Regex,
    exclude: Option<Regex>,
}

impl FilePattern {
    pub fn new(file_pattern: &str, exclude_file_pattern: Option<&str>) -> Result<Self> {
        let include = Regex::new(&glob_to_regex(file_pattern))
            .with_context(|| format!("Invalid file pattern '{}'", file_pattern))?;
        let exclude = exclude_file_pattern
            .map(|p| {
                Regex::new(&format!("^(?:{})", p))
                    .with_context(|| format!("Invalid exclude pattern '{}'", p))
            })
            .transpose()?;
        Ok(Self { include, exclude })
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        self.include.is_match(relative_path) && !self.is_excluded(relative_path)
    }

    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.exclude
            .as_ref()
            .map(|re| re.is_match(relative_path))
            .unwrap_or(false)
    }
}

/// Translate a glob into an anchored regular expression.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // "**/" may match zero directories
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// Resolve all files under `root` matching `pattern`, in a deterministic
/// lexicographic walk order. Returned paths are absolute.
pub fn resolve_files(root: &Path, pattern: &FilePattern) -> Result<Vec<PathBuf>> {
    let mut matched = Vec::new();
    walk(root, root, pattern, &mut matched)?;
    Ok(matched)
}

fn walk(root: &Path, dir: &Path, pattern: &FilePattern, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            walk(root, &entry, pattern, out)?;
        } else {
            let relative = entry
                .strip_prefix(root)
                .expect("walked path must be under root")
                .to_string_lossy()
                .replace('\\', "/");
            if pattern.matches(&relative) {
                out.push(entry);
            }
        }
    }
    Ok(())
}
