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

// Multimedia mappings
//
// Turns matched image/video files into compressed-frame messages. Decoding
// and re-encoding are external capabilities this build does not carry: the
// only supported path is passing through a file that is already encoded in
// the configured format (one frame, timestamp zero). Everything else is
// reported as a missing-capability error naming the dependency.

use crate::backend::ConvertedRow;
use crate::error::ConvertError;
use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::path::Path;

const SUPPORTED_IMAGE_FORMATS: [&str; 4] = ["jpeg", "png", "webp", "avif"];
const SUPPORTED_VIDEO_FORMATS: [&str; 4] = ["h264", "h265", "vp9", "av1"];

/// Compressed-image messages for one matched file.
pub fn compressed_image_rows(path: &Path, format: &str, frame_id: &str) -> Result<Vec<ConvertedRow>> {
    if !SUPPORTED_IMAGE_FORMATS.contains(&format) {
        bail!(
            "CompressedImage unsupported format: {}. Supported formats: {:?}",
            format,
            SUPPORTED_IMAGE_FORMATS
        );
    }
    if !extension_matches(path, format) {
        return Err(ConvertError::MissingCapability {
            what: format!(
                "re-encoding '{}' into {} frames",
                path.display(),
                format
            ),
            dependency: "ffmpeg".to_string(),
        }
        .into());
    }
    let data = std::fs::read(path)?;
    Ok(vec![frame_row(frame_id, format, &data, 0)])
}

/// Compressed-video messages for one matched file. Always a capability
/// error: packetizing into h264/h265/vp9/av1 needs an encoder.
pub fn compressed_video_rows(path: &Path, format: &str, _frame_id: &str) -> Result<Vec<ConvertedRow>> {
    if !SUPPORTED_VIDEO_FORMATS.contains(&format) {
        bail!(
            "CompressedVideo unsupported format: {}. Supported formats: {:?}",
            format,
            SUPPORTED_VIDEO_FORMATS
        );
    }
    Err(ConvertError::MissingCapability {
        what: format!("encoding '{}' into {} packets", path.display(), format),
        dependency: "ffmpeg".to_string(),
    }
    .into())
}

fn extension_matches(path: &Path, format: &str) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return false;
    };
    match format {
        "jpeg" => ext == "jpg" || ext == "jpeg",
        other => ext == other,
    }
}

fn frame_row(frame_id: &str, format: &str, data: &[u8], timestamp_ns: u64) -> ConvertedRow {
    let bytes: Vec<Value> = data.iter().map(|b| json!(b)).collect();
    ConvertedRow {
        message: json!({
            "timestamp": {
                "sec": timestamp_ns / 1_000_000_000,
                "nsec": timestamp_ns % 1_000_000_000,
            },
            "frame_id": frame_id,
            "data": bytes,
            "format": format,
        }),
        log_time_ns: timestamp_ns,
        publish_time_ns: timestamp_ns,
    }
}

/// Media type by file extension, for attachments without a configured one.
pub fn infer_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" | "jsonl" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
