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

// Predefined schema catalog
//
// Embedded Foxglove message definitions, in both JSON-schema form (generic
// backend) and ROS 2 message-definition form (typed backend). Embedding the
// definitions keeps a conversion run hermetic; unknown names are a fatal
// catalog miss.

/// Separator plus dependency block appended to every generated or catalog
/// ROS 2 definition that references `builtin_interfaces/Time`.
pub const ROS2_TIME_DEPENDENCY: &str = "\
================================================================================
MSG: builtin_interfaces/Time
int32 sec
uint32 nanosec
";

/// Look up a Foxglove JSON schema by bare name (e.g. `CompressedImage`).
pub fn foxglove_jsonschema(name: &str) -> Option<&'static str> {
    match name {
        "CompressedImage" => Some(COMPRESSED_IMAGE_JSONSCHEMA),
        "CompressedVideo" => Some(COMPRESSED_VIDEO_JSONSCHEMA),
        "LocationFix" => Some(LOCATION_FIX_JSONSCHEMA),
        "Log" => Some(LOG_JSONSCHEMA),
        _ => None,
    }
}

/// Look up a ROS 2 message definition by full name. Both `pkg/Name` and
/// `pkg/msg/Name` spellings are accepted.
pub fn ros2_msgdef(name: &str) -> Option<&'static str> {
    let normalized = name.replacen("/msg/", "/", 1);
    match normalized.as_str() {
        "foxglove_msgs/CompressedImage" => Some(COMPRESSED_IMAGE_MSGDEF),
        "foxglove_msgs/CompressedVideo" => Some(COMPRESSED_VIDEO_MSGDEF),
        "foxglove_msgs/LocationFix" => Some(LOCATION_FIX_MSGDEF),
        "foxglove_msgs/Log" => Some(LOG_MSGDEF),
        _ => None,
    }
}

const COMPRESSED_IMAGE_JSONSCHEMA: &str = r#"{
  "title": "foxglove.CompressedImage",
  "description": "A compressed image",
  "type": "object",
  "properties": {
    "timestamp": {
      "type": "object",
      "title": "time",
      "properties": {
        "sec": { "type": "integer", "minimum": 0 },
        "nsec": { "type": "integer", "minimum": 0, "maximum": 999999999 }
      },
      "description": "Timestamp of image"
    },
    "frame_id": {
      "type": "string",
      "description": "Frame of reference for the image"
    },
    "data": {
      "type": "string",
      "contentEncoding": "base64",
      "description": "Compressed image data"
    },
    "format": {
      "type": "string",
      "description": "Image format"
    }
  }
}"#;

const COMPRESSED_VIDEO_JSONSCHEMA: &str = r#"{
  "title": "foxglove.CompressedVideo",
  "description": "A single frame of a compressed video bitstream",
  "type": "object",
  "properties": {
    "timestamp": {
      "type": "object",
      "title": "time",
      "properties": {
        "sec": { "type": "integer", "minimum": 0 },
        "nsec": { "type": "integer", "minimum": 0, "maximum": 999999999 }
      },
      "description": "Timestamp of video frame"
    },
    "frame_id": {
      "type": "string",
      "description": "Frame of reference for the video"
    },
    "data": {
      "type": "string",
      "contentEncoding": "base64",
      "description": "Compressed video frame data"
    },
    "format": {
      "type": "string",
      "description": "Video format"
    }
  }
}"#;

const LOCATION_FIX_JSONSCHEMA: &str = r#"{
  "title": "foxglove.LocationFix",
  "description": "A navigation satellite fix for any Global Navigation Satellite System",
  "type": "object",
  "properties": {
    "timestamp": {
      "type": "object",
      "title": "time",
      "properties": {
        "sec": { "type": "integer", "minimum": 0 },
        "nsec": { "type": "integer", "minimum": 0, "maximum": 999999999 }
      },
      "description": "Timestamp of the message"
    },
    "frame_id": {
      "type": "string",
      "description": "Frame for the sensor"
    },
    "latitude": { "type": "number", "description": "Latitude in degrees" },
    "longitude": { "type": "number", "description": "Longitude in degrees" },
    "altitude": { "type": "number", "description": "Altitude in meters" },
    "position_covariance": {
      "type": "array",
      "items": { "type": "number" },
      "description": "Position covariance (m^2) defined relative to a tangential plane"
    },
    "position_covariance_type": {
      "type": "integer",
      "description": "If position covariance is available, populate the message accordingly"
    }
  }
}"#;

const LOG_JSONSCHEMA: &str = r#"{
  "title": "foxglove.Log",
  "description": "A log message",
  "type": "object",
  "properties": {
    "timestamp": {
      "type": "object",
      "title": "time",
      "properties": {
        "sec": { "type": "integer", "minimum": 0 },
        "nsec": { "type": "integer", "minimum": 0, "maximum": 999999999 }
      },
      "description": "Timestamp of log message"
    },
    "level": { "type": "integer", "description": "Log level" },
    "message": { "type": "string", "description": "Log message" },
    "name": { "type": "string", "description": "Process or node name" },
    "file": { "type": "string", "description": "Filename" },
    "line": { "type": "integer", "description": "Line number in the file" }
  }
}"#;

const COMPRESSED_IMAGE_MSGDEF: &str = "\
builtin_interfaces/Time timestamp
string frame_id
uint8[] data
string format
================================================================================
MSG: builtin_interfaces/Time
int32 sec
uint32 nanosec
";

const COMPRESSED_VIDEO_MSGDEF: &str = "\
builtin_interfaces/Time timestamp
string frame_id
uint8[] data
string format
================================================================================
MSG: builtin_interfaces/Time
int32 sec
uint32 nanosec
";

const LOCATION_FIX_MSGDEF: &str = "\
builtin_interfaces/Time timestamp
string frame_id
float64 latitude
float64 longitude
float64 altitude
float64[9] position_covariance
uint8 position_covariance_type
================================================================================
MSG: builtin_interfaces/Time
int32 sec
uint32 nanosec
";

const LOG_MSGDEF: &str = "\
builtin_interfaces/Time timestamp
uint8 level
string message
string name
string file
uint32 line
================================================================================
MSG: builtin_interfaces/Time
int32 sec
uint32 nanosec
";
