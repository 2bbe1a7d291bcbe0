// Configuration file loading tests

use std::fs;
use std::path::PathBuf;
use tabular_mcap::config::{self, OtherMapping};
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_full_config_parses() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
writer_format: ros2
tabular_mappings:
  - file_pattern: "records/*.csv"
    exclude_file_pattern: ".*_raw\\.csv"
    converter_functions:
      - function_name: gps
        topic_suffix: location
        exclude_columns: [internal_id]
      - function_name: gps
        schema_name: foxglove.LocationFix
        topic_suffix: fix
other_mappings:
  - type: compressed_image
    file_pattern: "*.jpg"
    topic_suffix: image
    frame_id: camera
  - type: compressed_video
    file_pattern: "*.h264"
    topic_suffix: video
    frame_id: camera
    format: h264
attachments:
  - file_pattern: "*.urdf"
    mime_type: application/xml
metadata:
  - file_pattern: "*.env"
    separator: "="
logging:
  level: debug
"#,
    );

    let config = config::load_config(&path).unwrap();
    assert_eq!(config.writer_format, "ros2");
    assert_eq!(config.logging.level, "debug");

    let mapping = &config.tabular_mappings[0];
    assert_eq!(mapping.matching.file_pattern, "records/*.csv");
    assert_eq!(
        mapping.matching.exclude_file_pattern.as_deref(),
        Some(".*_raw\\.csv")
    );
    assert_eq!(mapping.converter_functions.len(), 2);
    assert_eq!(
        mapping.converter_functions[0].exclude_columns,
        Some(vec!["internal_id".to_string()])
    );
    assert_eq!(mapping.converter_functions[0].schema_name, None);
    assert_eq!(
        mapping.converter_functions[1].schema_name.as_deref(),
        Some("foxglove.LocationFix")
    );

    // Image format defaults to jpeg, video format was given explicitly
    let image = &config.other_mappings[0];
    assert!(matches!(image, OtherMapping::CompressedImage { .. }));
    assert_eq!(image.format(), "jpeg");
    assert_eq!(image.schema_name("ros2"), "foxglove_msgs/msg/CompressedImage");
    assert_eq!(image.schema_name("json"), "foxglove.CompressedImage");
    assert_eq!(config.other_mappings[1].format(), "h264");

    assert_eq!(
        config.attachments[0].mime_type.as_deref(),
        Some("application/xml")
    );
    assert_eq!(config.metadata[0].separator, "=");
}

#[test]
fn test_defaults_for_minimal_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "tabular_mappings: []\n");

    let config = config::load_config(&path).unwrap();
    assert_eq!(config.writer_format, "json");
    assert_eq!(config.logging.level, "info");
    assert!(config.other_mappings.is_empty());
    assert!(config.attachments.is_empty());
    assert!(config.metadata.is_empty());
}

#[test]
fn test_env_substitution_in_file() {
    std::env::set_var("CONFIG_TEST_FORMAT", "ros2");
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "writer_format: ${CONFIG_TEST_FORMAT}\nlogging:\n  level: ${CONFIG_TEST_LEVEL:-warn}\n",
    );

    let config = config::load_config(&path).unwrap();
    assert_eq!(config.writer_format, "ros2");
    assert_eq!(config.logging.level, "warn");
    std::env::remove_var("CONFIG_TEST_FORMAT");
}

#[test]
fn test_unknown_writer_format_rejected_at_load() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "writer_format: parquet\n");

    let err = config::load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Unknown writer_format"));
}

#[test]
fn test_recognized_but_unencodable_formats_load() {
    // ros1 and protobuf pass validation; they fail later when the
    // conversion asks for an encoder
    let dir = TempDir::new().unwrap();
    for format in ["ros1", "protobuf"] {
        let path = write_config(&dir, &format!("writer_format: {format}\n"));
        assert!(config::load_config(&path).is_ok());
    }
}

#[test]
fn test_empty_topic_suffix_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
tabular_mappings:
  - file_pattern: "*.csv"
    converter_functions:
      - function_name: gps
        topic_suffix: ""
"#,
    );

    let err = config::load_config(&path).unwrap_err();
    assert!(err.to_string().contains("topic_suffix"));
}

#[test]
fn test_converter_function_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("converter_functions.yaml");
    fs::write(
        &path,
        r#"
functions:
  gps:
    schema_name: foxglove.LocationFix
    template: '{"latitude": {{ lat }}, "longitude": {{ lon }}}'
    log_time_template: "{{ t }}"
  bare: {}
"#,
    )
    .unwrap();

    let file = config::load_converter_functions(&path).unwrap();
    assert_eq!(file.functions.len(), 2);

    let gps = &file.functions["gps"];
    assert_eq!(gps.schema_name.as_deref(), Some("foxglove.LocationFix"));
    assert_eq!(gps.log_time_template.as_deref(), Some("{{ t }}"));
    assert_eq!(gps.publish_time_template, None);

    // Missing template defaults to the empty message
    let bare = &file.functions["bare"];
    assert_eq!(bare.template, "{}");
    assert_eq!(bare.log_time_template, None);
}
