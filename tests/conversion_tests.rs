// End-to-end conversion tests for the JSON writer format

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tabular_mcap::converter::McapConverter;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn convert(dir: &TempDir, config: &str, functions: &str) -> Vec<u8> {
    try_convert(dir, config, functions, false).unwrap()
}

fn try_convert(
    dir: &TempDir,
    config: &str,
    functions: &str,
    test_mode: bool,
) -> anyhow::Result<Vec<u8>> {
    let config_path = write_file(dir.path(), "config.yaml", config);
    let functions_path = write_file(dir.path(), "converter_functions.yaml", functions);
    let output_path = dir.path().join("out").join("output.mcap");
    fs::create_dir_all(output_path.parent().unwrap()).unwrap();

    let mut converter = McapConverter::from_paths(&config_path, &functions_path)?;
    converter.convert(dir.path(), &output_path, "", test_mode)?;
    Ok(fs::read(&output_path)?)
}

fn messages(buf: &[u8]) -> Vec<(String, u32, u64, u64, Value)> {
    mcap::MessageStream::new(buf)
        .unwrap()
        .map(|m| {
            let m = m.unwrap();
            let value = serde_json::from_slice(&m.data).unwrap();
            (
                m.channel.topic.clone(),
                m.sequence,
                m.log_time,
                m.publish_time,
                value,
            )
        })
        .collect()
}

const GPS_CONFIG: &str = r#"
writer_format: json
tabular_mappings:
  - file_pattern: "*.csv"
    converter_functions:
      - function_name: gps
        topic_suffix: location
"#;

const GPS_FUNCTIONS: &str = r#"
functions:
  gps:
    template: "{}"
    log_time_template: "{{ t }}"
"#;

#[test]
fn test_generic_round_trip() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "gps.csv",
        "lat,lon,t\n1.0,2.0,1000000000\n1.5,2.5,2000000000\n",
    );

    let buf = convert(&dir, GPS_CONFIG, GPS_FUNCTIONS);
    let msgs = messages(&buf);
    assert_eq!(msgs.len(), 2);

    let (topic, _, log_time, publish_time, value) = &msgs[0];
    assert_eq!(topic, "gpscsv/location");
    assert_eq!(*log_time, 1_000_000_000);
    assert_eq!(*publish_time, 1_000_000_000);
    assert_eq!(value["lat"], Value::from(1.0));
    assert_eq!(value["lon"], Value::from(2.0));

    // Rows arrive in input order
    assert_eq!(msgs[1].2, 2_000_000_000);
    assert_eq!(msgs[1].4["lat"], Value::from(1.5));
}

#[test]
fn test_generic_schema_shape() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "gps.csv", "lat,lon,t\n1.0,2.0,1\n");

    let buf = convert(&dir, GPS_CONFIG, GPS_FUNCTIONS);
    let summary = mcap::Summary::read(&buf).unwrap().unwrap();
    assert_eq!(summary.schemas.len(), 1);

    let schema = summary.schemas.values().next().unwrap();
    assert_eq!(schema.name, "table.gpscsv.location");
    assert_eq!(schema.encoding, "jsonschema");

    let doc: Value = serde_json::from_slice(&schema.data).unwrap();
    let props = doc["properties"].as_object().unwrap();
    // Generated schemas always lead with a nested time field
    assert_eq!(props.keys().next().unwrap(), "timestamp");
    assert_eq!(props["timestamp"]["properties"]["nsec"]["maximum"], 999999999);
    assert_eq!(props["lat"]["type"], "number");
    assert_eq!(props["t"]["type"], "integer");
}

#[test]
fn test_named_schema_registered_once_across_files() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.csv", "lat,lon,t\n1.0,2.0,1\n");
    write_file(dir.path(), "b.csv", "lat,lon,t\n3.0,4.0,2\n");

    let config = r#"
writer_format: json
tabular_mappings:
  - file_pattern: "*.csv"
    converter_functions:
      - function_name: fix
        schema_name: foxglove.LocationFix
        topic_suffix: fix
"#;
    let functions = r#"
functions:
  fix:
    template: '{"latitude": {{ lat }}, "longitude": {{ lon }}}'
    log_time_template: "{{ t }}"
"#;
    let buf = convert(&dir, config, functions);
    let summary = mcap::Summary::read(&buf).unwrap().unwrap();

    // One schema, two channels: each file gets its own topic
    assert_eq!(summary.schemas.len(), 1);
    assert_eq!(summary.channels.len(), 2);
    assert_eq!(
        summary.schemas.values().next().unwrap().name,
        "foxglove.LocationFix"
    );
}

#[test]
fn test_same_topic_two_schemas_lands_on_two_channels() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "gps.csv", "lat,lon,t\n1.0,2.0,1\n");

    let config = r#"
writer_format: json
tabular_mappings:
  - file_pattern: "*.csv"
    converter_functions:
      - function_name: gps
        topic_suffix: location
      - function_name: fix
        schema_name: foxglove.LocationFix
        topic_suffix: location
"#;
    let functions = r#"
functions:
  gps:
    template: "{}"
    log_time_template: "{{ t }}"
  fix:
    template: '{"latitude": {{ lat }}, "longitude": {{ lon }}}'
    log_time_template: "{{ t }}"
"#;
    let buf = convert(&dir, config, functions);
    let summary = mcap::Summary::read(&buf).unwrap().unwrap();
    assert_eq!(summary.schemas.len(), 2);
    assert_eq!(summary.channels.len(), 2);
    let topics: Vec<_> = summary.channels.values().map(|c| c.topic.clone()).collect();
    assert!(topics.iter().all(|t| t == "gpscsv/location"));
}

#[test]
fn test_exclude_pattern_skips_files() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "keep.csv", "lat,lon,t\n1.0,2.0,1\n");
    write_file(dir.path(), "skip.csv", "lat,lon,t\n9.0,9.0,9\n");

    let config = r#"
writer_format: json
tabular_mappings:
  - file_pattern: "*.csv"
    exclude_file_pattern: "skip.*"
    converter_functions:
      - function_name: gps
        topic_suffix: location
"#;
    let buf = convert(&dir, config, GPS_FUNCTIONS);
    let msgs = messages(&buf);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].0, "keepcsv/location");
}

#[test]
fn test_missing_timestamp_aborts() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "gps.csv", "lat,lon\n1.0,2.0\n");

    let functions = r#"
functions:
  gps:
    template: "{}"
"#;
    let err = try_convert(&dir, GPS_CONFIG, functions, false).unwrap_err();
    assert!(err.to_string().contains("no timestamp found in message"));
}

#[test]
fn test_unknown_converter_function_aborts() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "gps.csv", "lat,lon,t\n1.0,2.0,1\n");

    let config = r#"
writer_format: json
tabular_mappings:
  - file_pattern: "*.csv"
    converter_functions:
      - function_name: nonexistent
        topic_suffix: location
"#;
    let err = try_convert(&dir, config, GPS_FUNCTIONS, false).unwrap_err();
    assert!(err
        .to_string()
        .contains("unknown converter function: nonexistent"));
}

#[test]
fn test_test_mode_limits_rows() {
    let dir = TempDir::new().unwrap();
    let mut csv = String::from("lat,lon,t\n");
    for i in 0..8 {
        csv.push_str(&format!("1.0,2.0,{}\n", i + 1));
    }
    write_file(dir.path(), "gps.csv", &csv);

    let buf = try_convert(&dir, GPS_CONFIG, GPS_FUNCTIONS, true).unwrap();
    assert_eq!(messages(&buf).len(), 5);
}

#[test]
fn test_attachments_and_metadata() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "notes/readme.txt", "hello attachment");
    write_file(dir.path(), "run.meta", "name= rover\nmission= survey\nnosep\n");

    let config = r#"
writer_format: json
attachments:
  - file_pattern: "notes/*.txt"
metadata:
  - file_pattern: "*.meta"
    separator: "="
"#;
    let buf = convert(&dir, config, "functions: {}");
    let summary = mcap::Summary::read(&buf).unwrap().unwrap();

    assert_eq!(summary.attachment_indexes.len(), 1);
    let attachment = &summary.attachment_indexes[0];
    assert_eq!(attachment.name, "notes/readme.txt");
    assert_eq!(attachment.media_type, "text/plain");
    assert_eq!(attachment.data_size, "hello attachment".len() as u64);

    assert_eq!(summary.metadata_indexes.len(), 1);
    assert_eq!(summary.metadata_indexes[0].name, "run.meta");
}

#[test]
fn test_binary_data_field_is_base64_in_json() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "frames/shot.jpg", ".");
    fs::write(dir.path().join("frames/shot.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();

    let config = r#"
writer_format: json
other_mappings:
  - type: compressed_image
    file_pattern: "frames/*.jpg"
    topic_suffix: image
    frame_id: camera
    format: jpeg
"#;
    let buf = convert(&dir, config, "functions: {}");
    let msgs = messages(&buf);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].0, "frames/shot/image");
    // Raw bytes travel base64-encoded under the data key
    assert_eq!(msgs[0].4["data"], Value::from("/9j/"));
    assert_eq!(msgs[0].4["format"], Value::from("jpeg"));

    let summary = mcap::Summary::read(&buf).unwrap().unwrap();
    assert_eq!(
        summary.schemas.values().next().unwrap().name,
        "foxglove.CompressedImage"
    );
}

#[test]
fn test_unsupported_writer_format_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "gps.csv", "lat,lon,t\n1.0,2.0,1\n");

    // protobuf parses as a recognized format but has no encoder
    let config = "writer_format: protobuf\n";
    let err = try_convert(&dir, config, GPS_FUNCTIONS, false).unwrap_err();
    assert!(err.to_string().contains("not supported"));
    assert!(!dir.path().join("out").join("output.mcap").exists());
}
