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

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tabular_mcap::converter::McapConverter;
use tabular_mcap::load_config;

/// Convert tabular and multimedia data files to an MCAP log
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input directory containing data files
    #[arg(short, long)]
    input: PathBuf,

    /// Output MCAP file path; a trailing slash selects a directory and a
    /// default file name
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file path (defaults to <input>/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the converter functions YAML file
    /// (defaults to <input>/converter_functions.yaml)
    #[arg(short, long)]
    functions: Option<PathBuf>,

    /// Prefix prepended to every topic name
    #[arg(short, long, default_value = "")]
    topic_prefix: String,

    /// Only process the first rows of each table
    #[arg(long)]
    test_mode: bool,
}

fn main() -> Result<()> {
    let start = Instant::now();
    let args = Args::parse();

    if !args.input.exists() {
        bail!("Target directory '{}' does not exist", args.input.display());
    }
    if !args.input.is_dir() {
        bail!("'{}' is not a directory", args.input.display());
    }

    let config_path = args
        .config
        .unwrap_or_else(|| args.input.join("config.yaml"));
    if !config_path.exists() {
        bail!("Config file '{}' does not exist", config_path.display());
    }

    let output_path = match args.output {
        Some(path) => {
            // A trailing slash or an existing directory selects a directory
            if path.is_dir() || path.to_string_lossy().ends_with('/') {
                path.join("output.mcap")
            } else {
                path
            }
        }
        None => args.input.join("output.mcap"),
    };
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let functions_path = args
        .functions
        .unwrap_or_else(|| args.input.join("converter_functions.yaml"));

    // Initialize tracing with the configured level; RUST_LOG still wins
    let config = load_config(&config_path)?;
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_string())),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tabular-mcap");
    info!("Loaded configuration from: {}", config_path.display());

    let mut converter = McapConverter::from_config(config, &functions_path)?;
    converter.convert(
        &args.input,
        &output_path,
        &args.topic_prefix,
        args.test_mode,
    )?;

    info!(
        "Total execution time: {:.2} seconds",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
