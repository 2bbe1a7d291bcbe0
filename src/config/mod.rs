// Configuration module for tabular-mcap
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::Result;
use std::path::Path;

/// Load conversion configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConversionConfig> {
    ConfigLoader::load(path)
}

/// Load converter function definitions from a YAML file
pub fn load_converter_functions<P: AsRef<Path>>(path: P) -> Result<ConverterFunctionFile> {
    ConfigLoader::load_functions(path)
}
