// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ConversionConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        // Substitute environment variables
        let content = Self::substitute_env_vars(&content);

        // Parse YAML
        let config: ConversionConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        // Validate configuration
        Self::validate(&config)?;

        Ok(config)
    }

    /// Load converter function definitions
    pub fn load_functions<P: AsRef<Path>>(path: P) -> Result<ConverterFunctionFile> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read converter function file")?;
        let content = Self::substitute_env_vars(&content);
        serde_yaml::from_str(&content).context("Failed to parse converter function file")
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${TOPIC_PREFIX:-/robot} -> /robot (if TOPIC_PREFIX not set)
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        // Keep original if no default and var not found
                        format!("${{{}}}", var_name)
                    }
                }
            }
        })
        .to_string()
    }

    /// Validate configuration
    fn validate(config: &ConversionConfig) -> Result<()> {
        // Recognized format names; only json and ros2 have an encoder, the
        // rest are rejected when the conversion starts.
        match config.writer_format.as_str() {
            "json" | "ros2" | "ros1" | "protobuf" => {}
            unknown => bail!(
                "Unknown writer_format: '{}'. Recognized: json, ros2, ros1, protobuf",
                unknown
            ),
        }

        for mapping in &config.tabular_mappings {
            if mapping.matching.file_pattern.is_empty() {
                bail!("tabular_mappings: file_pattern cannot be empty");
            }
            for spec in &mapping.converter_functions {
                if spec.function_name.is_empty() {
                    bail!("tabular_mappings: function_name cannot be empty");
                }
                if spec.topic_suffix.is_empty() {
                    bail!("tabular_mappings: topic_suffix cannot be empty");
                }
            }
        }

        for mapping in &config.other_mappings {
            if mapping.matching().file_pattern.is_empty() {
                bail!("other_mappings: file_pattern cannot be empty");
            }
        }

        for mapping in &config.metadata {
            if mapping.separator.is_empty() {
                bail!("metadata: separator cannot be empty");
            }
        }

        Ok(())
    }
}
