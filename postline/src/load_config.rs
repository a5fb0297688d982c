/// `load_config` module: Loads and adapts a static YAML config into typed sections.
///
/// This module is the only place where untrusted YAML is parsed and mapped to
/// rich, strongly-typed internal structs.
///
/// # Responsibilities
/// - Parse user-supplied YAML configuration files into type-safe Rust structs
/// - Supply sensible defaults so that a minimal (or absent) file still loads
/// - Keep secrets out of the file: API keys and OAuth credentials come only
///   from the environment (see the `openai` and `linkedin` modules)
/// - Ensure robust error messages for CLI and tests: any failure in loading
///   must result in clear diagnostics.
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics,
/// and are surfaced at the CLI boundary.
///
/// For the accepted YAML schema, see `config.example.yaml` in the repository root.
///
use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub images: ImagesSection,
    #[serde(default)]
    pub store: StoreSection,
}

/// Retry and polling cadence for scheduled task execution.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 300,
            poll_interval_secs: 30,
        }
    }
}

/// Tone/style defaults and optional prompt override for drafted copy.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ContentSection {
    pub tone: String,
    pub style: String,
    pub prompts_file: Option<PathBuf>,
    pub fallback_enabled: bool,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            tone: "professional".to_string(),
            style: "engaging".to_string(),
            prompts_file: None,
            fallback_enabled: true,
        }
    }
}

/// Model selection for text and image generation.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub text_model: String,
    pub image_model: String,
    pub image_size: String,
    pub image_quality: String,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            text_model: "gpt-4-turbo-preview".to_string(),
            image_model: "dall-e-2".to_string(),
            image_size: "1024x1024".to_string(),
            image_quality: "standard".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImagesSection {
    pub output_dir: PathBuf,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated_images"),
        }
    }
}

/// Where the task tracker persists its records.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("postline_tasks.json"),
        }
    }
}

/// Loads a static YAML config file (no secrets).
/// Returns a processable CLI config for use by the CLI.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match std::fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}

/// Load the given config file, or fall back to defaults when none was passed.
pub fn load_config_or_default(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(p) => load_config(p),
        None => {
            info!("No config file passed, using built-in defaults");
            Ok(CliConfig::default())
        }
    }
}
