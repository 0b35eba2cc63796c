//! src/configuration.rs
use crate::error::ConfigurationError;
use crate::model::KeyType;
use serde_aux::field_attributes::deserialize_number_from_string;
use std::path::{Path, PathBuf};

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub storage: StorageSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PipelineSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_days: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub top_k: usize,
    /// Rows per map-phase chunk.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub chunk_size: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub parallelism: usize,
    pub key_types: Vec<KeyType>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct StorageSettings {
    pub input_dir: PathBuf,
    pub shard_root: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub reference_keys: Option<PathBuf>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        TelemetrySettings {
            log_filter: default_log_filter(),
            otlp_endpoint: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let pipeline = &self.pipeline;
        let invalid = |message: &str| Err(ConfigurationError::Invalid(message.to_string()));
        if pipeline.window_days == 0 {
            return invalid("pipeline.window_days must be at least 1");
        }
        if pipeline.top_k == 0 {
            return invalid("pipeline.top_k must be at least 1");
        }
        if pipeline.chunk_size == 0 {
            return invalid("pipeline.chunk_size must be at least 1");
        }
        if pipeline.parallelism == 0 {
            return invalid("pipeline.parallelism must be at least 1");
        }
        if pipeline.key_types.is_empty() {
            return invalid("pipeline.key_types must name at least one key type");
        }
        Ok(())
    }
}

pub fn get_configuration() -> Result<Settings, ConfigurationError> {
    let base_path = std::env::current_dir().map_err(ConfigurationError::CurrentDir)?;
    get_configuration_from(&base_path.join("configuration"))
}

/// Reads `base.yaml` from `config_dir`, then `TOPCHARTS_*` environment overrides
/// such as `TOPCHARTS_PIPELINE__TOP_K=10`.
pub fn get_configuration_from(config_dir: &Path) -> Result<Settings, ConfigurationError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(config_dir.join("base.yaml")))
        .add_source(
            config::Environment::with_prefix("TOPCHARTS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("pipeline.key_types")
                .try_parsing(true),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
