//! Benchmark config file (YAML) schema and loader.
//!
//! Grounded on `HFDatasetParser::initialize_config` (`benchmark_types.cpp`),
//! which reads each field with yaml-cpp's `.as<T>()` and throws on a
//! missing or mistyped key. `serde_yaml` gives the same fail-closed
//! behavior for free as long as the fields below are not `Option` -- a
//! missing required key is a deserialize error, never a silently
//! substituted default.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BenchError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetLocation {
    pub tag: String,
    pub subset: String,
    pub split: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelValue {
    pub id: i64,
    pub response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassLabel {
    pub tag: String,
    pub values: Vec<LabelValue>,
}

/// `request_params` block. Only `top_k` is optional; every other field
/// is required, consistent with `initialize_config`'s `.as<T>()` calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestParamsConfig {
    pub model: String,
    #[serde(default)]
    pub echo: bool,
    pub temperature: f64,
    pub num_logprobs: u32,
    pub max_tokens: u32,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pre_formatted_prompt: String,
    pub sentence_tags: Vec<String>,
    pub dataset: DatasetLocation,
    pub class_label: ClassLabel,
    pub request_params: RequestParamsConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BenchError::config_parse(path.display().to_string(), e.to_string()))?;
        Self::parse(&text).map_err(|e| BenchError::config_parse(path.display().to_string(), e))
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }
}
