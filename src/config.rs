use anyhow::{Context, Result};
use chartmatch_vision::{Layout, PreprocessConfig};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::index::Decision;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("CHARTMATCH_CONFIG_PATH").unwrap_or("chartmatch.toml"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory holding the reference chart images
    pub image_root: PathBuf,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub frontend: PathBuf,
    pub rate_limit_per_minute: u32,
    pub max_upload_mb: usize,
    pub model: ModelConfig,
    #[serde(rename = "reference")]
    pub references: Vec<ReferenceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub input_size: u32,
    pub layout: Layout,
}

/// One entry of the static label → decision mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub label: String,
    pub decision: Decision,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            image_root: PathBuf::from("./cheatsheet"),
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            frontend: PathBuf::from("templates/frontend.html"),
            rate_limit_per_minute: 10,
            max_upload_mb: 16,
            model: ModelConfig::default(),
            references: Vec::new(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/resnet50.onnx"),
            input_size: 224,
            layout: Layout::Nhwc,
        }
    }
}

impl ModelConfig {
    pub fn preprocess(&self) -> PreprocessConfig {
        PreprocessConfig {
            input_size: self.input_size,
            layout: self.layout,
        }
    }
}

impl Config {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?;
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> Result<Config> {
    Ok(toml::from_str(raw)?)
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let mut cfg = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        parse_config(&raw).with_context(|| format!("parsing config {}", path.display()))?
    } else {
        log::warn!("No config at {}, using defaults", path.display());
        Config::default()
    };
    cfg.apply_env_overrides()?;
    Ok(cfg)
}
