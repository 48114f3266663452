use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compression::{AlphaPolicy, CompressionOptions, JpegAlgorithm};
use crate::errors::CompressorError;

pub const DEFAULT_INPUT_PATH: &str = "image.jpg";
pub const DEFAULT_SOURCE_PATH: &str = "./logo.png";
pub const DEFAULT_OUTPUT_PATH: &str = "compressed_image.jpg";
pub const DEFAULT_QUALITY: u8 = 50;
pub const DEFAULT_CONFIG_FILE: &str = "img-compress.toml";

/// JPEG quality, 1 (smallest file) to 100 (highest fidelity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Result<Self, CompressorError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CompressorError::InvalidParameters(format!(
                "quality must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY)
    }
}

impl TryFrom<u8> for Quality {
    type Error = CompressorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything one compression run needs, checked when it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressorConfig {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub quality: Quality,
    pub algorithm: JpegAlgorithm,
    pub alpha_policy: AlphaPolicy,
}

impl CompressorConfig {
    pub fn new<S, O>(source_path: S, output_path: O, quality: u8) -> Result<Self, CompressorError>
    where
        S: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        let source_path = source_path.into();
        let output_path = output_path.into();

        if source_path.as_os_str().is_empty() {
            return Err(CompressorError::InvalidParameters(
                "source path cannot be empty".to_string(),
            ));
        }
        if output_path.as_os_str().is_empty() {
            return Err(CompressorError::InvalidParameters(
                "output path cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            source_path,
            output_path,
            quality: Quality::new(quality)?,
            algorithm: JpegAlgorithm::default(),
            alpha_policy: AlphaPolicy::default(),
        })
    }

    pub fn with_algorithm(mut self, algorithm: JpegAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_alpha_policy(mut self, alpha_policy: AlphaPolicy) -> Self {
        self.alpha_policy = alpha_policy;
        self
    }

    pub fn options(&self) -> CompressionOptions {
        CompressionOptions {
            quality: self.quality,
            algorithm: self.algorithm,
            alpha_policy: self.alpha_policy,
        }
    }
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            quality: Quality::default(),
            algorithm: JpegAlgorithm::default(),
            alpha_policy: AlphaPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub compression: CompressionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub source_path: String,
    pub quality: u8,
    pub algorithm: String,
    pub alpha_policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub log_compression_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression: CompressionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            source_path: DEFAULT_SOURCE_PATH.to_string(),
            quality: DEFAULT_QUALITY,
            algorithm: JpegAlgorithm::default().to_string(),
            alpha_policy: AlphaPolicy::default().to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_compression_stats: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if file doesn't exist
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration from environment variables and file
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("IMG_COMPRESS_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = Self::load_from_file(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    // 环境变量覆盖配置文件
    fn apply_env_overrides(&mut self) {
        if let Ok(source) = std::env::var("IMG_COMPRESS_SOURCE") {
            self.compression.source_path = source;
        }

        if let Ok(quality) = std::env::var("IMG_COMPRESS_QUALITY") {
            if let Ok(q) = quality.parse::<u8>() {
                if (Quality::MIN..=Quality::MAX).contains(&q) {
                    self.compression.quality = q;
                }
            }
        }

        if let Ok(algorithm) = std::env::var("IMG_COMPRESS_ALGORITHM") {
            self.compression.algorithm = algorithm;
        }

        if let Ok(alpha) = std::env::var("IMG_COMPRESS_ALPHA") {
            self.compression.alpha_policy = alpha;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.compression.source_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Source path cannot be empty".to_string(),
            ));
        }

        if !(Quality::MIN..=Quality::MAX).contains(&self.compression.quality) {
            return Err(ConfigError::ValidationError(
                "Quality must be between 1 and 100".to_string(),
            ));
        }

        if self.compression.algorithm.parse::<JpegAlgorithm>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid algorithm. Must be one of: {:?}",
                JpegAlgorithm::NAMES
            )));
        }

        if self.compression.alpha_policy.parse::<AlphaPolicy>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid alpha policy. Must be one of: {:?}",
                AlphaPolicy::NAMES
            )));
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Self::default();
        let toml_content = toml::to_string_pretty(&config)
            .map_err(|e| ConfigError::SerializeError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_content)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Build the run configuration. The output always lands at `compressed_image.jpg`.
    pub fn compressor_config(&self) -> Result<CompressorConfig, CompressorError> {
        let algorithm = self.compression.algorithm.parse::<JpegAlgorithm>()?;
        let alpha_policy = self.compression.alpha_policy.parse::<AlphaPolicy>()?;

        Ok(CompressorConfig::new(
            self.compression.source_path.as_str(),
            DEFAULT_OUTPUT_PATH,
            self.compression.quality,
        )?
        .with_algorithm(algorithm)
        .with_alpha_policy(alpha_policy))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializeError(String),
}
