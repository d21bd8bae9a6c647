use thiserror::Error;

/// Startup configuration failures. All are fatal for the binary.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid feed config: {0}")]
    Validation(String),
}
