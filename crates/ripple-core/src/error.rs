use thiserror::Error;

use crate::model::DependencyKind;

#[derive(Error, Debug)]
pub enum RippleError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid weight {value} for dependency kind '{kind}': expected a value in [0, 1]")]
    InvalidWeight { kind: DependencyKind, value: f64 },

    #[error("Invalid pruning threshold {0}: expected a value in (0, 1]")]
    InvalidThreshold(f64),

    #[error("Impact aggregation failed: {0}")]
    Aggregation(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RippleError>;
