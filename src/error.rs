use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiScopeError {
    #[error("circular extends detected: {}", .cycle.join(" -> "))]
    CircularExtends { cycle: Vec<String> },

    #[error("parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("serialization error at {path}: {message}")]
    Serialize { path: String, message: String },

    #[error("invalid pipeline definition in {source_name}: {message}")]
    InvalidPipeline {
        source_name: String,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CiScopeError>;
