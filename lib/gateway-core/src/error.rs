use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Invalid gateway configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration file error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
