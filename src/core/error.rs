use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutopilotError {
    #[error("Invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Low confidence state: {detected}/{expected} UI anchors detected")]
    LowConfidenceState { detected: usize, expected: usize },

    #[error("Action rejected ({key}): {reason}")]
    ActionRejected { key: String, reason: String },

    #[error("Incident timed out: {0}")]
    IncidentTimeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncodeError(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, AutopilotError>;
