use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailMagicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("template error: {0}")]
    Template(String),
}

pub type Result<T> = std::result::Result<T, MailMagicError>;
