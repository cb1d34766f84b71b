use thiserror::Error;

/// Main error type for docsmith operations
#[derive(Error, Debug)]
pub enum DocsmithError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Artifact generation failed: {0}")]
    Generation(String),

    #[error("Cache consistency error: {0}")]
    CacheConsistency(String),

    #[error("Version control error: {0}")]
    VersionControl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocsmithError>;
