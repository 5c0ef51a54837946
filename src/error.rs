use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("failed to read log file at {path}: {message}")]
    LogRead { path: PathBuf, message: String },

    #[error("failed to read source table at {path}: {message}")]
    SourceRead { path: PathBuf, message: String },

    #[error("source table {path} is missing required column `{column}`")]
    #[diagnostic(help("every source needs the columns scientific_name, image_url and url"))]
    MissingColumn { path: PathBuf, column: String },

    #[error("at least one source table is required")]
    NoSources,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("image request failed: {0}")]
    ImageHttp(String),

    #[error("image server returned status {status} for {url}")]
    ImageStatus { status: u16, url: String },

    #[error("image response for {url} was truncated: expected {expected} bytes, got {received}")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("image response for {0} had an empty body")]
    EmptyBody(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
