//! Error types shared by the configuration layer and the engine.

use std::path::PathBuf;

/// Problems collecting or validating run settings before anything is sent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable '{0}' not set")]
    MissingEnv(String),

    #[error("Failed to read body file '{}': {source}", path.display())]
    BodyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// No HTTP method could be determined for the target.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no supported method detected for {url} (OPTIONS, HEAD, GET and POST all failed)")]
    NoMethod { url: String },

    #[error("failed to build probe client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Fatal run failures. Per-request failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Method detection failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Run cancelled before load started")]
    Cancelled,

    #[error("Target supports no usable HTTP method")]
    EmptyMethodSet,

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Dispatch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
