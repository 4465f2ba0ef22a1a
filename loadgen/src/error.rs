use crate::stats::RequestKey;
use rand::distributions::WeightedError;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid host URL: {0}")]
    InvalidHost(#[from] url::ParseError),

    #[error("Unsupported host scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),

    #[error("At least one user is required")]
    ZeroUsers,

    #[error("Spawn rate must be at least one user per second")]
    ZeroSpawnRate,

    #[error("Stats interval must be non-zero")]
    ZeroStatsInterval,

    #[error("Wait time minimum {min:?} is greater than maximum {max:?}")]
    InvalidWaitTime { min: Duration, max: Duration },

    #[error("User defines no tasks")]
    NoTasks,

    #[error("Invalid task weights: {0}")]
    InvalidWeights(#[from] WeightedError),
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Unable to resolve `{path}` against the host: {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{key} failed with status {status}")]
    Status { key: RequestKey, status: StatusCode },
}

impl RequestError {
    /// Status code of the response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            Self::Url { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Unable to listen for the shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}
