use thiserror::Error;

/// Failures talking to the upstream mail provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure or a non-2xx status from the provider
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The provider answered 200 but the body did not have the expected shape
    #[error("Upstream returned a malformed response: {0}")]
    UpstreamMalformedResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::UpstreamUnavailable(e.to_string())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;
