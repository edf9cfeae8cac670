use thiserror::Error;

#[derive(Error, Debug)]
pub enum JapscanError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ZIP compression error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Expected markup element or URL shape is missing (site layout drift).
    #[error("Unexpected page structure: {0}")]
    Structure(String),

    /// A scrambled image could not be reconstructed.
    #[error("Cannot unscramble image: {0}")]
    Decode(String),

    /// Non-success status on an image download. Absorbed by the page fetcher.
    #[error("Fetch failed for {url}: HTTP {status}")]
    FetchFailure { url: String, status: u16 },
}

impl JapscanError {
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn fetch_failure(url: impl Into<String>, status: u16) -> Self {
        Self::FetchFailure { url: url.into(), status }
    }
}

pub type Result<T> = std::result::Result<T, JapscanError>;
