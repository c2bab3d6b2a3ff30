use thiserror::Error;

/// Failures surfaced by the store, renderer and notifier contracts.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode API response: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to render report: {0}")]
    Render(String),

    #[error("failed to send email: {0}")]
    Email(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
