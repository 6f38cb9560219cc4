use std::path::PathBuf;

use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to read client secret file {}: {source}", path.display())]
    ConfigNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse client secret file {}: {reason}", path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid task API base URL: {0}")]
    InvalidApiUrl(String),

    #[error("no cached token at {}", .0.display())]
    TokenNotFound(PathBuf),

    #[error("unable to parse cached token {}: {source}", path.display())]
    TokenParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unable to cache oauth token at {}: {reason}", path.display())]
    TokenWrite { path: PathBuf, reason: String },

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("unable to read authorization code: {0}")]
    Console(std::io::Error),

    #[error("unable to write to the console: {0}")]
    Output(std::io::Error),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Http { status: StatusCode, body: String },
}

/// How the dispatcher treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed local input; the operator has to fix it.
    Configuration,
    /// Consent, exchange, refresh or token persistence failed.
    Authorization,
    /// A single call against the task API failed.
    Transient,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigNotFound { .. } | Error::ConfigParse { .. } | Error::InvalidApiUrl(_) => {
                ErrorKind::Configuration
            }
            Error::TokenNotFound(_)
            | Error::TokenParse { .. }
            | Error::TokenWrite { .. }
            | Error::Authorization(_)
            | Error::Console(_) => ErrorKind::Authorization,
            Error::Network(_) | Error::Http { .. } | Error::Output(_) => ErrorKind::Transient,
        }
    }

    /// Failed task API calls may be skipped at per-list granularity.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Http { .. })
    }

    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Authorization => 3,
            ErrorKind::Transient => 1,
        }
    }
}
