use thiserror::Error;

/// Errors that can occur while relaying a conversation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Provider misconfigured: {0}")]
    ProviderConfig(String),

    #[error("Provider request failed: {provider} - {message}")]
    ProviderTransport { provider: String, message: String },

    #[error("Provider rejected credentials: {provider} - {message}")]
    ProviderAuth { provider: String, message: String },

    #[error("Chunk handler failed: {0}")]
    StreamCallback(String),

    #[error("Failed to build context: {0}")]
    ContextBuild(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Machine-checkable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    ProviderConfig,
    ProviderTransport,
    ProviderAuth,
    StreamCallback,
    ContextBuild,
    Cancelled,
    DeadlineExceeded,
    Serialization,
    Storage,
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Error::Forbidden(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::ProviderConfig(message.into())
    }

    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderTransport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderAuth {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn callback(message: impl Into<String>) -> Self {
        Error::StreamCallback(message.into())
    }

    pub fn context(message: impl Into<String>) -> Self {
        Error::ContextBuild(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage(message.into())
    }

    /// Classify a failed HTTP exchange with a provider. 401 and 403 mean the
    /// credential was rejected; every other status is a transport failure.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Error::auth(provider, message)
            }
            _ => Error::transport(provider, message),
        }
    }

    /// Wrap a reqwest failure, keeping the provider name for the log line.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Error::from_status(provider, status, &err.to_string()),
            None => Error::transport(provider, err.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::ProviderConfig(_) => ErrorKind::ProviderConfig,
            Error::ProviderTransport { .. } => ErrorKind::ProviderTransport,
            Error::ProviderAuth { .. } => ErrorKind::ProviderAuth,
            Error::StreamCallback(_) => ErrorKind::StreamCallback,
            Error::ContextBuild(_) => ErrorKind::ContextBuild,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// True when the error ended a task because its context was cancelled or timed out.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled | ErrorKind::DeadlineExceeded)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::transport("http", err.to_string())
    }
}
