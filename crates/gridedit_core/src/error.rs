use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Remote store rejected the request ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Operation not allowed while a {0} is in progress")]
    Busy(&'static str),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GridError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Whether the user has to sign in again before retrying.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Transport-level failures that leave the remote store untouched.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}
