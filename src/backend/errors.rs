//! Error types for the Backend API client.

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Status { status: u16, message: String },
    /// A 2xx response whose body was not the JSON we expected.
    #[error("Invalid response from server")]
    Decode {
        status: u16,
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to encode request body")]
    Encode(#[from] serde_json::Error),
    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),
}

impl BackendError {
    /// HTTP status reported by the backend, when it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } | BackendError::Decode { status, .. } => {
                Some(*status)
            }
            BackendError::Encode(_) | BackendError::Transport(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            BackendError::Transport(reqwest_middleware::Error::Reqwest(e)) => e.is_timeout(),
            _ => false,
        }
    }
}
