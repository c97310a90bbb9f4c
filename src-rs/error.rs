use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("authentication required, please login first")]
    AuthRequired,
    #[error("session expired, please login again")]
    SessionExpired,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    /// Whether a status check that failed this way may be tried again.
    pub fn is_transient(&self) -> bool {
        match self {
            TrackerError::Transport(_) => true,
            TrackerError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, TrackerError::AuthRequired | TrackerError::SessionExpired)
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TrackerError::InvalidResponse(err.to_string())
        } else {
            TrackerError::Transport(err.to_string())
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
