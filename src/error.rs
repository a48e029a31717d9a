use thiserror::Error;

/// A remote call that did not produce a usable response.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("identity check failed: {0}")]
    Request(#[from] RequestError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
