use thiserror::Error;

/// Uniform error value returned by every fetch. `reason()` is what the user sees.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// HTTP status >= 400; `reason` is the status text.
    #[error("{reason}")]
    Status { code: u16, reason: String },

    /// Error envelope returned by the upstream provider.
    #[error("{reason}")]
    Upstream { code: Option<i64>, reason: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Could not save file: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn reason(&self) -> String {
        match self {
            ApiError::Status { reason, .. } | ApiError::Upstream { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_the_bare_message_for_status_and_upstream() {
        let status = ApiError::Status {
            code: 404,
            reason: "Not Found".into(),
        };
        let upstream = ApiError::Upstream {
            code: Some(429),
            reason: "rate limited".into(),
        };

        assert_eq!(status.reason(), "Not Found");
        assert_eq!(upstream.reason(), "rate limited");
        assert_eq!(ApiError::Timeout.reason(), "Request timed out");
    }
}
