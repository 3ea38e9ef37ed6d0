use reqwest::StatusCode;
use thiserror::Error;

/// Error type for relay client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed or URL conversion failed.
    #[error("Request error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Relay endpoint answered with a non-success status code.
    #[error("Relay endpoint rejected request with status {status} and msg {}", msg.as_deref().unwrap_or("Unknown"))]
    ErrorStatus {
        /// Status code returned by the endpoint.
        status: StatusCode,
        /// Error message from the response body, if available.
        msg: Option<String>,
    },
}

impl Error {
    /// Returns `true` when repeating the same request may succeed.
    ///
    /// Timeouts, connection failures, `408`, `429` and `5xx` responses are transient. Other
    /// `4xx` responses and request construction errors mean the request itself is wrong.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::ErrorStatus { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::Error;

    fn status(code: u16) -> Error {
        Error::ErrorStatus {
            status: StatusCode::from_u16(code).unwrap(),
            msg: None,
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(408).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(422).is_transient());
    }

    #[test]
    fn test_error_status_display() {
        let error = Error::ErrorStatus {
            status: StatusCode::BAD_REQUEST,
            msg: Some("unknown token".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Relay endpoint rejected request with status 400 Bad Request and msg unknown token"
        );
    }
}
